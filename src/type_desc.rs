//! Runtime type descriptors and the values they describe.
//!
//! A [`TypeDesc`] carries everything the erased table needs to manage an
//! element whose type is only known at run time: its [`Layout`], and
//! operations to default-construct, drop, clone, hash, compare and
//! (de)serialize it. Descriptors come from a Rust type
//! ([`TypeDesc::of`]) or from two other descriptors ([`TypeDesc::pair`]),
//! which is how map element types are instantiated.
//!
//! Moving a Rust value is a byte copy, so as a [`SlotOps`] a descriptor
//! only needs its layout and its destructor.

use crate::alloc::{Global, TableAlloc};
use crate::error::SerializeError;
use crate::raw::SlotOps;
use core::alloc::Layout;
use core::any::{type_name, TypeId};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ptr::{self, NonNull};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Operations of a concrete Rust type, erased behind fn pointers.
#[derive(Clone, Copy)]
struct LeafOps {
    type_id: TypeId,
    rust_name: &'static str,
    default: unsafe fn(*mut u8),
    drop: unsafe fn(*mut u8),
    clone: unsafe fn(*mut u8, *const u8),
    hash: unsafe fn(*const u8, &mut dyn Hasher),
    eq: unsafe fn(*const u8, *const u8) -> bool,
    to_json: unsafe fn(*const u8) -> serde_json::Result<Value>,
    from_json: unsafe fn(*mut u8, &Value) -> serde_json::Result<()>,
}

unsafe fn default_of<T: Default>(p: *mut u8) {
    ptr::write(p.cast::<T>(), T::default())
}

unsafe fn drop_of<T>(p: *mut u8) {
    ptr::drop_in_place(p.cast::<T>())
}

unsafe fn clone_of<T: Clone>(dst: *mut u8, src: *const u8) {
    ptr::write(dst.cast::<T>(), (*src.cast::<T>()).clone())
}

unsafe fn hash_of<T: Hash>(p: *const u8, mut state: &mut dyn Hasher) {
    (*p.cast::<T>()).hash(&mut state)
}

unsafe fn eq_of<T: Eq>(a: *const u8, b: *const u8) -> bool {
    *a.cast::<T>() == *b.cast::<T>()
}

unsafe fn to_json_of<T: Serialize>(p: *const u8) -> serde_json::Result<Value> {
    serde_json::to_value(&*p.cast::<T>())
}

unsafe fn from_json_of<T: DeserializeOwned>(p: *mut u8, v: &Value) -> serde_json::Result<()> {
    let value = T::deserialize(v)?;
    ptr::write(p.cast::<T>(), value);
    Ok(())
}

enum Kind {
    Leaf(LeafOps),
    /// Key at offset 0, value at `value_offset`. Hashing and equality look
    /// at the key only.
    Pair {
        key: Arc<TypeDesc>,
        value: Arc<TypeDesc>,
        value_offset: usize,
    },
}

pub struct TypeDesc {
    name: String,
    layout: Layout,
    kind: Kind,
}

impl TypeDesc {
    /// Describes the Rust type `T` under `name`.
    pub fn of<T>(name: impl Into<String>) -> Self
    where
        T: Default + Clone + Hash + Eq + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        TypeDesc {
            name: name.into(),
            layout: Layout::new::<T>(),
            kind: Kind::Leaf(LeafOps {
                type_id: TypeId::of::<T>(),
                rust_name: type_name::<T>(),
                default: default_of::<T>,
                drop: drop_of::<T>,
                clone: clone_of::<T>,
                hash: hash_of::<T>,
                eq: eq_of::<T>,
                to_json: to_json_of::<T>,
                from_json: from_json_of::<T>,
            }),
        }
    }

    /// The generic pair instantiation `Pair<key, value>`.
    pub fn pair(key: Arc<TypeDesc>, value: Arc<TypeDesc>) -> Self {
        let (layout, value_offset) = key
            .layout
            .extend(value.layout)
            .expect("pair layout overflow");
        TypeDesc {
            name: format!("Pair<{}, {}>", key.name, value.name),
            layout: layout.pad_to_align(),
            kind: Kind::Pair {
                key,
                value,
                value_offset,
            },
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// `TypeId` of the described Rust type; `None` for pairs.
    pub fn type_id(&self) -> Option<TypeId> {
        match &self.kind {
            Kind::Leaf(ops) => Some(ops.type_id),
            Kind::Pair { .. } => None,
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self.kind, Kind::Pair { .. })
    }

    /// Key and value descriptors of a pair.
    pub fn pair_parts(&self) -> Option<(&Arc<TypeDesc>, &Arc<TypeDesc>)> {
        match &self.kind {
            Kind::Pair { key, value, .. } => Some((key, value)),
            Kind::Leaf(_) => None,
        }
    }

    /// Descriptor of the part that is hashed and compared: the key of a
    /// pair, the whole value otherwise.
    pub fn key_desc(&self) -> &TypeDesc {
        match &self.kind {
            Kind::Pair { key, .. } => key,
            Kind::Leaf(_) => self,
        }
    }

    /// Offset of the value part of a pair.
    pub(crate) fn value_offset(&self) -> Option<usize> {
        match &self.kind {
            Kind::Pair { value_offset, .. } => Some(*value_offset),
            Kind::Leaf(_) => None,
        }
    }

    /// Whether values of `other` may be handled with this descriptor's
    /// operations: the same Rust type under the same name, or pairs of
    /// matching parts. Name and layout alone prove nothing.
    pub fn same_type(&self, other: &TypeDesc) -> bool {
        if ptr::eq(self, other) {
            return true;
        }
        match (&self.kind, &other.kind) {
            (Kind::Leaf(a), Kind::Leaf(b)) => a.type_id == b.type_id && self.name == other.name,
            (
                Kind::Pair { key: ka, value: va, .. },
                Kind::Pair { key: kb, value: vb, .. },
            ) => ka.same_type(kb) && va.same_type(vb),
            _ => false,
        }
    }

    pub(crate) unsafe fn default_into(&self, p: *mut u8) {
        match &self.kind {
            Kind::Leaf(ops) => (ops.default)(p),
            Kind::Pair {
                key,
                value,
                value_offset,
            } => {
                key.default_into(p);
                value.default_into(p.add(*value_offset));
            }
        }
    }

    pub(crate) unsafe fn drop_in_place(&self, p: *mut u8) {
        match &self.kind {
            Kind::Leaf(ops) => (ops.drop)(p),
            Kind::Pair {
                key,
                value,
                value_offset,
            } => {
                key.drop_in_place(p);
                value.drop_in_place(p.add(*value_offset));
            }
        }
    }

    pub(crate) unsafe fn clone_elem(&self, dst: *mut u8, src: *const u8) {
        match &self.kind {
            Kind::Leaf(ops) => (ops.clone)(dst, src),
            Kind::Pair {
                key,
                value,
                value_offset,
            } => {
                key.clone_elem(dst, src);
                value.clone_elem(dst.add(*value_offset), src.add(*value_offset));
            }
        }
    }

    /// Feeds the key part of the element at `p` to `state`.
    pub(crate) unsafe fn hash_into(&self, p: *const u8, state: &mut dyn Hasher) {
        match &self.kind {
            Kind::Leaf(ops) => (ops.hash)(p, state),
            Kind::Pair { key, .. } => key.hash_into(p, state),
        }
    }

    /// Compares the key parts of two elements.
    pub(crate) unsafe fn key_eq(&self, a: *const u8, b: *const u8) -> bool {
        match &self.kind {
            Kind::Leaf(ops) => (ops.eq)(a, b),
            Kind::Pair { key, .. } => key.key_eq(a, b),
        }
    }

    pub(crate) unsafe fn to_json(&self, p: *const u8) -> Result<Value, SerializeError> {
        match &self.kind {
            Kind::Leaf(ops) => Ok((ops.to_json)(p)?),
            Kind::Pair {
                key,
                value,
                value_offset,
            } => Ok(Value::Array(vec![
                key.to_json(p)?,
                value.to_json(p.add(*value_offset))?,
            ])),
        }
    }

    /// Initializes `p` from `v`. On error `p` is left uninitialized.
    pub(crate) unsafe fn from_json(&self, p: *mut u8, v: &Value) -> Result<(), SerializeError> {
        match &self.kind {
            Kind::Leaf(ops) => Ok((ops.from_json)(p, v)?),
            Kind::Pair {
                key,
                value,
                value_offset,
            } => {
                let [k, m] = match v.as_array().map(Vec::as_slice) {
                    Some([k, m]) => [k, m],
                    _ => {
                        return Err(SerializeError::TypeMismatch {
                            expected: self.name.clone(),
                        })
                    }
                };
                key.from_json(p, k)?;
                if let Err(e) = value.from_json(p.add(*value_offset), m) {
                    key.drop_in_place(p);
                    return Err(e);
                }
                Ok(())
            }
        }
    }
}

unsafe impl SlotOps for TypeDesc {
    #[inline]
    fn layout(&self) -> Layout {
        self.layout
    }

    #[inline]
    unsafe fn drop_slot(&self, p: *mut u8) {
        self.drop_in_place(p)
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("TypeDesc");
        d.field("name", &self.name)
            .field("size", &self.layout.size())
            .field("align", &self.layout.align());
        if let Kind::Leaf(ops) = &self.kind {
            d.field("rust", &ops.rust_name);
        }
        d.finish()
    }
}

/// Heap storage for one element of `layout`, freed without dropping.
struct RawBox {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl RawBox {
    fn new(layout: Layout) -> Self {
        let ptr = if layout.size() == 0 {
            unsafe { NonNull::new_unchecked(layout.align() as *mut u8) }
        } else {
            Global.allocate(layout)
        };
        RawBox { ptr, layout }
    }
}

impl Drop for RawBox {
    fn drop(&mut self) {
        if self.layout.size() != 0 {
            unsafe { Global.deallocate(self.ptr, self.layout) }
        }
    }
}

/// An owned value of a runtime type.
pub struct ErasedValue {
    storage: RawBox,
    desc: Arc<TypeDesc>,
}

// Descriptors only describe `Send + Sync` types.
unsafe impl Send for ErasedValue {}
unsafe impl Sync for ErasedValue {}

impl ErasedValue {
    /// Default-constructed value of `desc`.
    pub fn new(desc: Arc<TypeDesc>) -> Self {
        let storage = RawBox::new(desc.layout);
        unsafe { desc.default_into(storage.ptr.as_ptr()) };
        ErasedValue { storage, desc }
    }

    /// Wraps a Rust value. Panics if `desc` does not describe `T`.
    pub fn from_typed<T: 'static>(desc: Arc<TypeDesc>, value: T) -> Self {
        assert!(
            desc.type_id() == Some(TypeId::of::<T>()),
            "type mismatch: {} is not {}",
            desc.name,
            type_name::<T>()
        );
        let storage = RawBox::new(desc.layout);
        unsafe { ptr::write(storage.ptr.as_ptr().cast::<T>(), value) };
        ErasedValue { storage, desc }
    }

    /// Builds a pair value from its two parts. Panics unless `desc` is a
    /// pair of the parts' descriptors.
    pub fn pair(desc: Arc<TypeDesc>, key: ErasedValue, value: ErasedValue) -> Self {
        let (kd, vd) = desc.pair_parts().expect("not a pair descriptor");
        assert!(
            kd.same_type(&key.desc) && vd.same_type(&value.desc),
            "type mismatch: ({}, {}) is not {}",
            key.desc.name,
            value.desc.name,
            desc.name
        );
        let offset = desc.value_offset().unwrap_or(0);
        let storage = RawBox::new(desc.layout);
        unsafe {
            key.move_to(storage.ptr.as_ptr());
            value.move_to(storage.ptr.as_ptr().add(offset));
        }
        ErasedValue { storage, desc }
    }

    /// Decodes a value of `desc` from JSON.
    pub fn from_json(desc: Arc<TypeDesc>, v: &Value) -> Result<Self, SerializeError> {
        let storage = RawBox::new(desc.layout);
        unsafe { desc.from_json(storage.ptr.as_ptr(), v)? };
        Ok(ErasedValue { storage, desc })
    }

    pub fn desc(&self) -> &Arc<TypeDesc> {
        &self.desc
    }

    pub fn as_ref(&self) -> ErasedRef<'_> {
        ErasedRef {
            ptr: self.storage.ptr.as_ptr(),
            desc: &self.desc,
            _pd: PhantomData,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_ref().downcast_ref()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if self.desc.type_id() != Some(TypeId::of::<T>()) {
            return None;
        }
        Some(unsafe { &mut *self.storage.ptr.as_ptr().cast::<T>() })
    }

    /// Unwraps into the Rust value, or gives the value back on a type mismatch.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        if self.desc.type_id() != Some(TypeId::of::<T>()) {
            return Err(self);
        }
        unsafe {
            let value = ptr::read(self.storage.ptr.as_ptr().cast::<T>());
            self.release();
            Ok(value)
        }
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.storage.ptr.as_ptr()
    }

    /// Frees the heap cell without dropping the element in it.
    ///
    /// # Safety
    /// The element was moved out or is otherwise owned elsewhere.
    pub(crate) unsafe fn release(self) {
        let mut this = ManuallyDrop::new(self);
        ptr::drop_in_place(&mut this.desc);
        ptr::drop_in_place(&mut this.storage);
    }

    /// Moves the contents to `dst` and frees the heap cell.
    ///
    /// # Safety
    /// `dst` is valid for one element of this value's descriptor.
    pub(crate) unsafe fn move_to(self, dst: *mut u8) {
        self.desc.relocate(dst, self.storage.ptr.as_ptr());
        self.release();
    }

    /// Builds a value whose storage `init` fills in. If `init` panics the
    /// storage is freed and nothing is dropped.
    ///
    /// # Safety
    /// On return `init` has written an element of `desc` to its argument.
    pub(crate) unsafe fn init_with(desc: Arc<TypeDesc>, init: impl FnOnce(*mut u8)) -> Self {
        let storage = RawBox::new(desc.layout);
        init(storage.ptr.as_ptr());
        ErasedValue { storage, desc }
    }
}

impl Drop for ErasedValue {
    fn drop(&mut self) {
        unsafe { self.desc.drop_in_place(self.storage.ptr.as_ptr()) }
    }
}

impl Clone for ErasedValue {
    fn clone(&self) -> Self {
        self.as_ref().cloned()
    }
}

impl PartialEq for ErasedValue {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl fmt::Debug for ErasedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_ref().fmt(f)
    }
}

/// A borrowed element of a runtime type.
#[derive(Clone, Copy)]
pub struct ErasedRef<'a> {
    ptr: *const u8,
    desc: &'a Arc<TypeDesc>,
    _pd: PhantomData<&'a u8>,
}

impl<'a> ErasedRef<'a> {
    /// # Safety
    /// `ptr` holds an initialized element of `desc` for `'a`.
    pub(crate) unsafe fn new(ptr: *const u8, desc: &'a Arc<TypeDesc>) -> Self {
        ErasedRef {
            ptr,
            desc,
            _pd: PhantomData,
        }
    }

    pub fn desc(&self) -> &'a Arc<TypeDesc> {
        self.desc
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&'a T> {
        if self.desc.type_id() != Some(TypeId::of::<T>()) {
            return None;
        }
        Some(unsafe { &*self.ptr.cast::<T>() })
    }

    /// Key part of a pair.
    pub fn key(&self) -> Option<ErasedRef<'a>> {
        let (key, _) = self.desc.pair_parts()?;
        Some(unsafe { ErasedRef::new(self.ptr, key) })
    }

    /// Value part of a pair.
    pub fn value(&self) -> Option<ErasedRef<'a>> {
        let (_, value) = self.desc.pair_parts()?;
        let offset = self.desc.value_offset()?;
        Some(unsafe { ErasedRef::new(self.ptr.add(offset), value) })
    }

    pub fn to_json(&self) -> Result<Value, SerializeError> {
        unsafe { self.desc.to_json(self.ptr) }
    }

    pub fn cloned(&self) -> ErasedValue {
        let desc = self.desc.clone();
        let storage = RawBox::new(desc.layout);
        unsafe { desc.clone_elem(storage.ptr.as_ptr(), self.ptr) };
        ErasedValue { storage, desc }
    }
}

impl PartialEq for ErasedRef<'_> {
    /// Key equality, the relation tables dedupe by.
    fn eq(&self, other: &Self) -> bool {
        self.desc.same_type(other.desc) && unsafe { self.desc.key_eq(self.ptr, other.ptr) }
    }
}

impl fmt::Debug for ErasedRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_json() {
            Ok(v) => write!(f, "{}({v})", self.desc.name),
            Err(_) => write!(f, "{}(..)", self.desc.name),
        }
    }
}

//! ErasedTable: the generic table for elements whose type is a runtime
//! [`TypeDesc`].
//!
//! It drives the same [`RawTable`] engine as the typed tables, with the
//! descriptor as the slot operations, so placement, growth and iteration
//! order are identical for both. Only hashing and key comparison go through
//! the descriptor's function pointers.
//!
//! Elements serialize as a JSON array in slot order; deserializing clears
//! the table and re-inserts every decoded element.

use crate::alloc::{Global, TableAlloc};
use crate::control::alter_hash;
use crate::error::SerializeError;
use crate::hash_table::Slot;
use crate::raw::{RawIter, RawTable, SlotOps};
use crate::type_desc::{ErasedRef, ErasedValue, TypeDesc};
use core::fmt;
use core::hash::{BuildHasher, Hasher};
use core::iter::FusedIterator;
use core::mem::ManuallyDrop;
use core::ptr;
use serde_json::Value;
use std::collections::hash_map::RandomState;
use std::sync::Arc;

pub struct ErasedTable<S = RandomState, A: TableAlloc = Global> {
    raw: RawTable<A>,
    desc: Arc<TypeDesc>,
    hasher: S,
}

// Descriptors only describe `Send + Sync` types.
unsafe impl<S: Send, A: TableAlloc + Send> Send for ErasedTable<S, A> {}
unsafe impl<S: Sync, A: TableAlloc + Sync> Sync for ErasedTable<S, A> {}

impl ErasedTable {
    /// A set of `elem` values.
    pub fn new_set(elem: Arc<TypeDesc>) -> Self {
        Self::with_hasher_in(elem, RandomState::new(), Global)
    }

    /// A map from `key` to `value`; elements are `Pair<key, value>`.
    pub fn new_map(key: Arc<TypeDesc>, value: Arc<TypeDesc>) -> Self {
        Self::new_set(Arc::new(TypeDesc::pair(key, value)))
    }
}

impl<S, A: TableAlloc> ErasedTable<S, A> {
    /// Elements described by `elem`; a pair descriptor makes a map.
    pub fn with_hasher_in(elem: Arc<TypeDesc>, hasher: S, alloc: A) -> Self {
        Self {
            raw: RawTable::new_in(elem.layout(), alloc),
            desc: elem,
            hasher,
        }
    }

    pub fn element_desc(&self) -> &Arc<TypeDesc> {
        &self.desc
    }

    pub fn is_map(&self) -> bool {
        self.desc.is_pair()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    pub fn hash_table_size(&self) -> usize {
        self.raw.buffer_size()
    }

    pub fn load_factor(&self) -> f32 {
        self.raw.load_factor()
    }

    pub fn max_load_factor(&self) -> f32 {
        self.raw.max_load_factor()
    }

    pub fn set_max_load_factor(&mut self, ml: f32) {
        unsafe { self.raw.set_max_load_factor(&*self.desc, ml) }
    }

    pub fn max_probe_distance(&self) -> usize {
        self.raw.max_probe_distance()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn allocator(&self) -> &A {
        self.raw.allocator()
    }

    pub fn clear(&mut self) {
        unsafe { self.raw.clear(&*self.desc) }
    }

    pub fn reserve(&mut self, capacity: usize) {
        unsafe { self.raw.reserve(&*self.desc, capacity) }
    }

    pub fn rehash(&mut self, buffer_size: usize) {
        unsafe { self.raw.rehash(&*self.desc, buffer_size) }
    }

    pub fn shrink_to_fit(&mut self) {
        unsafe { self.raw.shrink_to_fit(&*self.desc) }
    }

    pub fn first_slot(&self) -> Option<Slot> {
        self.raw.occupied_from(0).map(Slot)
    }

    pub fn next_slot(&self, slot: Slot) -> Option<Slot> {
        self.raw.occupied_from(slot.0 + 1).map(Slot)
    }

    pub fn get_slot(&self, slot: Slot) -> Option<ErasedRef<'_>> {
        if !self.raw.is_occupied_at(slot.0) {
            return None;
        }
        Some(unsafe { ErasedRef::new(self.raw.slot_ptr(slot.0), &self.desc) })
    }

    /// Drops the element at `slot` and returns the next occupied slot.
    /// Panics if `slot` is not occupied.
    pub fn erase_at(&mut self, slot: Slot) -> Option<Slot> {
        unsafe { self.raw.erase_at(&*self.desc, slot.0) }.map(Slot)
    }

    /// Moves the element at `slot` out. Panics if `slot` is not occupied.
    pub fn take_at(&mut self, slot: Slot) -> ErasedValue {
        let desc = self.desc.clone();
        let raw = &mut self.raw;
        unsafe { ErasedValue::init_with(desc.clone(), |dst| raw.take_at(&*desc, slot.0, dst)) }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.raw.raw_iter(),
            desc: &self.desc,
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other)
    }

    /// Slot-order JSON array of every element.
    pub fn serialize(&self) -> Result<Value, SerializeError> {
        self.iter()
            .map(|e| e.to_json())
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    }

    /// Copies the table into buffers from `alloc`, keeping every slot position.
    pub fn clone_in<B: TableAlloc>(&self, alloc: B) -> ErasedTable<S, B>
    where
        S: Clone,
    {
        let desc = &self.desc;
        let raw = unsafe { self.raw.clone_in(alloc, |dst, src| desc.clone_elem(dst, src)) };
        ErasedTable {
            raw,
            desc: self.desc.clone(),
            hasher: self.hasher.clone(),
        }
    }

    /// Rebinds the table to `alloc`, stealing the buffers when the
    /// allocators compare equal.
    pub fn move_in(self, alloc: A) -> Self
    where
        A: PartialEq,
    {
        let this = ManuallyDrop::new(self);
        let (raw, desc, hasher) = unsafe {
            (
                ptr::read(&this.raw),
                ptr::read(&this.desc),
                ptr::read(&this.hasher),
            )
        };
        let raw = unsafe { raw.move_in(&*desc, alloc) };
        Self { raw, desc, hasher }
    }
}

impl<S: BuildHasher, A: TableAlloc> ErasedTable<S, A> {
    fn hash_key(&self, key: *const u8) -> usize {
        let mut state = self.hasher.build_hasher();
        unsafe { self.desc.key_desc().hash_into(key, &mut state) };
        alter_hash(state.finish() as usize)
    }

    /// The key of an element sits at its start, so a key pointer and an
    /// element pointer compare the same way.
    fn find_hashed(&self, h: usize, key: *const u8) -> Option<usize> {
        let kd = self.desc.key_desc();
        self.raw.find(h, |p| unsafe { kd.key_eq(p, key) })
    }

    fn check_key(&self, key: &ErasedRef<'_>) {
        assert!(
            key.desc().same_type(self.desc.key_desc()),
            "type mismatch: key {} for table of {}",
            key.desc().name(),
            self.desc.name()
        );
    }

    fn check_elem(&self, value: &ErasedValue) {
        assert!(
            value.desc().same_type(&self.desc),
            "type mismatch: {} inserted into table of {}",
            value.desc().name(),
            self.desc.name()
        );
    }

    /// Slot holding `key`. Panics if `key` is not of the table's key type.
    pub fn find(&self, key: ErasedRef<'_>) -> Option<Slot> {
        self.check_key(&key);
        self.find_hashed(self.hash_key(key.as_ptr()), key.as_ptr())
            .map(Slot)
    }

    pub fn contains(&self, key: ErasedRef<'_>) -> bool {
        self.find(key).is_some()
    }

    pub fn count(&self, key: ErasedRef<'_>) -> usize {
        usize::from(self.contains(key))
    }

    pub fn get(&self, key: ErasedRef<'_>) -> Option<ErasedRef<'_>> {
        let slot = self.find(key)?;
        self.get_slot(slot)
    }

    /// Inserts `value` unless its key is present (then `value` is dropped).
    /// Panics if `value` is not of the element type.
    pub fn insert(&mut self, value: ErasedValue) -> (Slot, bool) {
        self.check_elem(&value);
        let h = self.hash_key(value.as_ref().as_ptr());
        if let Some(pos) = self.find_hashed(h, value.as_ref().as_ptr()) {
            return (Slot(pos), false);
        }
        (self.insert_new(h, value), true)
    }

    /// Inserts `value`, or replaces the resident with the same key in place.
    /// For a map only the mapped value is replaced; the resident key stays.
    pub fn insert_or_assign(&mut self, mut value: ErasedValue) -> (Slot, bool) {
        self.check_elem(&value);
        let h = self.hash_key(value.as_ref().as_ptr());
        if let Some(pos) = self.find_hashed(h, value.as_ref().as_ptr()) {
            let dst = self.raw.slot_ptr(pos);
            let src = value.as_mut_ptr();
            // The replaced part leaves with `value` and is dropped there.
            match (self.desc.pair_parts(), self.desc.value_offset()) {
                (Some((_, vd)), Some(off)) => unsafe {
                    SlotOps::swap(&**vd, dst.add(off), src.add(off))
                },
                _ => unsafe { SlotOps::swap(&*self.desc, dst, src) },
            }
            return (Slot(pos), false);
        }
        (self.insert_new(h, value), true)
    }

    /// Builds the value, then inserts it unless its key is present.
    pub fn emplace<F>(&mut self, make: F) -> (Slot, bool)
    where
        F: FnOnce() -> ErasedValue,
    {
        self.insert(make())
    }

    fn insert_new(&mut self, h: usize, mut value: ErasedValue) -> Slot {
        let pos = unsafe { self.raw.insert_hashed(&*self.desc, h, value.as_mut_ptr()) };
        // The element now lives in the table; free the heap cell only.
        unsafe { value.release() };
        Slot(pos)
    }

    /// Drops the element with `key`; returns 0 or 1.
    pub fn erase(&mut self, key: ErasedRef<'_>) -> usize {
        match self.find(key) {
            Some(slot) => {
                self.erase_at(slot);
                1
            }
            None => 0,
        }
    }

    pub fn remove(&mut self, key: ErasedRef<'_>) -> Option<ErasedValue> {
        let slot = self.find(key)?;
        Some(self.take_at(slot))
    }

    /// Clears the table and inserts every element of the JSON array `v`.
    ///
    /// A later element with the same key as an earlier one replaces it. On
    /// error the table keeps the elements decoded so far.
    pub fn deserialize(&mut self, v: &Value) -> Result<(), SerializeError> {
        let elems = v.as_array().ok_or(SerializeError::NotAnArray)?;
        self.clear();
        self.reserve(elems.len());
        for e in elems {
            let value = ErasedValue::from_json(self.desc.clone(), e)?;
            self.insert_or_assign(value);
        }
        Ok(())
    }
}

impl<S, A: TableAlloc> Drop for ErasedTable<S, A> {
    fn drop(&mut self) {
        unsafe { self.raw.clear_and_free(&*self.desc) }
    }
}

impl<S: Clone, A: TableAlloc + Clone> Clone for ErasedTable<S, A> {
    fn clone(&self) -> Self {
        self.clone_in(self.raw.allocator().clone())
    }
}

impl<S, A: TableAlloc> fmt::Debug for ErasedTable<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Slot-order iteration over an [`ErasedTable`].
pub struct Iter<'a> {
    inner: RawIter<'a>,
    desc: &'a Arc<TypeDesc>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = ErasedRef<'a>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(_, p)| unsafe { ErasedRef::new(p, self.desc) })
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Iter<'_> {}
impl FusedIterator for Iter<'_> {}

impl<'a, S, A: TableAlloc> IntoIterator for &'a ErasedTable<S, A> {
    type Item = ErasedRef<'a>;
    type IntoIter = Iter<'a>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn i32_desc() -> Arc<TypeDesc> {
        Arc::new(TypeDesc::of::<i32>("i32"))
    }

    fn str_desc() -> Arc<TypeDesc> {
        Arc::new(TypeDesc::of::<String>("String"))
    }

    fn int(d: &Arc<TypeDesc>, v: i32) -> ErasedValue {
        ErasedValue::from_typed(d.clone(), v)
    }

    #[test]
    fn set_insert_find_erase() {
        let d = i32_desc();
        let mut t = ErasedTable::new_set(d.clone());
        for i in 0..100 {
            assert!(t.insert(int(&d, i)).1);
        }
        assert!(!t.insert(int(&d, 5)).1);
        assert_eq!(t.len(), 100);
        let k = int(&d, 42);
        assert!(t.contains(k.as_ref()));
        assert_eq!(t.erase(k.as_ref()), 1);
        assert!(!t.contains(k.as_ref()));
        assert!(t.len() <= t.capacity());
    }

    /// Invariant: a map element is found by its key and assigned in place.
    #[test]
    fn map_insert_or_assign_keeps_slot() {
        let (kd, vd) = (str_desc(), i32_desc());
        let mut t = ErasedTable::new_map(kd.clone(), vd.clone());
        let pd = t.element_desc().clone();
        let pair = |k: &str, v: i32| {
            ErasedValue::pair(
                pd.clone(),
                ErasedValue::from_typed(kd.clone(), k.to_string()),
                int(&vd, v),
            )
        };
        let (s1, fresh) = t.insert_or_assign(pair("a", 1));
        assert!(fresh);
        let (s2, fresh) = t.insert_or_assign(pair("a", 2));
        assert!(!fresh);
        assert_eq!(s1, s2);
        let key = ErasedValue::from_typed(kd.clone(), "a".to_string());
        let got = t.get(key.as_ref()).and_then(|e| e.value());
        assert_eq!(got.and_then(|v| v.downcast_ref::<i32>().copied()), Some(2));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn serialize_follows_slot_order() {
        let d = i32_desc();
        let mut t = ErasedTable::new_set(d.clone());
        for i in [7, 3, 11, 3] {
            t.insert(int(&d, i));
        }
        let order: Vec<i32> = t
            .iter()
            .map(|e| *e.downcast_ref::<i32>().unwrap())
            .collect();
        assert_eq!(t.serialize().unwrap(), json!(order));
    }

    #[test]
    fn deserialize_replaces_contents() {
        let d = i32_desc();
        let mut t = ErasedTable::new_set(d.clone());
        t.insert(int(&d, 99));
        t.deserialize(&json!([1, 2, 3, 2])).unwrap();
        assert_eq!(t.len(), 3);
        assert!(!t.contains(int(&d, 99).as_ref()));
        assert!(matches!(
            t.deserialize(&json!({"a": 1})),
            Err(SerializeError::NotAnArray)
        ));
    }

    #[test]
    fn take_at_moves_out() {
        let d = str_desc();
        let mut t = ErasedTable::new_set(d.clone());
        t.insert(ErasedValue::from_typed(d.clone(), "x".to_string()));
        let slot = t.first_slot().unwrap();
        let v = t.take_at(slot);
        assert_eq!(v.downcast_ref::<String>().map(String::as_str), Some("x"));
        assert!(t.is_empty());
        assert!(t.first_slot().is_none());
    }

    #[test]
    fn emplace_and_move_in() {
        let d = i32_desc();
        let mut t = ErasedTable::new_set(d.clone());
        assert!(t.emplace(|| int(&d, 1)).1);
        assert!(!t.emplace(|| int(&d, 1)).1);
        let slot = t.find(int(&d, 1).as_ref());
        let t = t.move_in(Global);
        assert_eq!(t.len(), 1);
        assert_eq!(t.find(int(&d, 1).as_ref()), slot);
    }

    #[test]
    #[should_panic(expected = "type mismatch")]
    fn inserting_wrong_type_panics() {
        let mut t = ErasedTable::new_set(i32_desc());
        t.insert(ErasedValue::from_typed(str_desc(), "no".to_string()));
    }

    /// A descriptor with the table's name and layout but another Rust type
    /// must not get in.
    #[test]
    #[should_panic(expected = "type mismatch")]
    fn same_name_and_layout_is_not_enough() {
        let mut t = ErasedTable::new_set(Arc::new(TypeDesc::of::<String>("T")));
        t.insert(ErasedValue::from_typed(
            Arc::new(TypeDesc::of::<[usize; 3]>("T")),
            [1, 1, 1],
        ));
    }

    /// Key whose identity is `id` alone; `tag` rides along.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    struct Tagged {
        id: u32,
        tag: String,
    }

    impl PartialEq for Tagged {
        fn eq(&self, other: &Self) -> bool {
            self.id == other.id
        }
    }

    impl Eq for Tagged {}

    impl std::hash::Hash for Tagged {
        fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
            self.id.hash(state);
        }
    }

    /// Invariant: assigning through the map leaves the resident key alone.
    #[test]
    fn map_assign_keeps_resident_key() {
        let (kd, vd) = (Arc::new(TypeDesc::of::<Tagged>("Tagged")), str_desc());
        let mut t = ErasedTable::new_map(kd.clone(), vd.clone());
        let pd = t.element_desc().clone();
        let pair = |tag: &str, v: &str| {
            ErasedValue::pair(
                pd.clone(),
                ErasedValue::from_typed(kd.clone(), Tagged { id: 1, tag: tag.into() }),
                ErasedValue::from_typed(vd.clone(), v.to_string()),
            )
        };
        t.insert_or_assign(pair("first", "a"));
        let (_, fresh) = t.insert_or_assign(pair("second", "b"));
        assert!(!fresh);
        assert_eq!(t.len(), 1);
        let e = t.get_slot(t.first_slot().unwrap()).unwrap();
        let key = e.key().and_then(|k| k.downcast_ref::<Tagged>()).unwrap();
        assert_eq!(key.tag, "first");
        let value = e.value().and_then(|v| v.downcast_ref::<String>());
        assert_eq!(value.map(String::as_str), Some("b"));
    }

    /// A set has no mapped part, so the whole element is replaced.
    #[test]
    fn set_assign_replaces_whole_element() {
        let d = Arc::new(TypeDesc::of::<Tagged>("Tagged"));
        let mut t = ErasedTable::new_set(d.clone());
        t.insert(ErasedValue::from_typed(d.clone(), Tagged { id: 1, tag: "first".into() }));
        t.insert_or_assign(ErasedValue::from_typed(d.clone(), Tagged { id: 1, tag: "second".into() }));
        let e = t.get_slot(t.first_slot().unwrap()).unwrap();
        assert_eq!(e.downcast_ref::<Tagged>().map(|k| k.tag.as_str()), Some("second"));
    }
}

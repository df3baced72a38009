//! HashTable: the generic typed table over the Robin Hood engine.
//!
//! Keys are not stored separately; an [`ExtractKey`] policy borrows the key
//! out of each stored value. Maps, sets and self-indexed maps are this table
//! with different policies.

use crate::alloc::{Global, TableAlloc};
use crate::control::alter_hash;
use crate::raw::{RawIter, RawTable, TypedOps};
use core::alloc::Layout;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::mem::{self, ManuallyDrop, MaybeUninit};
use core::ptr;
use std::collections::hash_map::RandomState;

/// Borrows the key out of a stored value.
///
/// Implementations must be pure: the same value always yields an equal key.
/// The key part of a value must not change while the value is in a table;
/// the table keeps the hash computed at insertion and cannot notice.
pub trait ExtractKey<V> {
    type Key: ?Sized;
    fn extract(value: &V) -> &Self::Key;
}

/// Key policy for `(key, mapped)` pairs.
#[derive(Copy, Clone, Debug, Default)]
pub struct PairFirst;

impl<K, M> ExtractKey<(K, M)> for PairFirst {
    type Key = K;
    #[inline]
    fn extract(value: &(K, M)) -> &K {
        &value.0
    }
}

/// Key policy where the value is its own key.
#[derive(Copy, Clone, Debug, Default)]
pub struct Identity;

impl<T> ExtractKey<T> for Identity {
    type Key = T;
    #[inline]
    fn extract(value: &T) -> &T {
        value
    }
}

/// Position of an element in a table's slot array.
///
/// A slot stays valid until the element is erased or the table rehashes
/// (any insertion may rehash).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Slot(pub(crate) usize);

impl Slot {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

pub struct HashTable<V, X, S = RandomState, A: TableAlloc = Global> {
    raw: RawTable<A>,
    hasher: S,
    _marker: PhantomData<(V, fn() -> X)>,
}

unsafe impl<V: Send, X, S: Send, A: TableAlloc + Send> Send for HashTable<V, X, S, A> {}
unsafe impl<V: Sync, X, S: Sync, A: TableAlloc + Sync> Sync for HashTable<V, X, S, A> {}

impl<V, X> HashTable<V, X> {
    pub fn new() -> Self {
        Self::with_hasher_in(RandomState::new(), Global)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher_in(capacity, RandomState::new(), Global)
    }
}

impl<V, X, S> HashTable<V, X, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_hasher_in(hasher, Global)
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self::with_capacity_and_hasher_in(capacity, hasher, Global)
    }
}

impl<V, X, A: TableAlloc> HashTable<V, X, RandomState, A> {
    pub fn new_in(alloc: A) -> Self {
        Self::with_hasher_in(RandomState::new(), alloc)
    }
}

impl<V, X, S, A: TableAlloc> HashTable<V, X, S, A> {
    const OPS: TypedOps<V> = TypedOps::NEW;

    /// Creates an empty table; nothing is allocated until the first insertion.
    pub fn with_hasher_in(hasher: S, alloc: A) -> Self {
        Self {
            raw: RawTable::new_in(Layout::new::<V>(), alloc),
            hasher,
            _marker: PhantomData,
        }
    }

    pub fn with_capacity_and_hasher_in(capacity: usize, hasher: S, alloc: A) -> Self {
        let mut t = Self::with_hasher_in(hasher, alloc);
        t.reserve(capacity);
        t
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.len() == 0
    }

    /// Elements the table holds before the next rehash: `floor(max_load_factor * hash_table_size)`.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    /// Length of the slot array.
    #[inline]
    pub fn hash_table_size(&self) -> usize {
        self.raw.buffer_size()
    }

    pub fn load_factor(&self) -> f32 {
        self.raw.load_factor()
    }

    #[inline]
    pub fn max_load_factor(&self) -> f32 {
        self.raw.max_load_factor()
    }

    /// Panics unless `0 < ml <= 1`. Rehashes if the table is now over capacity.
    pub fn set_max_load_factor(&mut self, ml: f32) {
        unsafe { self.raw.set_max_load_factor(&Self::OPS, ml) }
    }

    /// Longest distance any element sits from its home slot.
    pub fn max_probe_distance(&self) -> usize {
        self.raw.max_probe_distance()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn allocator(&self) -> &A {
        self.raw.allocator()
    }

    /// Drops every element; the slot array is kept.
    pub fn clear(&mut self) {
        unsafe { self.raw.clear(&Self::OPS) }
    }

    /// Ensures `capacity() >= capacity`.
    pub fn reserve(&mut self, capacity: usize) {
        unsafe { self.raw.reserve(&Self::OPS, capacity) }
    }

    /// Rebuilds the slot array with at least `buffer_size` slots (never fewer
    /// than the load factor or the 16-slot floor allow). Stored hashes are
    /// reused, so no key is hashed again.
    pub fn rehash(&mut self, buffer_size: usize) {
        unsafe { self.raw.rehash(&Self::OPS, buffer_size) }
    }

    /// Shrinks to the smallest slot array that holds `len()` elements; an
    /// empty table releases its buffers.
    pub fn shrink_to_fit(&mut self) {
        unsafe { self.raw.shrink_to_fit(&Self::OPS) }
    }

    /// First occupied slot (`begin`); `None` means the table is empty (`end`).
    pub fn first_slot(&self) -> Option<Slot> {
        self.raw.occupied_from(0).map(Slot)
    }

    /// Occupied slot after `slot`, or `None` at the end.
    pub fn next_slot(&self, slot: Slot) -> Option<Slot> {
        self.raw.occupied_from(slot.0 + 1).map(Slot)
    }

    pub fn get_slot(&self, slot: Slot) -> Option<&V> {
        if !self.raw.is_occupied_at(slot.0) {
            return None;
        }
        Some(unsafe { &*self.raw.slot_ptr(slot.0).cast::<V>() })
    }

    /// Mutable access by slot. The key part must be left unchanged.
    pub fn get_slot_mut(&mut self, slot: Slot) -> Option<&mut V> {
        if !self.raw.is_occupied_at(slot.0) {
            return None;
        }
        Some(unsafe { &mut *self.raw.slot_ptr(slot.0).cast::<V>() })
    }

    /// Drops the element at `slot` and returns the next occupied slot.
    ///
    /// Leaves a tombstone; survivors are never shifted. Panics if `slot` is
    /// not occupied.
    pub fn erase_at(&mut self, slot: Slot) -> Option<Slot> {
        unsafe { self.raw.erase_at(&Self::OPS, slot.0) }.map(Slot)
    }

    /// Moves the element at `slot` out of the table. Panics if `slot` is not occupied.
    pub fn take_at(&mut self, slot: Slot) -> V {
        let mut out = MaybeUninit::<V>::uninit();
        unsafe {
            self.raw
                .take_at(&Self::OPS, slot.0, out.as_mut_ptr().cast::<u8>());
            out.assume_init()
        }
    }

    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            inner: self.raw.raw_iter(),
            _pd: PhantomData,
        }
    }

    /// Mutable iteration in slot order. The key part must be left unchanged.
    pub fn iter_mut(&mut self) -> IterMut<'_, V> {
        IterMut {
            inner: self.raw.raw_iter(),
            _pd: PhantomData,
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Copies the table into buffers from `alloc`, keeping every slot position.
    pub fn clone_in<B: TableAlloc>(&self, alloc: B) -> HashTable<V, X, S, B>
    where
        V: Clone,
        S: Clone,
    {
        let raw = unsafe {
            self.raw.clone_in(alloc, |dst, src| {
                ptr::write(dst.cast::<V>(), (*src.cast::<V>()).clone())
            })
        };
        HashTable {
            raw,
            hasher: self.hasher.clone(),
            _marker: PhantomData,
        }
    }

    /// Rebinds the table to `alloc`. Buffers move over untouched when the
    /// allocators compare equal; otherwise elements are relocated into fresh
    /// buffers from `alloc`.
    pub fn move_in(self, alloc: A) -> Self
    where
        A: PartialEq,
    {
        let this = ManuallyDrop::new(self);
        let (raw, hasher) = unsafe { (ptr::read(&this.raw), ptr::read(&this.hasher)) };
        let raw = unsafe { raw.move_in(&Self::OPS, alloc) };
        Self {
            raw,
            hasher,
            _marker: PhantomData,
        }
    }
}

impl<V, X, S, A> HashTable<V, X, S, A>
where
    X: ExtractKey<V>,
    X::Key: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    /// Control value for `q`: never EMPTY, tombstone bit clear.
    #[inline]
    pub(crate) fn hash_of<Q: ?Sized + Hash>(&self, q: &Q) -> usize {
        alter_hash(self.hasher.hash_one(q) as usize)
    }

    pub(crate) fn find_hashed<Q>(&self, h: usize, q: &Q) -> Option<usize>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        self.raw
            .find(h, |p| X::extract(unsafe { &*p.cast::<V>() }).borrow() == q)
    }

    /// Places a value whose key is known to be absent.
    pub(crate) fn insert_new(&mut self, h: usize, value: V) -> Slot {
        let mut value = ManuallyDrop::new(value);
        let src = (&mut *value as *mut V).cast::<u8>();
        Slot(unsafe { self.raw.insert_hashed(&Self::OPS, h, src) })
    }

    pub fn find_slot<Q>(&self, q: &Q) -> Option<Slot>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_hashed(self.hash_of(q), q).map(Slot)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        self.get_slot(slot)
    }

    /// Mutable lookup. The key part must be left unchanged.
    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        self.get_slot_mut(slot)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find_slot(q).is_some()
    }

    /// 1 if `q` is present, else 0.
    pub fn count<Q>(&self, q: &Q) -> usize
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        usize::from(self.contains(q))
    }

    /// Inserts `value` unless its key is present. Returns the slot holding the
    /// key and whether `value` was inserted; a rejected value is dropped.
    pub fn insert(&mut self, value: V) -> (Slot, bool) {
        let h = self.hash_of(X::extract(&value));
        if let Some(pos) = self.find_hashed(h, X::extract(&value)) {
            return (Slot(pos), false);
        }
        (self.insert_new(h, value), true)
    }

    /// Inserts `value`, or replaces the resident with the same key in place.
    pub fn insert_or_assign(&mut self, value: V) -> (Slot, bool) {
        let h = self.hash_of(X::extract(&value));
        if let Some(pos) = self.find_hashed(h, X::extract(&value)) {
            unsafe { *self.raw.slot_ptr(pos).cast::<V>() = value };
            return (Slot(pos), false);
        }
        (self.insert_new(h, value), true)
    }

    /// Builds the value first, then inserts it unless its key is present (in
    /// which case the built value is dropped).
    pub fn emplace<F>(&mut self, make: F) -> (Slot, bool)
    where
        F: FnOnce() -> V,
    {
        self.insert(make())
    }

    /// Drops the element with key `q`. Returns how many were erased (0 or 1).
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.find_slot(q) {
            Some(slot) => {
                self.erase_at(slot);
                1
            }
            None => 0,
        }
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        X::Key: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let slot = self.find_slot(q)?;
        Some(self.take_at(slot))
    }
}

impl<V, X, S, A: TableAlloc> Drop for HashTable<V, X, S, A> {
    fn drop(&mut self) {
        unsafe { self.raw.clear_and_free(&Self::OPS) }
    }
}

impl<V, X, S: Default, A: TableAlloc + Default> Default for HashTable<V, X, S, A> {
    fn default() -> Self {
        Self::with_hasher_in(S::default(), A::default())
    }
}

impl<V: Clone, X, S: Clone, A: TableAlloc + Clone> Clone for HashTable<V, X, S, A> {
    fn clone(&self) -> Self {
        self.clone_in(self.raw.allocator().clone())
    }
}

impl<V: fmt::Debug, X, S, A: TableAlloc> fmt::Debug for HashTable<V, X, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<V, X, S, A> Extend<V> for HashTable<V, X, S, A>
where
    X: ExtractKey<V>,
    X::Key: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    /// Later values replace earlier ones with the same key, as
    /// `insert_or_assign` does.
    fn extend<I: IntoIterator<Item = V>>(&mut self, iter: I) {
        for v in iter {
            self.insert_or_assign(v);
        }
    }
}

impl<V, X, S, A> FromIterator<V> for HashTable<V, X, S, A>
where
    X: ExtractKey<V>,
    X::Key: Hash + Eq,
    S: BuildHasher + Default,
    A: TableAlloc + Default,
{
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut t = Self::default();
        t.extend(iter);
        t
    }
}

/// Shared iteration in slot order.
pub struct Iter<'a, V> {
    inner: RawIter<'a>,
    _pd: PhantomData<&'a V>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = &'a V;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, p)| unsafe { &*p.cast::<V>() })
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for Iter<'_, V> {}
impl<V> FusedIterator for Iter<'_, V> {}

impl<V> Clone for Iter<'_, V> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
            _pd: PhantomData,
        }
    }
}

/// Mutable iteration in slot order.
pub struct IterMut<'a, V> {
    inner: RawIter<'a>,
    _pd: PhantomData<&'a mut V>,
}

impl<'a, V> Iterator for IterMut<'a, V> {
    type Item = &'a mut V;
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, p)| unsafe { &mut *p.cast::<V>() })
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<V> ExactSizeIterator for IterMut<'_, V> {}
impl<V> FusedIterator for IterMut<'_, V> {}

/// Owning iteration in slot order.
pub struct IntoIter<V, X, S, A: TableAlloc> {
    table: HashTable<V, X, S, A>,
    pos: usize,
}

impl<V, X, S, A: TableAlloc> Iterator for IntoIter<V, X, S, A> {
    type Item = V;
    fn next(&mut self) -> Option<V> {
        let pos = self.table.raw.occupied_from(self.pos)?;
        self.pos = pos + 1;
        Some(self.table.take_at(Slot(pos)))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.len(), Some(self.table.len()))
    }
}

impl<V, X, S, A: TableAlloc> ExactSizeIterator for IntoIter<V, X, S, A> {}

impl<V, X, S, A: TableAlloc> IntoIterator for HashTable<V, X, S, A> {
    type Item = V;
    type IntoIter = IntoIter<V, X, S, A>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            table: self,
            pos: 0,
        }
    }
}

impl<'a, V, X, S, A: TableAlloc> IntoIterator for &'a HashTable<V, X, S, A> {
    type Item = &'a V;
    type IntoIter = Iter<'a, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, V, X, S, A: TableAlloc> IntoIterator for &'a mut HashTable<V, X, S, A> {
    type Item = &'a mut V;
    type IntoIter = IterMut<'a, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

//! HashMap: key/value pairs over [`HashTable`] with the [`PairFirst`] policy.

use crate::alloc::{Global, TableAlloc};
use crate::hash_table::{self, HashTable, PairFirst, Slot};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::ops::Index;
use std::collections::hash_map::RandomState;

pub struct HashMap<K, M, S = RandomState, A: TableAlloc = Global> {
    pub(crate) table: HashTable<(K, M), PairFirst, S, A>,
}

impl<K, M> HashMap<K, M> {
    pub fn new() -> Self {
        Self {
            table: HashTable::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: HashTable::with_capacity(capacity),
        }
    }
}

impl<K, M, S> HashMap<K, M, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: HashTable::with_hasher(hasher),
        }
    }
}

impl<K, M, A: TableAlloc> HashMap<K, M, RandomState, A> {
    pub fn new_in(alloc: A) -> Self {
        Self {
            table: HashTable::new_in(alloc),
        }
    }
}

impl<K, M, S, A: TableAlloc> HashMap<K, M, S, A> {
    pub fn with_hasher_in(hasher: S, alloc: A) -> Self {
        Self {
            table: HashTable::with_hasher_in(hasher, alloc),
        }
    }

    pub fn with_capacity_and_hasher_in(capacity: usize, hasher: S, alloc: A) -> Self {
        Self {
            table: HashTable::with_capacity_and_hasher_in(capacity, hasher, alloc),
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }
    pub fn hash_table_size(&self) -> usize {
        self.table.hash_table_size()
    }
    pub fn load_factor(&self) -> f32 {
        self.table.load_factor()
    }
    pub fn max_load_factor(&self) -> f32 {
        self.table.max_load_factor()
    }
    pub fn set_max_load_factor(&mut self, ml: f32) {
        self.table.set_max_load_factor(ml)
    }
    pub fn max_probe_distance(&self) -> usize {
        self.table.max_probe_distance()
    }
    pub fn hasher(&self) -> &S {
        self.table.hasher()
    }
    pub fn allocator(&self) -> &A {
        self.table.allocator()
    }
    pub fn clear(&mut self) {
        self.table.clear()
    }
    pub fn reserve(&mut self, capacity: usize) {
        self.table.reserve(capacity)
    }
    pub fn rehash(&mut self, buffer_size: usize) {
        self.table.rehash(buffer_size)
    }
    pub fn shrink_to_fit(&mut self) {
        self.table.shrink_to_fit()
    }

    pub fn first_slot(&self) -> Option<Slot> {
        self.table.first_slot()
    }
    pub fn next_slot(&self, slot: Slot) -> Option<Slot> {
        self.table.next_slot(slot)
    }

    pub fn get_slot(&self, slot: Slot) -> Option<(&K, &M)> {
        self.table.get_slot(slot).map(|(k, m)| (k, m))
    }

    pub fn get_slot_mut(&mut self, slot: Slot) -> Option<(&K, &mut M)> {
        self.table.get_slot_mut(slot).map(|(k, m)| (&*k, m))
    }

    /// Drops the entry at `slot`; returns the next occupied slot. Panics on
    /// an unoccupied slot.
    pub fn erase_at(&mut self, slot: Slot) -> Option<Slot> {
        self.table.erase_at(slot)
    }

    pub fn take_at(&mut self, slot: Slot) -> (K, M) {
        self.table.take_at(slot)
    }

    pub fn iter(&self) -> Iter<'_, K, M> {
        Iter {
            inner: self.table.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, M> {
        IterMut {
            inner: self.table.iter_mut(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &M> + '_ {
        self.iter().map(|(_, m)| m)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut M> + '_ {
        self.iter_mut().map(|(_, m)| m)
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.table.swap(&mut other.table)
    }

    pub fn clone_in<B: TableAlloc>(&self, alloc: B) -> HashMap<K, M, S, B>
    where
        K: Clone,
        M: Clone,
        S: Clone,
    {
        HashMap {
            table: self.table.clone_in(alloc),
        }
    }

    pub fn move_in(self, alloc: A) -> Self
    where
        A: PartialEq,
    {
        Self {
            table: self.table.move_in(alloc),
        }
    }
}

impl<K, M, S, A> HashMap<K, M, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    pub fn find_slot<Q>(&self, q: &Q) -> Option<Slot>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_slot(q)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&M>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(q).map(|(_, m)| m)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &M)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(q).map(|(k, m)| (k, m))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut M>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get_mut(q).map(|(_, m)| m)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(q)
    }

    pub fn count<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.count(q)
    }

    /// Inserts `key -> mapped` unless `key` is present (then nothing changes).
    /// Returns the slot holding `key` and whether an insertion happened.
    pub fn insert(&mut self, key: K, mapped: M) -> (Slot, bool) {
        self.table.insert((key, mapped))
    }

    /// Inserts `key -> mapped`, or overwrites only the mapped value of the
    /// existing entry. The entry does not move.
    pub fn insert_or_assign(&mut self, key: K, mapped: M) -> (Slot, bool) {
        let h = self.table.hash_of(&key);
        if let Some(pos) = self.table.find_hashed(h, &key) {
            let slot = Slot(pos);
            if let Some((_, m)) = self.table.get_slot_mut(slot) {
                *m = mapped;
            }
            return (slot, false);
        }
        (self.table.insert_new(h, (key, mapped)), true)
    }

    /// Inserts `key -> make()` if `key` is absent; `make` runs only then.
    pub fn emplace_with<F>(&mut self, key: K, make: F) -> (Slot, bool)
    where
        F: FnOnce() -> M,
    {
        let h = self.table.hash_of(&key);
        if let Some(pos) = self.table.find_hashed(h, &key) {
            return (Slot(pos), false);
        }
        (self.table.insert_new(h, (key, make())), true)
    }

    /// Drops the entry for `q`; returns 0 or 1.
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.erase(q)
    }

    pub fn remove<Q>(&mut self, q: &Q) -> Option<M>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(q).map(|(_, m)| m)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, M)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(q)
    }
}

impl<K, M, S: Default, A: TableAlloc + Default> Default for HashMap<K, M, S, A> {
    fn default() -> Self {
        Self {
            table: HashTable::default(),
        }
    }
}

impl<K: Clone, M: Clone, S: Clone, A: TableAlloc + Clone> Clone for HashMap<K, M, S, A> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K: fmt::Debug, M: fmt::Debug, S, A: TableAlloc> fmt::Debug for HashMap<K, M, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, M, S, A> PartialEq for HashMap<K, M, S, A>
where
    K: Hash + Eq,
    M: PartialEq,
    S: BuildHasher,
    A: TableAlloc,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, m)| other.get(k) == Some(m))
    }
}

impl<K: Hash + Eq, M: Eq, S: BuildHasher, A: TableAlloc> Eq for HashMap<K, M, S, A> {}

impl<K, M, Q, S, A> Index<&Q> for HashMap<K, M, S, A>
where
    K: Hash + Eq + Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    type Output = M;

    /// Panics if the key is absent.
    fn index(&self, q: &Q) -> &M {
        self.get(q).expect("key not found in HashMap")
    }
}

impl<K, M, S, A> Extend<(K, M)> for HashMap<K, M, S, A>
where
    K: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    /// Later pairs overwrite the mapped value of earlier ones.
    fn extend<I: IntoIterator<Item = (K, M)>>(&mut self, iter: I) {
        for (k, m) in iter {
            self.insert_or_assign(k, m);
        }
    }
}

impl<K, M, S, A> FromIterator<(K, M)> for HashMap<K, M, S, A>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
    A: TableAlloc + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, M)>>(iter: I) -> Self {
        let mut m = Self::default();
        m.extend(iter);
        m
    }
}

pub struct Iter<'a, K, M> {
    inner: hash_table::Iter<'a, (K, M)>,
}

impl<'a, K, M> Iterator for Iter<'a, K, M> {
    type Item = (&'a K, &'a M);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, m)| (k, m))
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, M> ExactSizeIterator for Iter<'_, K, M> {}
impl<K, M> FusedIterator for Iter<'_, K, M> {}

pub struct IterMut<'a, K, M> {
    inner: hash_table::IterMut<'a, (K, M)>,
}

impl<'a, K, M> Iterator for IterMut<'a, K, M> {
    type Item = (&'a K, &'a mut M);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, m)| (&*k, m))
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, M> ExactSizeIterator for IterMut<'_, K, M> {}
impl<K, M> FusedIterator for IterMut<'_, K, M> {}

impl<K, M, S, A: TableAlloc> IntoIterator for HashMap<K, M, S, A> {
    type Item = (K, M);
    type IntoIter = hash_table::IntoIter<(K, M), PairFirst, S, A>;
    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, K, M, S, A: TableAlloc> IntoIterator for &'a HashMap<K, M, S, A> {
    type Item = (&'a K, &'a M);
    type IntoIter = Iter<'a, K, M>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, M, S, A: TableAlloc> IntoIterator for &'a mut HashMap<K, M, S, A> {
    type Item = (&'a K, &'a mut M);
    type IntoIter = IterMut<'a, K, M>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

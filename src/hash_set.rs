//! HashSet: values that are their own keys ([`Identity`] policy).

use crate::alloc::{Global, TableAlloc};
use crate::hash_table::{self, HashTable, Identity, Slot};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use std::collections::hash_map::RandomState;

pub struct HashSet<T, S = RandomState, A: TableAlloc = Global> {
    pub(crate) table: HashTable<T, Identity, S, A>,
}

impl<T> HashSet<T> {
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

impl<T, S> HashSet<T, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            table: HashTable::with_hasher(hasher),
        }
    }
}

impl<T, A: TableAlloc> HashSet<T, RandomState, A> {
    pub fn new_in(alloc: A) -> Self {
        Self {
            table: HashTable::new_in(alloc),
        }
    }
}

impl<T, S, A: TableAlloc> HashSet<T, S, A> {
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
    pub fn get_slot(&self, slot: Slot) -> Option<&T> {
        self.table.get_slot(slot)
    }
    pub fn erase_at(&mut self, slot: Slot) -> Option<Slot> {
        self.table.erase_at(slot)
    }
    pub fn take_at(&mut self, slot: Slot) -> T {
        self.table.take_at(slot)
    }

    /// Slot-order iteration. Sets hand out shared references only.
    pub fn iter(&self) -> hash_table::Iter<'_, T> {
        self.table.iter()
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.table.swap(&mut other.table)
    }

    pub fn clone_in<B: TableAlloc>(&self, alloc: B) -> HashSet<T, S, B>
    where
        T: Clone,
        S: Clone,
    {
        HashSet {
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

impl<T, S, A> HashSet<T, S, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    pub fn find_slot<Q>(&self, q: &Q) -> Option<Slot>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.find_slot(q)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.contains(q)
    }

    pub fn count<Q>(&self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.count(q)
    }

    /// The stored value equal to `q`.
    pub fn get<Q>(&self, q: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.get(q)
    }

    /// Inserts `value` unless an equal value is present; returns the slot
    /// holding it and whether it was inserted.
    pub fn insert(&mut self, value: T) -> (Slot, bool) {
        self.table.insert(value)
    }

    /// Inserts `value`, replacing an equal resident in place.
    pub fn replace(&mut self, value: T) -> (Slot, bool) {
        self.table.insert_or_assign(value)
    }

    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.erase(q)
    }

    pub fn take<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.table.remove(q)
    }
}

impl<T, S: Default, A: TableAlloc + Default> Default for HashSet<T, S, A> {
    fn default() -> Self {
        Self {
            table: HashTable::default(),
        }
    }
}

impl<T: Clone, S: Clone, A: TableAlloc + Clone> Clone for HashSet<T, S, A> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<T: fmt::Debug, S, A: TableAlloc> fmt::Debug for HashSet<T, S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, S, A> PartialEq for HashSet<T, S, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl<T: Hash + Eq, S: BuildHasher, A: TableAlloc> Eq for HashSet<T, S, A> {}

impl<T, S, A> Extend<T> for HashSet<T, S, A>
where
    T: Hash + Eq,
    S: BuildHasher,
    A: TableAlloc,
{
    /// Later values replace equal earlier ones.
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.table.extend(iter)
    }
}

impl<T, S, A> FromIterator<T> for HashSet<T, S, A>
where
    T: Hash + Eq,
    S: BuildHasher + Default,
    A: TableAlloc + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            table: HashTable::from_iter(iter),
        }
    }
}

impl<T, S, A: TableAlloc> IntoIterator for HashSet<T, S, A> {
    type Item = T;
    type IntoIter = hash_table::IntoIter<T, Identity, S, A>;
    fn into_iter(self) -> Self::IntoIter {
        self.table.into_iter()
    }
}

impl<'a, T, S, A: TableAlloc> IntoIterator for &'a HashSet<T, S, A> {
    type Item = &'a T;
    type IntoIter = hash_table::Iter<'a, T>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_contains_erase() {
        let mut s: HashSet<String> = HashSet::new();
        assert!(s.insert("a".into()).1);
        assert!(!s.insert("a".into()).1);
        assert!(s.contains("a"));
        assert_eq!(s.count("b"), 0);
        assert_eq!(s.erase("a"), 1);
        assert_eq!(s.erase("a"), 0);
        assert!(s.is_empty());
    }

    #[test]
    fn take_moves_value_out() {
        let mut s: HashSet<Vec<u8>> = HashSet::new();
        s.insert(vec![1, 2, 3]);
        assert_eq!(s.take(&[1u8, 2, 3][..]), Some(vec![1, 2, 3]));
        assert_eq!(s.len(), 0);
    }

    /// Invariant: set equality does not depend on insertion order or buffer size.
    #[test]
    fn equality_is_order_independent() {
        let a: HashSet<u32> = (0..100).collect();
        let mut b: HashSet<u32> = HashSet::with_capacity(1000);
        b.extend((0..100).rev());
        assert_ne!(a.hash_table_size(), b.hash_table_size());
        assert_eq!(a, b);
    }
}

//! serde support for the typed containers.
//!
//! Every container is a sequence of its elements in slot order; a map entry
//! is a `(key, value)` tuple. That is the array format the erased table
//! writes, so a typed map and an erased map of the same types produce the
//! same JSON. Deserialization inserts with `insert_or_assign`: a repeated
//! key keeps its last value.

use crate::alloc::TableAlloc;
use crate::hash_map::HashMap;
use crate::hash_set::HashSet;
use crate::hash_table::{ExtractKey, HashTable};
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::marker::PhantomData;
use serde::de::{Deserialize, Deserializer, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeSeq, Serializer};

// Pre-sizing from an untrusted length hint is capped.
const MAX_PREALLOC: usize = 4096;

impl<V, X, S, A> Serialize for HashTable<V, X, S, A>
where
    V: Serialize,
    A: TableAlloc,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<K, M, S, A> Serialize for HashMap<K, M, S, A>
where
    K: Serialize,
    M: Serialize,
    A: TableAlloc,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for entry in self.iter() {
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }
}

impl<T, S, A> Serialize for HashSet<T, S, A>
where
    T: Serialize,
    A: TableAlloc,
{
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        self.table.serialize(serializer)
    }
}

struct TableVisitor<V, X, S, A> {
    _pd: PhantomData<fn() -> (V, X, S, A)>,
}

impl<'de, V, X, S, A> Visitor<'de> for TableVisitor<V, X, S, A>
where
    V: Deserialize<'de>,
    X: ExtractKey<V>,
    X::Key: Hash + Eq,
    S: BuildHasher + Default,
    A: TableAlloc + Default,
{
    type Value = HashTable<V, X, S, A>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a sequence of table elements")
    }

    fn visit_seq<Acc: SeqAccess<'de>>(self, mut seq: Acc) -> Result<Self::Value, Acc::Error> {
        let mut table = HashTable::default();
        table.reserve(seq.size_hint().unwrap_or(0).min(MAX_PREALLOC));
        while let Some(v) = seq.next_element()? {
            table.insert_or_assign(v);
        }
        Ok(table)
    }
}

impl<'de, V, X, S, A> Deserialize<'de> for HashTable<V, X, S, A>
where
    V: Deserialize<'de>,
    X: ExtractKey<V>,
    X::Key: Hash + Eq,
    S: BuildHasher + Default,
    A: TableAlloc + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_seq(TableVisitor { _pd: PhantomData })
    }
}

impl<'de, K, M, S, A> Deserialize<'de> for HashMap<K, M, S, A>
where
    K: Deserialize<'de> + Hash + Eq,
    M: Deserialize<'de>,
    S: BuildHasher + Default,
    A: TableAlloc + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(HashMap {
            table: HashTable::deserialize(deserializer)?,
        })
    }
}

impl<'de, T, S, A> Deserialize<'de> for HashSet<T, S, A>
where
    T: Deserialize<'de> + Hash + Eq,
    S: BuildHasher + Default,
    A: TableAlloc + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(HashSet {
            table: HashTable::deserialize(deserializer)?,
        })
    }
}

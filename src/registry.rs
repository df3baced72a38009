//! TypeRegistry: named runtime types with stable handles.
//!
//! Descriptors live in a `SlotMap`, so a [`TypeHandle`] of an unregistered
//! type is detected instead of aliasing a newer one. Names are indexed
//! through a `hashbrown::HashTable` of slot keys, and pair instantiations
//! are cached so `Pair<K, V>` is built once per `(K, V)`.

use crate::erased_table::ErasedTable;
use crate::error::RegistryError;
use crate::type_desc::TypeDesc;
use core::hash::{BuildHasher, Hash};
use hashbrown::HashTable;
use serde::de::DeserializeOwned;
use serde::Serialize;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TypeHandle(DefaultKey);

pub struct TypeRegistry {
    types: SlotMap<DefaultKey, Arc<TypeDesc>>,
    by_name: HashTable<DefaultKey>,
    pairs: hashbrown::HashMap<(DefaultKey, DefaultKey), DefaultKey>,
    hasher: RandomState,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: SlotMap::with_key(),
            by_name: HashTable::new(),
            pairs: hashbrown::HashMap::new(),
            hasher: RandomState::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn name_hash(&self, name: &str) -> u64 {
        self.hasher.hash_one(name)
    }

    fn find_name(&self, name: &str) -> Option<DefaultKey> {
        let hash = self.name_hash(name);
        self.by_name
            .find(hash, |&k| self.types.get(k).is_some_and(|d| d.name() == name))
            .copied()
    }

    /// Registers `desc` under its name.
    pub fn register(&mut self, desc: TypeDesc) -> Result<TypeHandle, RegistryError> {
        self.insert(Arc::new(desc))
    }

    /// Registers the Rust type `T` under `name`.
    pub fn register_type<T>(&mut self, name: &str) -> Result<TypeHandle, RegistryError>
    where
        T: Default + Clone + Hash + Eq + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        self.register(TypeDesc::of::<T>(name))
    }

    fn insert(&mut self, desc: Arc<TypeDesc>) -> Result<TypeHandle, RegistryError> {
        if self.find_name(desc.name()).is_some() {
            return Err(RegistryError::DuplicateName(desc.name().to_string()));
        }
        let hash = self.name_hash(desc.name());
        tracing::debug!(name = desc.name(), size = desc.layout().size(), "register type");
        let k = self.types.insert(desc);
        let types = &self.types;
        let hasher = &self.hasher;
        self.by_name.insert_unique(hash, k, |&kk| {
            hasher.hash_one(types.get(kk).map(|d| d.name()).unwrap_or_default())
        });
        Ok(TypeHandle(k))
    }

    pub fn lookup(&self, name: &str) -> Option<TypeHandle> {
        self.find_name(name).map(TypeHandle)
    }

    pub fn get(&self, handle: TypeHandle) -> Result<&Arc<TypeDesc>, RegistryError> {
        self.types.get(handle.0).ok_or(RegistryError::UnknownType)
    }

    /// The `Pair<key, value>` instantiation, built and registered on first use.
    pub fn pair(&mut self, key: TypeHandle, value: TypeHandle) -> Result<TypeHandle, RegistryError> {
        if let Some(&k) = self.pairs.get(&(key.0, value.0)) {
            return Ok(TypeHandle(k));
        }
        let kd = self.get(key)?.clone();
        let vd = self.get(value)?.clone();
        let desc = TypeDesc::pair(kd, vd);
        tracing::debug!(name = desc.name(), "instantiate pair");
        let handle = match self.find_name(desc.name()) {
            // Registered by hand under the canonical name, over the same parts.
            Some(existing) if self.types[existing].same_type(&desc) => TypeHandle(existing),
            Some(_) => return Err(RegistryError::DuplicateName(desc.name().to_string())),
            None => self.insert(Arc::new(desc))?,
        };
        self.pairs.insert((key.0, value.0), handle.0);
        Ok(handle)
    }

    /// Removes a type together with every registered pair built over it,
    /// directly or through another pair. Tables already holding a removed
    /// descriptor keep it alive; the handles stop resolving and the names
    /// are free again.
    pub fn unregister(&mut self, handle: TypeHandle) -> Result<Arc<TypeDesc>, RegistryError> {
        let desc = self.remove_entry(handle.0).ok_or(RegistryError::UnknownType)?;
        tracing::debug!(name = desc.name(), "unregister type");
        let mut gone = vec![desc.clone()];
        while let Some(d) = gone.pop() {
            let dependents: Vec<DefaultKey> = self
                .types
                .iter()
                .filter(|(_, t)| {
                    t.pair_parts()
                        .is_some_and(|(k, v)| Arc::ptr_eq(k, &d) || Arc::ptr_eq(v, &d))
                })
                .map(|(k, _)| k)
                .collect();
            for k in dependents {
                if let Some(pair) = self.remove_entry(k) {
                    tracing::debug!(name = pair.name(), "unregister dependent pair");
                    gone.push(pair);
                }
            }
        }
        Ok(desc)
    }

    fn remove_entry(&mut self, k: DefaultKey) -> Option<Arc<TypeDesc>> {
        let desc = self.types.remove(k)?;
        let hash = self.name_hash(desc.name());
        if let Ok(entry) = self.by_name.find_entry(hash, |&kk| kk == k) {
            let _ = entry.remove();
        }
        self.pairs.retain(|&(a, b), p| a != k && b != k && *p != k);
        Some(desc)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeHandle, &Arc<TypeDesc>)> + '_ {
        self.types.iter().map(|(k, d)| (TypeHandle(k), d))
    }

    /// An empty erased set of `elem`.
    pub fn new_set(&self, elem: TypeHandle) -> Result<ErasedTable, RegistryError> {
        Ok(ErasedTable::new_set(self.get(elem)?.clone()))
    }

    /// An empty erased map from `key` to `value`.
    pub fn new_map(&mut self, key: TypeHandle, value: TypeHandle) -> Result<ErasedTable, RegistryError> {
        let pair = self.pair(key, value)?;
        self.new_set(pair)
    }
}

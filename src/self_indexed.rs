//! Self-indexed maps: values that carry their own key.
//!
//! A self-indexed map stores whole values and finds them by a key borrowed
//! out of each value through a user
//! [`ExtractKey`](crate::hash_table::ExtractKey) policy. It is the generic
//! table itself; nothing is layered on top.
//!
//! ```
//! use rh_table::{ExtractKey, SelfIndexedHashMap};
//!
//! struct Asset {
//!     path: String,
//!     bytes: usize,
//! }
//!
//! struct ByPath;
//! impl ExtractKey<Asset> for ByPath {
//!     type Key = String;
//!     fn extract(a: &Asset) -> &String {
//!         &a.path
//!     }
//! }
//!
//! let mut assets: SelfIndexedHashMap<Asset, ByPath> = SelfIndexedHashMap::new();
//! assets.insert(Asset { path: "a.png".into(), bytes: 10 });
//! assets.get_mut("a.png").unwrap().bytes = 12; // not the key
//! assert_eq!(assets.get("a.png").map(|a| a.bytes), Some(12));
//! ```
//!
//! `get_mut`, `get_slot_mut` and `iter_mut` must leave the key part alone.
//! The table stores the hash taken at insertion and would stop finding a
//! value whose key changed.

use crate::alloc::Global;
use crate::hash_table::HashTable;
use std::collections::hash_map::RandomState;

pub type SelfIndexedHashMap<V, X, S = RandomState, A = Global> = HashTable<V, X, S, A>;

//! rh-table: open-addressing hash tables built on Robin Hood hashing,
//! with a type-erased twin for values whose type is only known at run
//! time.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: one placement engine shared by every table, so typed and
//!   erased tables cannot disagree on where an element lives, when the
//!   table grows, or in what order it iterates.
//! - Layers:
//!   - `control`: control-word encoding (EMPTY, tombstone bit, hash tag),
//!     probe distance and growth math.
//!   - `raw::RawTable`: paired value/control buffers and the Robin Hood
//!     engine (`place`, `find`, rehash, erase). It never names an element
//!     type; a `SlotOps` capability tells it how to drop and move one.
//!   - `HashTable<V, X, S, A>`: the typed table. Keys are borrowed out of
//!     stored values by an `ExtractKey` policy `X`.
//!   - `HashMap`, `HashSet`, `SelfIndexedHashMap`: the table under the
//!     pair-first, identity and user policies.
//!   - `TypeDesc` / `TypeRegistry` / `ErasedTable`: runtime descriptors
//!     acting as `SlotOps`, and the table that stores their values.
//!
//! Constraints
//! - Control word 0 is EMPTY; the top bit marks a tombstone; any other
//!   value is the element's hash tag. Hashes are remapped so a live tag is
//!   never 0 and never has the top bit set.
//! - Deletion tombstones the slot. Survivors are never shifted, so a slot
//!   index stays valid until that element is erased or the table rehashes.
//! - `len() <= capacity() = floor(max_load_factor * hash_table_size())`
//!   after every operation; the smallest buffer is 16 slots.
//! - Nothing is allocated before the first insertion. Growth builds new
//!   buffers, moves every element over, then frees the old pair.
//! - Iteration is slot-index order everywhere, including serialization.
//!
//! Hashing
//! - The control word caches the hash, so rehashing never calls
//!   `Hash` again. Lookups compare hash tags before calling `Eq`.
//! - Keys must not change while stored. `get_mut` and friends hand out
//!   whole values; changing the key part breaks lookups (not memory
//!   safety).
//!
//! Failure model
//! - Contract violations panic: erasing an unoccupied slot, a load factor
//!   outside `(0, 1]`, inserting a value of the wrong runtime type.
//! - Allocation failure is the allocator's policy (`Global` calls
//!   `handle_alloc_error`).
//! - The reflection surface (JSON, registry) returns `Result`s.
//!
//! Notes and non-goals
//! - No internal locking; tables are `Send`/`Sync` when their contents
//!   are.
//! - No backward-shift deletion; tombstones are cleared by rehashing.
//! - Rehashes are logged with `tracing` at trace level; the registry logs
//!   at debug level. No subscriber is installed here.

pub mod alloc;
pub mod control;
pub mod erased_table;
pub mod error;
pub mod hash_map;
pub mod hash_set;
pub mod hash_table;
mod hash_table_proptest;
mod raw;
pub mod registry;
mod self_indexed;
mod serde_impls;
pub mod type_desc;

// Public surface
pub use alloc::{Global, TableAlloc};
pub use erased_table::ErasedTable;
pub use error::{RegistryError, SerializeError};
pub use hash_map::HashMap;
pub use hash_set::HashSet;
pub use hash_table::{ExtractKey, HashTable, Identity, PairFirst, Slot};
pub use registry::{TypeHandle, TypeRegistry};
pub use self_indexed::SelfIndexedHashMap;
pub use type_desc::{ErasedRef, ErasedValue, TypeDesc};

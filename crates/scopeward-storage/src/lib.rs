//! Scopeward Storage - namespaced key-value persistence.
//!
//! The proposal lifecycle keeps one JSON record per proposal. Status
//! transitions must be atomic per record, so the [`KvStore`] trait carries a
//! [`compare_and_swap`](KvStore::compare_and_swap) primitive next to the
//! usual `get`/`set`/`delete`.
//!
//! # Backends
//!
//! - [`MemoryKvStore`]: in-process, always available
//! - `SurrealKvStore`: embedded `SurrealKV` LSM tree, behind the **`kv`**
//!   feature

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod kv;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore, ScopedKvStore, decode_json, encode_json};

#[cfg(feature = "kv")]
pub use kv::SurrealKvStore;

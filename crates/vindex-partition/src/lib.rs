//! Partition routing (`spec.md` §4.3, component C3).
//!
//! A partition scheme is a pure function from a key (or range) to one or
//! more bucket-identifying partition strings. Nothing here holds state or
//! talks to an actor — that's [`vindex-client`](../vindex_client)'s job.

mod datetime_scheme;
mod hash;
mod hash_scheme;

pub use datetime_scheme::DateTimePartitionScheme;
pub use hash::{stable_bytes_hash, stable_key_hash, stable_string_hash};
pub use hash_scheme::HashPartitionScheme;

//! Persistence bridge: the storage seam the bucket state machine, the
//! indexed-state controller, and the write-ahead queue all persist through
//! (`spec.md` §5, §7).
//!
//! [`StorageBridge`] is the trait every component above this crate depends
//! on; [`HeedStorageBridge`] is the durable LMDB-backed implementation and
//! [`MemoryStorageBridge`] is the in-memory fallback used by tests and by
//! hosts that haven't wired up durable storage yet.

mod bridge;
mod error;
mod heed_backend;
mod memory;
mod retry;

pub use bridge::{StorageBridge, StorageRevision, StoredRecord};
pub use error::StorageError;
pub use heed_backend::{HeedStorageBridge, SharedHeedStorageBridge};
pub use memory::MemoryStorageBridge;
pub use retry::with_retry;

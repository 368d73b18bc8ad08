use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// An opaque optimistic-concurrency token returned on every read and
/// required on every write (`spec.md` §5, §7). Callers never construct one
/// directly; they round-trip whatever [`StorageBridge::read`] handed them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageRevision(pub u64);

impl StorageRevision {
	/// The revision of a record that has never been written.
	pub const ABSENT: StorageRevision = StorageRevision(0);
}

/// A record read back from storage, with the revision it must be written
/// against next.
#[derive(Debug, Clone)]
pub struct StoredRecord {
	/// Raw bytes as last written (typically a `postcard`-encoded payload).
	pub bytes: Vec<u8>,
	/// Revision to pass as `expected_revision` on the next write.
	pub revision: StorageRevision,
}

/// Persistence bridge for bucket state, indexed-state envelopes, and
/// indexing-queue state (`spec.md` §1: "the actor runtime itself... is an
/// external collaborator" — this trait is the seam between that runtime's
/// storage and this crate's logic).
///
/// `collection` names the logical table (`"bucket"`, `"envelope"`,
/// `"queue"`); `key` is the record's primary key within it. Implementations
/// need not create collections ahead of time.
#[async_trait]
pub trait StorageBridge: Send + Sync {
	/// Reads a record, or `None` if it has never been written.
	async fn read(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, StorageError>;

	/// Writes a record, enforcing that the record's current revision equals
	/// `expected_revision` (`StorageRevision::ABSENT` for "must not yet
	/// exist"). Returns the new revision on success, or
	/// [`StorageError::Conflict`] if the expectation didn't hold.
	async fn write(
		&self,
		collection: &str,
		key: &str,
		bytes: Vec<u8>,
		expected_revision: StorageRevision,
	) -> Result<StorageRevision, StorageError>;

	/// Deletes a record outright (used by test fixtures and by cleanup of
	/// disposed buckets); does not require a revision check.
	async fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError>;
}

use thiserror::Error;

/// Errors raised by a [`crate::StorageBridge`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
	/// The write's `expected_revision` didn't match the record's current
	/// revision — another writer committed first. Retried with backoff by
	/// [`crate::with_retry`] (`spec.md` §5, §7).
	#[error("optimistic-concurrency conflict on {collection}/{key}")]
	Conflict {
		/// Collection (`bucket`, `envelope`, or `queue`) the conflict occurred in.
		collection: String,
		/// Record key within the collection.
		key: String,
	},

	/// The underlying LMDB environment or transaction failed.
	#[error("LMDB error: {0}")]
	Backend(#[from] heed3::Error),

	/// Record bytes could not be written or read back.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

impl StorageError {
	/// Whether this error is the kind [`crate::with_retry`] should retry.
	pub fn is_conflict(&self) -> bool {
		matches!(self, Self::Conflict { .. })
	}
}

use thiserror::Error;

/// Error taxonomy for the secondary-indexing subsystem (`spec.md` §7).
///
/// No exceptions are used for normal control flow: bucket-full is a boolean
/// return consumed by chain logic, and uniqueness detection is the one
/// dedicated typed error a caller must branch on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexingError {
	/// An insert or update would put a second grain under a unique key.
	#[error("uniqueness violation on index '{index}' for key {key}: already held by {holder}")]
	UniquenessViolation {
		/// Name of the unique index that rejected the write.
		index: String,
		/// String form of the offending key.
		key: String,
		/// String form of the grain already holding the key.
		holder: String,
	},

	/// `before`/`after` nullity violates the op preconditions in `spec.md` §3.
	/// A programmer error, surfaced immediately rather than retried.
	#[error("invalid update: {reason}")]
	InvalidUpdate {
		/// Human-readable description of the violated precondition.
		reason: String,
	},

	/// Operation against a bucket whose status is `UnderConstruction` or
	/// `Disposed`.
	#[error("index unavailable: {reason}")]
	IndexUnavailable {
		/// Human-readable description of why the bucket is unavailable.
		reason: String,
	},

	/// Optimistic-concurrency failure on persistence, exhausted its retry
	/// budget (`spec.md` §5, §7).
	#[error("storage conflict: {detail}")]
	StorageConflict {
		/// Detail surfaced from the persistence bridge.
		detail: String,
	},

	/// Unhandled failure in the queue drain loop; the queue actor
	/// deactivates and replays from the last persisted punctuation on
	/// reactivation.
	#[error("queue processing failure: {detail}")]
	QueueProcessingFailure {
		/// Detail describing the failure that deactivated the queue.
		detail: String,
	},
}

impl IndexingError {
	/// Builds a [`IndexingError::StorageConflict`] from any displayable
	/// storage-layer error. Kept as a free function (rather than a `From`
	/// impl) so crates below this one in the dependency order never need to
	/// depend back on a storage crate's concrete error type.
	pub fn storage_conflict(detail: impl std::fmt::Display) -> Self {
		Self::StorageConflict {
			detail: detail.to_string(),
		}
	}
}

use thiserror::Error;

/// Errors raised validating an [`crate::IndexingSystemConfig`].
///
/// Binding this struct from a config file or environment is an external
/// collaborator's job (`spec.md` §1); this crate only defines the struct's
/// shape and checks it is internally consistent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
	/// A parallelism-cap field was configured as zero, which would make
	/// every bounded fan-out unable to make progress.
	#[error("'{field}' must be greater than zero")]
	ZeroParallelism {
		/// Name of the offending field.
		field: &'static str,
	},

	/// `IndexingQueueOutputBufferTimeOut` was configured as zero, which
	/// would make every batch complete immediately regardless of count
	/// (`spec.md` §4.6 step 1 requires either threshold to be meaningful).
	#[error("'IndexingQueueOutputBufferTimeOut' must be greater than zero")]
	ZeroBatchTimeout,

	/// The storage provider name was left empty.
	#[error("'IndexingQueueStorageProviderName' must not be empty")]
	EmptyStorageProviderName,
}

/// Result type for configuration validation.
pub type Result<T> = std::result::Result<T, ConfigError>;

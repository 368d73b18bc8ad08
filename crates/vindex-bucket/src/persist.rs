use std::sync::Arc;

use vindex_storage::{StorageBridge, StorageRevision, with_retry};
use vindex_types::IndexingError;

use crate::state::BucketState;

/// Storage collection every bucket's state round-trips through.
pub const COLLECTION: &str = "bucket";

/// Loads a bucket's persisted state, if any has been written yet.
pub async fn load(
	storage: &Arc<dyn StorageBridge>,
	primary_key: &str,
) -> Result<Option<(BucketState, StorageRevision)>, IndexingError> {
	let record = storage
		.read(COLLECTION, primary_key)
		.await
		.map_err(IndexingError::storage_conflict)?;
	let Some(record) = record else {
		return Ok(None);
	};
	let state = BucketState::from_bytes(&record.bytes).map_err(IndexingError::storage_conflict)?;
	Ok(Some((state, record.revision)))
}

/// Persists `state`, retrying on optimistic-concurrency conflicts
/// (`spec.md` §5).
pub async fn save(
	storage: &Arc<dyn StorageBridge>,
	primary_key: &str,
	state: &BucketState,
	expected_revision: StorageRevision,
) -> Result<StorageRevision, IndexingError> {
	let bytes = state.to_bytes().map_err(IndexingError::storage_conflict)?;
	with_retry(|| async {
		storage
			.write(COLLECTION, primary_key, bytes.clone(), expected_revision)
			.await
	})
	.await
	.map_err(IndexingError::storage_conflict)
}

use std::sync::Arc;

use vindex_storage::{with_retry, StorageBridge, StorageRevision};
use vindex_types::IndexingError;

use crate::entry::QueueState;

/// Storage collection every queue's state round-trips through.
pub const COLLECTION: &str = "queue";

/// Loads a queue's persisted state, if any has been written yet.
pub async fn load(
	storage: &Arc<dyn StorageBridge>,
	queue_key: &str,
) -> Result<Option<(QueueState, StorageRevision)>, IndexingError> {
	let record = storage
		.read(COLLECTION, queue_key)
		.await
		.map_err(IndexingError::storage_conflict)?;
	let Some(record) = record else {
		return Ok(None);
	};
	let state = QueueState::from_bytes(&record.bytes).map_err(IndexingError::storage_conflict)?;
	Ok(Some((state, record.revision)))
}

/// Persists `state`, retrying on optimistic-concurrency conflicts
/// (`spec.md` §5).
pub async fn save(
	storage: &Arc<dyn StorageBridge>,
	queue_key: &str,
	state: &QueueState,
	expected_revision: StorageRevision,
) -> Result<StorageRevision, IndexingError> {
	let bytes = state.to_bytes().map_err(IndexingError::storage_conflict)?;
	with_retry(|| async {
		storage
			.write(COLLECTION, queue_key, bytes.clone(), expected_revision)
			.await
	})
	.await
	.map_err(IndexingError::storage_conflict)
}

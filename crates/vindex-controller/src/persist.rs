use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use vindex_storage::{with_retry, StorageBridge, StorageRevision};
use vindex_types::IndexingError;

use crate::envelope::IndexedStateEnvelope;

/// Storage collection every grain's envelope round-trips through.
pub const COLLECTION: &str = "envelope";

/// Loads a grain's persisted envelope, if any has been written yet.
pub async fn load<T>(
	storage: &Arc<dyn StorageBridge>,
	grain_key: &str,
) -> Result<Option<(IndexedStateEnvelope<T>, StorageRevision)>, IndexingError>
where
	T: DeserializeOwned,
{
	let record = storage
		.read(COLLECTION, grain_key)
		.await
		.map_err(IndexingError::storage_conflict)?;
	let Some(record) = record else {
		return Ok(None);
	};
	let envelope: IndexedStateEnvelope<T> =
		postcard::from_bytes(&record.bytes).map_err(IndexingError::storage_conflict)?;
	Ok(Some((envelope, record.revision)))
}

/// Persists `envelope`, retrying on optimistic-concurrency conflicts
/// (`spec.md` §5).
pub async fn save<T>(
	storage: &Arc<dyn StorageBridge>,
	grain_key: &str,
	envelope: &IndexedStateEnvelope<T>,
	expected_revision: StorageRevision,
) -> Result<StorageRevision, IndexingError>
where
	T: Serialize,
{
	let bytes = postcard::to_allocvec(envelope).map_err(IndexingError::storage_conflict)?;
	with_retry(|| async {
		storage
			.write(COLLECTION, grain_key, bytes.clone(), expected_revision)
			.await
	})
	.await
	.map_err(IndexingError::storage_conflict)
}

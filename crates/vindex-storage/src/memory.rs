use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bridge::{StorageBridge, StorageRevision, StoredRecord};
use crate::error::StorageError;

/// In-memory [`StorageBridge`], for tests and for hosts that haven't wired
/// up durable storage. Never survives a process restart — never use this
/// for anything the write-ahead queue's recovery guarantees depend on.
#[derive(Default)]
pub struct MemoryStorageBridge {
	records: Mutex<HashMap<(String, String), (Vec<u8>, u64)>>,
}

impl MemoryStorageBridge {
	/// An empty store.
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageBridge for MemoryStorageBridge {
	async fn read(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, StorageError> {
		let records = self.records.lock();
		Ok(records
			.get(&(collection.to_string(), key.to_string()))
			.map(|(bytes, rev)| StoredRecord {
				bytes: bytes.clone(),
				revision: StorageRevision(*rev),
			}))
	}

	async fn write(
		&self,
		collection: &str,
		key: &str,
		bytes: Vec<u8>,
		expected_revision: StorageRevision,
	) -> Result<StorageRevision, StorageError> {
		let mut records = self.records.lock();
		let entry_key = (collection.to_string(), key.to_string());
		let current_revision = records.get(&entry_key).map(|(_, rev)| *rev).unwrap_or(0);
		if current_revision != expected_revision.0 {
			return Err(StorageError::Conflict {
				collection: collection.to_string(),
				key: key.to_string(),
			});
		}
		let next_revision = current_revision + 1;
		records.insert(entry_key, (bytes, next_revision));
		Ok(StorageRevision(next_revision))
	}

	async fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError> {
		self.records
			.lock()
			.remove(&(collection.to_string(), key.to_string()));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn write_then_read_round_trips() {
		let bridge = MemoryStorageBridge::new();
		let rev = bridge
			.write("bucket", "k1", b"hello".to_vec(), StorageRevision::ABSENT)
			.await
			.unwrap();
		let record = bridge.read("bucket", "k1").await.unwrap().unwrap();
		assert_eq!(record.bytes, b"hello");
		assert_eq!(record.revision, rev);
	}

	#[tokio::test]
	async fn write_with_stale_revision_conflicts() {
		let bridge = MemoryStorageBridge::new();
		bridge
			.write("bucket", "k1", b"v1".to_vec(), StorageRevision::ABSENT)
			.await
			.unwrap();
		let result = bridge
			.write("bucket", "k1", b"v2".to_vec(), StorageRevision::ABSENT)
			.await;
		assert!(matches!(result, Err(StorageError::Conflict { .. })));
	}

	#[tokio::test]
	async fn delete_removes_the_record() {
		let bridge = MemoryStorageBridge::new();
		bridge
			.write("queue", "k1", b"v1".to_vec(), StorageRevision::ABSENT)
			.await
			.unwrap();
		bridge.delete("queue", "k1").await.unwrap();
		assert!(bridge.read("queue", "k1").await.unwrap().is_none());
	}
}

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use heed3::types::{Bytes, Str};
use heed3::{Database, Env, EnvOpenOptions};

use crate::bridge::{StorageBridge, StorageRevision, StoredRecord};
use crate::error::StorageError;

const COLLECTIONS: [&str; 3] = ["bucket", "envelope", "queue"];
const REVISION_PREFIX_LEN: usize = 8;

/// Durable [`StorageBridge`] over an LMDB environment, one named database
/// per collection. Revisions are stored as an 8-byte big-endian prefix
/// ahead of the payload bytes, so a conflict check never needs a second
/// lookup table.
pub struct HeedStorageBridge {
	env: Env,
	databases: HashMap<&'static str, Database<Str, Bytes>>,
}

impl HeedStorageBridge {
	/// Opens (creating if absent) an LMDB environment at `path` with a
	/// database for each of `bucket`, `envelope`, and `queue`.
	///
	/// # Safety-adjacent note
	///
	/// `EnvOpenOptions::open` is `unsafe` because LMDB memory-maps the data
	/// file; callers must not open the same path from incompatible LMDB
	/// configurations concurrently. This mirrors the one call site the
	/// teacher's own `HistoryStore` wraps the same way.
	pub fn open(path: &Path, map_size_bytes: usize) -> Result<Self, StorageError> {
		std::fs::create_dir_all(path)?;
		let env = unsafe {
			EnvOpenOptions::new()
				.map_size(map_size_bytes)
				.max_dbs(COLLECTIONS.len() as u32)
				.open(path)?
		};

		let mut wtxn = env.write_txn()?;
		let mut databases = HashMap::with_capacity(COLLECTIONS.len());
		for name in COLLECTIONS {
			let db: Database<Str, Bytes> = env.create_database(&mut wtxn, Some(name))?;
			databases.insert(name, db);
		}
		wtxn.commit()?;

		Ok(Self { env, databases })
	}

	fn database(&self, collection: &str) -> Result<Database<Str, Bytes>, StorageError> {
		COLLECTIONS
			.iter()
			.find(|&&name| name == collection)
			.and_then(|&name| self.databases.get(name))
			.copied()
			.ok_or_else(|| StorageError::Conflict {
				collection: collection.to_string(),
				key: String::new(),
			})
	}

	fn encode(revision: u64, payload: &[u8]) -> Vec<u8> {
		let mut out = Vec::with_capacity(REVISION_PREFIX_LEN + payload.len());
		out.extend_from_slice(&revision.to_be_bytes());
		out.extend_from_slice(payload);
		out
	}

	fn decode(raw: &[u8]) -> (u64, &[u8]) {
		let (prefix, payload) = raw.split_at(REVISION_PREFIX_LEN.min(raw.len()));
		let mut buf = [0u8; REVISION_PREFIX_LEN];
		buf[..prefix.len()].copy_from_slice(prefix);
		(u64::from_be_bytes(buf), payload)
	}
}

#[async_trait]
impl StorageBridge for HeedStorageBridge {
	async fn read(&self, collection: &str, key: &str) -> Result<Option<StoredRecord>, StorageError> {
		let db = self.database(collection)?;
		let rtxn = self.env.read_txn()?;
		let raw = db.get(&rtxn, key)?;
		Ok(raw.map(|raw| {
			let (revision, payload) = Self::decode(raw);
			StoredRecord {
				bytes: payload.to_vec(),
				revision: StorageRevision(revision),
			}
		}))
	}

	async fn write(
		&self,
		collection: &str,
		key: &str,
		bytes: Vec<u8>,
		expected_revision: StorageRevision,
	) -> Result<StorageRevision, StorageError> {
		let db = self.database(collection)?;
		let mut wtxn = self.env.write_txn()?;
		let current_revision = match db.get(&wtxn, key)? {
			Some(raw) => Self::decode(raw).0,
			None => 0,
		};
		if current_revision != expected_revision.0 {
			return Err(StorageError::Conflict {
				collection: collection.to_string(),
				key: key.to_string(),
			});
		}
		let next_revision = current_revision + 1;
		db.put(&mut wtxn, key, &Self::encode(next_revision, &bytes))?;
		wtxn.commit()?;
		Ok(StorageRevision(next_revision))
	}

	async fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError> {
		let db = self.database(collection)?;
		let mut wtxn = self.env.write_txn()?;
		db.delete(&mut wtxn, key)?;
		wtxn.commit()?;
		Ok(())
	}
}

/// Shared handle to a [`HeedStorageBridge`], cloneable across actors the
/// way `HistoryStore`'s `Arc<HelixGraphStorage>` is in the teacher.
pub type SharedHeedStorageBridge = Arc<HeedStorageBridge>;

#[cfg(test)]
mod tests {
	use tempfile::tempdir;

	use super::*;

	#[tokio::test]
	async fn write_then_read_round_trips() {
		let dir = tempdir().unwrap();
		let bridge = HeedStorageBridge::open(dir.path(), 10 * 1024 * 1024).unwrap();
		let rev = bridge
			.write("bucket", "k1", b"hello".to_vec(), StorageRevision::ABSENT)
			.await
			.unwrap();
		let record = bridge.read("bucket", "k1").await.unwrap().unwrap();
		assert_eq!(record.bytes, b"hello");
		assert_eq!(record.revision, rev);
	}

	#[tokio::test]
	async fn stale_revision_conflicts() {
		let dir = tempdir().unwrap();
		let bridge = HeedStorageBridge::open(dir.path(), 10 * 1024 * 1024).unwrap();
		bridge
			.write("envelope", "g1", b"v1".to_vec(), StorageRevision::ABSENT)
			.await
			.unwrap();
		let result = bridge
			.write("envelope", "g1", b"v2".to_vec(), StorageRevision::ABSENT)
			.await;
		assert!(matches!(result, Err(StorageError::Conflict { .. })));
	}

	#[tokio::test]
	async fn survives_reopen() {
		let dir = tempdir().unwrap();
		{
			let bridge = HeedStorageBridge::open(dir.path(), 10 * 1024 * 1024).unwrap();
			bridge
				.write("queue", "q1", b"persisted".to_vec(), StorageRevision::ABSENT)
				.await
				.unwrap();
		}
		let bridge = HeedStorageBridge::open(dir.path(), 10 * 1024 * 1024).unwrap();
		let record = bridge.read("queue", "q1").await.unwrap().unwrap();
		assert_eq!(record.bytes, b"persisted");
	}
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use vindex_storage::StorageBridge;
use vindex_types::{BucketPrimaryKey, IndexKind};

use crate::actor::handle::BucketHandle;
use crate::state::ApplyContext;

/// Resolves a bucket's successor in its overflow chain to a live actor
/// handle, spawning one on first reference.
///
/// The actor runtime that would normally own activation-by-identity is an
/// external collaborator (`spec.md` §1); this trait is the seam a bucket
/// actor forwards through instead of holding a reference to its chain
/// directly, matching the Design Note that `next_bucket` "is resolved by
/// identity... not a held reference" (`spec.md` §9).
#[async_trait]
pub trait BucketDirectory: Send + Sync {
	/// Returns the handle for `primary_key`, spawning a fresh bucket actor
	/// of this directory's index kind if one isn't already running.
	async fn get_or_create(&self, primary_key: &BucketPrimaryKey) -> BucketHandle;
}

struct Inner {
	storage: Arc<dyn StorageBridge>,
	kind: IndexKind,
	ctx: ApplyContext,
	buckets: Mutex<HashMap<BucketPrimaryKey, BucketHandle>>,
}

/// A [`BucketDirectory`] that keeps every spawned bucket actor of one index
/// partition in memory for the lifetime of the process.
///
/// Cloning is cheap and shares the same underlying map — the same pattern
/// [`BucketHandle`] uses to share one `mpsc::Sender` across clones.
#[derive(Clone)]
pub struct InMemoryBucketDirectory {
	inner: Arc<Inner>,
}

impl InMemoryBucketDirectory {
	/// Builds a directory that spawns buckets of `kind` against `storage`,
	/// applying updates under `ctx`.
	pub fn new(storage: Arc<dyn StorageBridge>, kind: IndexKind, ctx: ApplyContext) -> Self {
		Self {
			inner: Arc::new(Inner {
				storage,
				kind,
				ctx,
				buckets: Mutex::new(HashMap::new()),
			}),
		}
	}
}

#[async_trait]
impl BucketDirectory for InMemoryBucketDirectory {
	async fn get_or_create(&self, primary_key: &BucketPrimaryKey) -> BucketHandle {
		if let Some(handle) = self.inner.buckets.lock().get(primary_key) {
			return handle.clone();
		}
		let handle = BucketHandle::start(
			primary_key.clone(),
			self.inner.kind,
			self.inner.storage.clone(),
			self.inner.ctx.clone(),
			Arc::new(self.clone()),
		)
		.await;
		self.inner
			.buckets
			.lock()
			.entry(primary_key.clone())
			.or_insert(handle)
			.clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use vindex_storage::MemoryStorageBridge;

	fn ctx() -> ApplyContext {
		ApplyContext {
			index_name: "_Status".to_string(),
			unique: false,
			max_bucket_size: 4,
			chaining_enabled: true,
		}
	}

	#[tokio::test]
	async fn get_or_create_is_idempotent() {
		let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
		let directory = InMemoryBucketDirectory::new(storage, IndexKind::Hash, ctx());
		let pk = BucketPrimaryKey::first("T", "P", "0");
		let a = directory.get_or_create(&pk).await;
		let b = directory.get_or_create(&pk).await;
		assert_eq!(a.status().await, b.status().await);
	}
}

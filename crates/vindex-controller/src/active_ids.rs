use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;
use vindex_queue::GrainActiveActions;
use vindex_storage::{StorageBridge, StorageRevision};
use vindex_types::{ActionId, GrainRef};

/// Storage collection backing [`DurableActiveActionIds`].
pub const COLLECTION: &str = "active_ids";

/// Maximum read-modify-write attempts before a conflict is logged and
/// dropped rather than retried forever — this mirror is best-effort
/// bookkeeping, not the durability boundary (the envelope is).
const MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ActiveIdsRecord {
	ids: BTreeSet<ActionId>,
}

/// A small side record, one per grain, mirroring the envelope's
/// `active_indexing_action_ids` set.
///
/// The queue processor needs to ask an arbitrary grain (not necessarily the
/// one currently activated in this process) which action ids it still
/// considers active (`spec.md` §4.6 step 2). Reading that out of the
/// envelope directly would require this crate to deserialize every grain's
/// user-state type generically, which isn't possible without the registry's
/// type information in hand; a standalone `BTreeSet<ActionId>` record, kept
/// in lockstep with the envelope by [`crate::controller::IndexedStateController`]
/// on every persist, sidesteps that without widening the queue's trait
/// object to know about `T`.
pub struct DurableActiveActionIds {
	storage: Arc<dyn StorageBridge>,
}

impl DurableActiveActionIds {
	pub fn new(storage: Arc<dyn StorageBridge>) -> Self {
		Self { storage }
	}
}

async fn load(storage: &Arc<dyn StorageBridge>, grain: &GrainRef) -> BTreeSet<ActionId> {
	let key = grain.to_string();
	match storage.read(COLLECTION, &key).await {
		Ok(Some(record)) => postcard::from_bytes::<ActiveIdsRecord>(&record.bytes)
			.map(|r| r.ids)
			.unwrap_or_default(),
		Ok(None) => BTreeSet::new(),
		Err(err) => {
			warn!(%err, %grain, "failed to read active-ids mirror, treating as empty");
			BTreeSet::new()
		}
	}
}

/// Persists the current active-ids mirror for `grain`, retrying a bounded
/// number of times on an optimistic-concurrency conflict with a fresh read.
pub async fn save(storage: &Arc<dyn StorageBridge>, grain: &GrainRef, ids: &BTreeSet<ActionId>) {
	let key = grain.to_string();
	let record = ActiveIdsRecord { ids: ids.clone() };
	let Ok(bytes) = postcard::to_allocvec(&record) else {
		warn!(%grain, "failed to encode active-ids mirror");
		return;
	};
	for attempt in 1..=MAX_ATTEMPTS {
		let expected = match storage.read(COLLECTION, &key).await {
			Ok(Some(existing)) => existing.revision,
			Ok(None) => StorageRevision::ABSENT,
			Err(err) => {
				warn!(%err, %grain, "failed to read active-ids mirror before write");
				return;
			}
		};
		match storage.write(COLLECTION, &key, bytes.clone(), expected).await {
			Ok(_) => return,
			Err(err) if err.is_conflict() && attempt < MAX_ATTEMPTS => continue,
			Err(err) => {
				warn!(%err, %grain, "failed to persist active-ids mirror");
				return;
			}
		}
	}
}

#[async_trait]
impl GrainActiveActions for DurableActiveActionIds {
	async fn active_action_ids(&self, grain: &GrainRef) -> HashSet<ActionId> {
		load(&self.storage, grain).await.into_iter().collect()
	}

	async fn clear_action_ids(&self, grain: &GrainRef, ids: &[ActionId]) {
		let mut current = load(&self.storage, grain).await;
		for id in ids {
			current.remove(id);
		}
		save(&self.storage, grain, &current).await;
	}
}

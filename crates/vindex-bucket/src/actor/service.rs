use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};
use vindex_storage::{StorageBridge, StorageRevision};
use vindex_types::{BucketPrimaryKey, IndexKind, IndexingError};

use super::commands::BucketCmd;
use super::directory::BucketDirectory;
use super::handle::BucketHandle;
use crate::persist;
use crate::state::{ApplyContext, ApplyOutcome, BucketState};
use crate::status::BucketStatus;

/// Owns one [`BucketState`] and serializes every command against it
/// (`spec.md` §4.2, §5: "single-threaded per activation").
pub struct BucketService {
	rx: mpsc::Receiver<BucketCmd>,
	primary_key: BucketPrimaryKey,
	state: BucketState,
	revision: StorageRevision,
	storage: Arc<dyn StorageBridge>,
	ctx: ApplyContext,
	directory: Arc<dyn BucketDirectory>,
}

impl BucketService {
	pub(super) async fn new(
		primary_key: BucketPrimaryKey,
		kind: IndexKind,
		storage: Arc<dyn StorageBridge>,
		ctx: ApplyContext,
		directory: Arc<dyn BucketDirectory>,
		rx: mpsc::Receiver<BucketCmd>,
	) -> Self {
		let loaded = persist::load(&storage, primary_key.as_str()).await.unwrap_or_else(|err| {
			warn!(%err, pk = %primary_key, "failed to load bucket state, starting empty");
			None
		});
		let (state, revision) = match loaded {
			Some((state, revision)) => (state, revision),
			None => {
				let state = match kind {
					IndexKind::Hash => BucketState::new_hash(),
					IndexKind::Sorted => BucketState::new_sorted(),
				};
				(state, StorageRevision::ABSENT)
			}
		};
		Self {
			rx,
			primary_key,
			state,
			revision,
			storage,
			ctx,
			directory,
		}
	}

	pub(super) async fn run(mut self) {
		while let Some(cmd) = self.rx.recv().await {
			match cmd {
				BucketCmd::TryGet { key, reply } => {
					let result = self.try_get_chained(&key).await;
					let _ = reply.send(result);
				}
				BucketCmd::GetPage { key, offset, size, reply } => {
					let result = self.get_page_chained(&key, offset, size).await;
					let _ = reply.send(result);
				}
				BucketCmd::LookupRange { start, end, offset, size, reply } => {
					let result = self.state.range(&start, &end, offset, size);
					let _ = reply.send(result);
				}
				BucketCmd::RangeOverlap { start, end, reply } => {
					let result = self.state.range_overlap(&start, &end);
					let _ = reply.send(result);
				}
				BucketCmd::Update { grain, update, reply } => {
					let result = self.apply_chained(grain, update).await;
					let _ = reply.send(result);
				}
				BucketCmd::Status { reply } => {
					let _ = reply.send(self.state.status());
				}
				BucketCmd::Dispose { reply } => {
					self.state.set_status(BucketStatus::Disposed);
					if let Err(err) = self.persist().await {
						warn!(%err, pk = %self.primary_key, "failed to persist disposed bucket");
					}
					let _ = reply.send(());
					info!(pk = %self.primary_key, "bucket disposed");
					break;
				}
			}
		}
	}

	async fn try_get_chained(&self, key: &vindex_types::IndexKey) -> Option<vindex_types::BucketEntry> {
		if let Some(entry) = self.state.try_get(key) {
			return Some(entry.clone());
		}
		let next = self.next_handle().await?;
		next.try_get(key.clone()).await.ok().flatten()
	}

	async fn get_page_chained(
		&self,
		key: &vindex_types::IndexKey,
		offset: i64,
		size: i64,
	) -> Result<Vec<vindex_types::GrainRef>, IndexingError> {
		if self.state.try_get(key).is_some() {
			return self.state.get_page(key, offset, size);
		}
		match self.next_handle().await {
			Some(next) => next.get_page(key.clone(), offset, size).await,
			None => self.state.get_page(key, offset, size),
		}
	}

	async fn next_handle(&self) -> Option<BucketHandle> {
		let pk = self.state.next_bucket()?.clone();
		Some(self.directory.get_or_create(&pk).await)
	}

	async fn apply_chained(
		&mut self,
		grain: vindex_types::GrainRef,
		update: vindex_types::IndexedPropertyUpdate,
	) -> Result<ApplyOutcome, IndexingError> {
		let outcome = self.state.apply(&grain, &update, &self.ctx)?;
		if outcome.ok {
			if let Err(err) = self.persist().await {
				warn!(%err, pk = %self.primary_key, "failed to persist bucket after apply");
			}
			return Ok(outcome);
		}

		// Forward to (allocating, if necessary) the successor bucket
		// (`spec.md` §4.2).
		let next_pk = match self.state.next_bucket() {
			Some(pk) => pk.clone(),
			None => {
				let pk = self.primary_key.successor(1);
				self.state.set_next_bucket(pk.clone());
				if let Err(err) = self.persist().await {
					warn!(%err, pk = %self.primary_key, "failed to persist chain pointer");
				}
				pk
			}
		};
		let next = self.directory.get_or_create(&next_pk).await;
		next.update(grain, update).await
	}

	async fn persist(&mut self) -> Result<(), IndexingError> {
		let revision = persist::save(&self.storage, self.primary_key.as_str(), &self.state, self.revision).await?;
		self.revision = revision;
		Ok(())
	}
}

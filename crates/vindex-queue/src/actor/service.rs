use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use vindex_client::IndexClient;
use vindex_fanout::bounded_fan_out_cancellable;
use vindex_storage::{StorageBridge, StorageRevision};
use vindex_types::{ActionId, GrainRef, IndexedPropertyUpdate, IndexingAction, IndexingError, UpdateVisibility};

use super::commands::QueueCmd;
use super::handle::QueueRuntimeConfig;
use crate::debounce::Debouncer;
use crate::entry::QueueState;
use crate::grains::GrainActiveActions;
use crate::persist;

/// Owns one [`QueueState`] and drains it in batches (`spec.md` §4.6,
/// component C6).
pub struct QueueService {
	rx: mpsc::Receiver<QueueCmd>,
	queue_key: String,
	state: QueueState,
	revision: StorageRevision,
	storage: Arc<dyn StorageBridge>,
	clients: HashMap<String, IndexClient>,
	grains: Arc<dyn GrainActiveActions>,
	config: QueueRuntimeConfig,
	cancel: CancellationToken,
	debouncer: Debouncer,
	since_last_drain: usize,
}

impl QueueService {
	pub(super) async fn new(
		queue_key: String,
		clients: Vec<IndexClient>,
		storage: Arc<dyn StorageBridge>,
		grains: Arc<dyn GrainActiveActions>,
		config: QueueRuntimeConfig,
		cancel: CancellationToken,
		rx: mpsc::Receiver<QueueCmd>,
	) -> Self {
		let loaded = persist::load(&storage, &queue_key).await.unwrap_or_else(|err| {
			warn!(%err, queue = %queue_key, "failed to load queue state, starting empty");
			None
		});
		let (state, revision) = loaded.unwrap_or_else(|| (QueueState::new(), StorageRevision::ABSENT));
		let clients = clients.into_iter().map(|c| (c.descriptor().name.clone(), c)).collect();
		Self {
			rx,
			queue_key,
			state,
			revision,
			storage,
			clients,
			grains,
			config,
			cancel,
			debouncer: Debouncer::new(),
			since_last_drain: 0,
		}
	}

	pub(super) async fn run(mut self) {
		let mut ticker = tokio::time::interval(self.config.output_buffer_timeout);
		ticker.tick().await; // the first tick fires immediately; consume it so later ticks are evenly spaced.
		loop {
			tokio::select! {
				maybe_cmd = self.rx.recv() => {
					match maybe_cmd {
						Some(cmd) => self.handle_cmd(cmd).await,
						None => break,
					}
				}
				_ = ticker.tick() => {
					if let Err(err) = self.drain_batch().await {
						error!(%err, queue = %self.queue_key, "queue processing failure, retrying from last punctuation");
					}
				}
				_ = self.cancel.cancelled() => break,
			}
		}
	}

	async fn handle_cmd(&mut self, cmd: QueueCmd) {
		match cmd {
			QueueCmd::Enqueue { action, reply } => {
				let id = action.action_id();
				self.state.push_action(action);
				match self.persist().await {
					Ok(()) => {
						self.since_last_drain += 1;
						let _ = reply.send(Ok(id));
						if self.since_last_drain >= self.config.output_buffer_size.max(1) {
							if let Err(err) = self.drain_batch().await {
								error!(%err, queue = %self.queue_key, "queue processing failure after count threshold");
							}
						}
					}
					Err(err) => {
						let _ = reply.send(Err(err));
					}
				}
			}
			QueueCmd::PendingActions { ids, reply } => {
				let present: HashSet<ActionId> = self.state.actions().map(|a| a.action_id()).collect();
				let result = ids.into_iter().filter(|id| present.contains(id)).collect();
				let _ = reply.send(result);
			}
			QueueCmd::Flush { reply } => {
				let _ = reply.send(self.drain_batch().await);
			}
		}
	}

	/// One iteration of the batch processor (`spec.md` §4.6 steps 1-6).
	async fn drain_batch(&mut self) -> Result<(), IndexingError> {
		let batch_size = self.config.output_buffer_size.max(1);
		let batch: Vec<IndexingAction> = self.state.actions().take(batch_size).cloned().collect();
		if batch.is_empty() {
			self.since_last_drain = 0;
			return Ok(());
		}
		debug!(queue = %self.queue_key, batch_len = batch.len(), "draining indexing batch");

		// Step 2: join by grain identity so each grain is contacted once.
		let mut distinct_grains: Vec<GrainRef> = Vec::new();
		for action in &batch {
			if !distinct_grains.contains(action.grain_ref()) {
				distinct_grains.push(action.grain_ref().clone());
			}
		}
		let mut active_by_grain: HashMap<GrainRef, HashSet<ActionId>> = HashMap::new();
		for grain in &distinct_grains {
			let ids = self.grains.active_action_ids(grain).await;
			active_by_grain.insert(grain.clone(), ids);
		}

		// Step 3: build updates per index, per grain, reversing dead
		// tentative unique writes instead of applying them as-is.
		let mut updates_by_index: HashMap<String, Vec<(GrainRef, IndexedPropertyUpdate)>> = HashMap::new();
		for action in &batch {
			let active = active_by_grain.get(action.grain_ref()).cloned().unwrap_or_default();
			let still_active = active.contains(&action.action_id());
			for (index_name, update) in action.updates_by_index_name() {
				let Some(client) = self.clients.get(index_name) else {
					warn!(index = %index_name, "no client registered for index named in action, dropping update");
					continue;
				};
				if still_active {
					updates_by_index
						.entry(index_name.clone())
						.or_default()
						.push((action.grain_ref().clone(), update.clone()));
				} else if client.descriptor().unique {
					let reversed = update.reversed(UpdateVisibility::NonTentative);
					updates_by_index
						.entry(index_name.clone())
						.or_default()
						.push((action.grain_ref().clone(), reversed));
				}
			}
		}

		// Step 4: apply across indexes in parallel, serially within one index.
		let clients = &self.clients;
		let updates_by_index_ref = &updates_by_index;
		let index_names: Vec<String> = updates_by_index.keys().cloned().collect();
		bounded_fan_out_cancellable(index_names, self.config.index_update_parallelism, &self.cancel, |index_name| {
			let updates = updates_by_index_ref.get(&index_name).cloned().unwrap_or_default();
			let client = clients.get(&index_name);
			async move {
				let Some(client) = client else { return Ok(()) };
				for (grain, update) in updates {
					client.update(grain, update).await?;
				}
				Ok::<(), IndexingError>(())
			}
		})
		.await?;

		// Step 5: ask each contacted grain to clear its processed ids.
		for grain in &distinct_grains {
			let ids: Vec<ActionId> = batch
				.iter()
				.filter(|a| a.grain_ref() == grain)
				.map(|a| a.action_id())
				.collect();
			self.grains.clear_action_ids(grain, &ids).await;
		}

		// Step 6: persist with the batch dequeued and a fresh punctuation.
		let processed_ids: HashSet<ActionId> = batch.iter().map(|a| a.action_id()).collect();
		self.state.dequeue_processed_and_punctuate(&processed_ids);
		self.persist().await?;
		self.since_last_drain = 0;
		Ok(())
	}

	async fn persist(&mut self) -> Result<(), IndexingError> {
		let write_id = self.debouncer.issue();
		let state = self.state.clone();
		let storage = self.storage.clone();
		let queue_key = self.queue_key.clone();
		let expected = self.revision;
		let outcome = self
			.debouncer
			.commit_if_latest(write_id, || async move { persist::save(&storage, &queue_key, &state, expected).await })
			.await?;
		if let Some(revision) = outcome {
			self.revision = revision;
		}
		Ok(())
	}
}

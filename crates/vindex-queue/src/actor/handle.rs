use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use vindex_client::IndexClient;
use vindex_storage::StorageBridge;
use vindex_types::{ActionId, IndexingAction, IndexingError};

use super::commands::QueueCmd;
use super::service::QueueService;
use crate::grains::GrainActiveActions;

const COMMAND_BUFFER: usize = 256;

/// Runtime tuning for one queue actor (`spec.md` §6: `IndexingSystem`
/// fields `IndexUpdateParallelism`, `IndexingQueueInputBufferSize`,
/// `IndexingQueueOutputBufferSize`, `IndexingQueueOutputBufferTimeOut`).
#[derive(Debug, Clone, Copy)]
pub struct QueueRuntimeConfig {
	/// Cap on in-flight index updates applied in parallel across indexes
	/// within one batch (serial within a single index).
	pub index_update_parallelism: usize,
	/// Number of actions that completes a batch by count.
	pub output_buffer_size: usize,
	/// Elapsed time that completes a batch regardless of count.
	pub output_buffer_timeout: Duration,
}

impl Default for QueueRuntimeConfig {
	fn default() -> Self {
		Self {
			index_update_parallelism: 10,
			output_buffer_size: 10,
			output_buffer_timeout: Duration::from_millis(100),
		}
	}
}

/// A reply channel was dropped without a response — the queue actor's task
/// ended before answering.
#[derive(Debug, thiserror::Error)]
#[error("queue actor did not respond")]
pub struct QueueActorError;

/// Handle for communicating with a write-ahead indexing queue actor
/// (`spec.md` §4.6, component C6).
#[derive(Clone, Debug)]
pub struct QueueHandle {
	tx: mpsc::Sender<QueueCmd>,
}

impl QueueHandle {
	fn new(tx: mpsc::Sender<QueueCmd>) -> Self {
		Self { tx }
	}

	/// Spawns a queue actor for `queue_key` (typically the grain interface
	/// type name) and returns a handle to it.
	pub async fn start(
		queue_key: impl Into<String>,
		clients: Vec<IndexClient>,
		storage: Arc<dyn StorageBridge>,
		grains: Arc<dyn GrainActiveActions>,
		config: QueueRuntimeConfig,
		cancel: CancellationToken,
	) -> Self {
		let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
		let service = QueueService::new(queue_key.into(), clients, storage, grains, config, cancel, rx).await;
		tokio::spawn(service.run());
		Self::new(tx)
	}

	/// Durably enqueues `action`, returning its id once the append is
	/// persisted.
	pub async fn enqueue(&self, action: IndexingAction) -> Result<ActionId, IndexingError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(QueueCmd::Enqueue { action, reply })
			.await
			.map_err(unreachable_err)?;
		rx.await.map_err(no_response_err)?
	}

	/// The subset of `ids` still pending (unprocessed) in this queue.
	pub async fn pending_actions(&self, ids: HashSet<ActionId>) -> HashSet<ActionId> {
		let (reply, rx) = oneshot::channel();
		if self.tx.send(QueueCmd::PendingActions { ids: ids.clone(), reply }).await.is_err() {
			return ids;
		}
		rx.await.unwrap_or(ids)
	}

	/// Forces an immediate drain of whatever is currently buffered.
	pub async fn flush(&self) -> Result<(), IndexingError> {
		let (reply, rx) = oneshot::channel();
		self.tx.send(QueueCmd::Flush { reply }).await.map_err(unreachable_err)?;
		rx.await.map_err(no_response_err)?
	}
}

fn unreachable_err(_: mpsc::error::SendError<QueueCmd>) -> IndexingError {
	IndexingError::QueueProcessingFailure {
		detail: "queue actor unreachable".to_string(),
	}
}

fn no_response_err(_: oneshot::error::RecvError) -> IndexingError {
	IndexingError::QueueProcessingFailure {
		detail: "queue actor did not respond".to_string(),
	}
}

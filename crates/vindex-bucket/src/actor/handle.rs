use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use vindex_storage::StorageBridge;
use vindex_types::{
	BucketEntry, BucketPrimaryKey, GrainRef, IndexKey, IndexKind, IndexedPropertyUpdate,
	IndexingError, RangeOverlap,
};

use super::commands::BucketCmd;
use super::directory::BucketDirectory;
use super::service::BucketService;
use crate::state::ApplyContext;
use crate::state::ApplyOutcome;
use crate::status::BucketStatus;

const COMMAND_BUFFER: usize = 256;

/// Handle for communicating with a bucket actor (`spec.md` §4.2).
///
/// Cheaply `Clone`, like every handle in this codebase: cloning shares the
/// same underlying `mpsc::Sender`, so every clone talks to the same
/// serialized activation.
#[derive(Clone, Debug)]
pub struct BucketHandle {
	tx: mpsc::Sender<BucketCmd>,
}

/// A reply channel was dropped without a response — the bucket actor's
/// task ended (e.g. panicked) before answering.
#[derive(Debug, thiserror::Error)]
#[error("bucket actor did not respond")]
pub struct BucketActorError;

impl BucketHandle {
	fn new(tx: mpsc::Sender<BucketCmd>) -> Self {
		Self { tx }
	}

	/// Spawns a bucket actor for `primary_key` and returns a handle to it.
	pub async fn start(
		primary_key: BucketPrimaryKey,
		kind: IndexKind,
		storage: Arc<dyn StorageBridge>,
		ctx: ApplyContext,
		directory: Arc<dyn BucketDirectory>,
	) -> Self {
		let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
		let service = BucketService::new(primary_key, kind, storage, ctx, directory, rx).await;
		tokio::spawn(service.run());
		Self::new(tx)
	}

	/// Looks up `key`, falling through the overflow chain if absent.
	pub async fn try_get(&self, key: IndexKey) -> Result<Option<BucketEntry>, BucketActorError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BucketCmd::TryGet { key, reply })
			.await
			.map_err(|_| BucketActorError)?;
		rx.await.map_err(|_| BucketActorError)
	}

	/// A page of `key`'s values, falling through the chain.
	pub async fn get_page(
		&self,
		key: IndexKey,
		offset: i64,
		size: i64,
	) -> Result<Vec<GrainRef>, IndexingError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BucketCmd::GetPage { key, offset, size, reply })
			.await
			.map_err(|_| IndexingError::IndexUnavailable {
				reason: "bucket actor unreachable".to_string(),
			})?;
		rx.await.map_err(|_| IndexingError::IndexUnavailable {
			reason: "bucket actor did not respond".to_string(),
		})?
	}

	/// A page of grains across `[start, end]`, this bucket only.
	pub async fn lookup_range(
		&self,
		start: IndexKey,
		end: IndexKey,
		offset: i64,
		size: i64,
	) -> Result<Vec<GrainRef>, IndexingError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BucketCmd::LookupRange {
				start,
				end,
				offset,
				size,
				reply,
			})
			.await
			.map_err(unreachable_err)?;
		rx.await.map_err(no_response_err)?
	}

	/// How `[start, end]` overlaps this bucket's stored key set.
	pub async fn range_overlap(
		&self,
		start: IndexKey,
		end: IndexKey,
	) -> Result<RangeOverlap, IndexingError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BucketCmd::RangeOverlap { start, end, reply })
			.await
			.map_err(unreachable_err)?;
		rx.await.map_err(no_response_err)?
	}

	/// Applies one update for `grain`, forwarding across the chain as
	/// needed.
	pub async fn update(
		&self,
		grain: GrainRef,
		update: IndexedPropertyUpdate,
	) -> Result<ApplyOutcome, IndexingError> {
		let (reply, rx) = oneshot::channel();
		self.tx
			.send(BucketCmd::Update { grain, update, reply })
			.await
			.map_err(unreachable_err)?;
		rx.await.map_err(no_response_err)?
	}

	/// Current lifecycle status.
	pub async fn status(&self) -> BucketStatus {
		let (reply, rx) = oneshot::channel();
		if self.tx.send(BucketCmd::Status { reply }).await.is_err() {
			return BucketStatus::Disposed;
		}
		rx.await.unwrap_or(BucketStatus::Disposed)
	}

	/// Tears the bucket down.
	pub async fn dispose(&self) {
		let (reply, rx) = oneshot::channel();
		let _ = self.tx.send(BucketCmd::Dispose { reply }).await;
		let _ = rx.await;
	}
}

fn unreachable_err(_: mpsc::error::SendError<BucketCmd>) -> IndexingError {
	IndexingError::IndexUnavailable {
		reason: "bucket actor unreachable".to_string(),
	}
}

fn no_response_err(_: oneshot::error::RecvError) -> IndexingError {
	IndexingError::IndexUnavailable {
		reason: "bucket actor did not respond".to_string(),
	}
}

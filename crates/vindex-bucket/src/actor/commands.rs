use tokio::sync::oneshot;
use vindex_types::{BucketEntry, GrainRef, IndexKey, IndexedPropertyUpdate, IndexingError, RangeOverlap};

use crate::state::ApplyOutcome;
use crate::status::BucketStatus;

/// Commands accepted by [`super::BucketService`] (`spec.md` §4.2).
#[derive(Debug)]
pub enum BucketCmd {
	/// Point lookup, falling through the overflow chain if the key is
	/// absent locally.
	TryGet {
		key: IndexKey,
		reply: oneshot::Sender<Option<BucketEntry>>,
	},
	/// A page of `key`'s values, falling through the chain like `TryGet`.
	GetPage {
		key: IndexKey,
		offset: i64,
		size: i64,
		reply: oneshot::Sender<Result<Vec<GrainRef>, IndexingError>>,
	},
	/// A page of grains across `[start, end]`, this bucket only (sorted
	/// indexes; no chain traversal — see `DESIGN.md`).
	LookupRange {
		start: IndexKey,
		end: IndexKey,
		offset: i64,
		size: i64,
		reply: oneshot::Sender<Result<Vec<GrainRef>, IndexingError>>,
	},
	/// How `[start, end]` overlaps this bucket's stored key set, this
	/// bucket only (sorted indexes).
	RangeOverlap {
		start: IndexKey,
		end: IndexKey,
		reply: oneshot::Sender<Result<RangeOverlap, IndexingError>>,
	},
	/// Applies one update for `grain`, forwarding to (allocating, if
	/// necessary) the successor bucket on overflow or chained absence.
	Update {
		grain: GrainRef,
		update: IndexedPropertyUpdate,
		reply: oneshot::Sender<Result<ApplyOutcome, IndexingError>>,
	},
	/// Current lifecycle status.
	Status { reply: oneshot::Sender<BucketStatus> },
	/// Marks the bucket `Disposed`; subsequent non-delete updates are
	/// rejected and lookups return empty.
	Dispose { reply: oneshot::Sender<()> },
}

use std::collections::HashSet;

use tokio::sync::oneshot;
use vindex_types::{ActionId, IndexingAction, IndexingError};

/// Commands accepted by [`super::QueueService`] (`spec.md` §4.6).
#[derive(Debug)]
pub enum QueueCmd {
	/// Durably buffers `action`; replies only after the append is
	/// persisted (`spec.md` §4.5 step 4: the controller enqueues before
	/// persisting the user-state envelope).
	Enqueue {
		action: IndexingAction,
		reply: oneshot::Sender<Result<ActionId, IndexingError>>,
	},
	/// Returns the subset of `ids` still present (unprocessed) in this
	/// queue (`spec.md` §4.5 recovery: "fetch `pending_actions ∩
	/// activeIndexingActionIds`").
	PendingActions {
		ids: HashSet<ActionId>,
		reply: oneshot::Sender<HashSet<ActionId>>,
	},
	/// Forces an immediate drain regardless of batch thresholds; used by
	/// tests and by an activation shutdown that wants the queue empty
	/// before tearing down.
	Flush { reply: oneshot::Sender<Result<(), IndexingError>> },
}

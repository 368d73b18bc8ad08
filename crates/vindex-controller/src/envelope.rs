use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use vindex_types::{ActionId, IndexKey};

/// A grain's user-state type, giving the controller a reflection-free way to
/// read the values its registered indexes are declared over.
///
/// Real annotation scanning has no Rust equivalent without a proc-macro
/// build step (`spec.md` §9's "equivalent builder API" escape hatch); this
/// trait is that equivalent for *reading* indexed properties, complementing
/// the registry's builder API for *declaring* them.
pub trait IndexedState {
	/// The current value of every indexed property, keyed by index name
	/// (`_`-prefixed, matching `spec.md` §6's naming rule). `None` means the
	/// property is currently absent.
	fn indexed_properties(&self) -> Vec<(String, Option<IndexKey>)>;
}

/// The durable record backing one indexed grain's activation (`spec.md` §3,
/// §4.5): the user's own state plus the action ids its last commit is still
/// waiting on the queue to settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedStateEnvelope<T> {
	/// Schema version of this envelope, read and written explicitly so a
	/// future field addition can branch on it rather than silently
	/// misinterpreting old bytes (`spec.md` §6: "versioned field ids").
	version: u16,
	/// The grain's own state.
	pub user_state: T,
	/// Ids of commits whose queue processing has not yet been observed to
	/// complete for this grain (`spec.md` §3, `activeIndexingActionIds`).
	pub active_indexing_action_ids: BTreeSet<ActionId>,
	/// The queue key this envelope's `active_indexing_action_ids` were last
	/// enqueued against, so recovery can detect a reincarnated queue
	/// (`spec.md` §4.5: "if the current queue identity differs from the
	/// previously referenced queue").
	pub queue_key: String,
}

const ENVELOPE_VERSION: u16 = 1;

impl<T> IndexedStateEnvelope<T> {
	/// A fresh envelope for a grain activating for the first time.
	pub fn new(user_state: T, queue_key: impl Into<String>) -> Self {
		Self {
			version: ENVELOPE_VERSION,
			user_state,
			active_indexing_action_ids: BTreeSet::new(),
			queue_key: queue_key.into(),
		}
	}

	/// The schema version this envelope was last written with.
	pub fn version(&self) -> u16 {
		self.version
	}
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, GrainRef};
use crate::update::IndexedPropertyUpdate;

/// A durable record of one grain-commit's effect on indexes, identified by
/// UUID. The unit of dequeue and acknowledge in the write-ahead indexing
/// queue (`spec.md` §3, GLOSSARY).
///
/// Immutable once constructed: a queue replays the same action verbatim on
/// every retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingAction {
	action_id: ActionId,
	grain_ref: GrainRef,
	interface_type: String,
	updates_by_index_name: BTreeMap<String, IndexedPropertyUpdate>,
}

impl IndexingAction {
	/// Builds a new action with a fresh random id.
	pub fn new(
		grain_ref: GrainRef,
		interface_type: impl Into<String>,
		updates_by_index_name: BTreeMap<String, IndexedPropertyUpdate>,
	) -> Self {
		Self {
			action_id: ActionId::new_v4(),
			grain_ref,
			interface_type: interface_type.into(),
			updates_by_index_name,
		}
	}

	/// Reconstructs an action with an explicit id, for replay from durable
	/// storage.
	pub fn with_id(
		action_id: ActionId,
		grain_ref: GrainRef,
		interface_type: impl Into<String>,
		updates_by_index_name: BTreeMap<String, IndexedPropertyUpdate>,
	) -> Self {
		Self {
			action_id,
			grain_ref,
			interface_type: interface_type.into(),
			updates_by_index_name,
		}
	}

	/// This action's identity — the unit of dequeue/acknowledge.
	pub fn action_id(&self) -> ActionId {
		self.action_id
	}

	/// The grain whose commit produced this action.
	pub fn grain_ref(&self) -> &GrainRef {
		&self.grain_ref
	}

	/// The grain interface this action's indexes are declared against.
	pub fn interface_type(&self) -> &str {
		&self.interface_type
	}

	/// The per-index updates carried by this action.
	pub fn updates_by_index_name(&self) -> &BTreeMap<String, IndexedPropertyUpdate> {
		&self.updates_by_index_name
	}
}

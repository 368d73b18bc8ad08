use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use vindex_types::IndexingAction;

/// One slot in a [`QueueState`]'s FIFO (`spec.md` §3, §4.6).
///
/// A punctuation separates durably-processed segments from open ones:
/// "entries before the first punctuation are either in-process or
/// unprocessed; entries after the first punctuation are unprocessed" only
/// holds once the processor has started draining — on a freshly persisted
/// queue every entry before the first punctuation is simply unprocessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueueEntry {
	/// A durable record awaiting application to its indexes.
	Action(IndexingAction),
	/// Marks "everything before this point has been processed".
	Punctuation,
}

/// Durable state of one indexing queue instance (`spec.md` §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueState {
	entries: VecDeque<QueueEntry>,
}

impl QueueState {
	/// An empty queue.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an action to the back of the FIFO.
	pub fn push_action(&mut self, action: IndexingAction) {
		self.entries.push_back(QueueEntry::Action(action));
	}

	/// Appends a punctuation to the back of the FIFO, unless the tail is
	/// already one (debounced: `spec.md` §4.6 "append a punctuation
	/// (debounced to coalesce overlapping writes)").
	pub fn push_punctuation(&mut self) {
		if matches!(self.entries.back(), Some(QueueEntry::Punctuation)) {
			return;
		}
		self.entries.push_back(QueueEntry::Punctuation);
	}

	/// Every action currently in the queue, oldest first, regardless of
	/// punctuation boundaries.
	pub fn actions(&self) -> impl Iterator<Item = &IndexingAction> {
		self.entries.iter().filter_map(|e| match e {
			QueueEntry::Action(a) => Some(a),
			QueueEntry::Punctuation => None,
		})
	}

	/// Whether the queue holds no actions (punctuations alone don't count).
	pub fn is_empty(&self) -> bool {
		self.actions().next().is_none()
	}

	/// Removes every action whose id is in `processed`, leaving
	/// punctuations (and any action not yet processed) in place, then
	/// appends a fresh punctuation marking the new tail as fully processed
	/// (`spec.md` §4.6 step 6).
	pub fn dequeue_processed_and_punctuate(&mut self, processed: &std::collections::HashSet<uuid::Uuid>) {
		self.entries.retain(|e| match e {
			QueueEntry::Action(a) => !processed.contains(&a.action_id()),
			QueueEntry::Punctuation => true,
		});
		self.push_punctuation();
		self.collapse_redundant_punctuations();
	}

	/// Coalesces consecutive punctuations into one so the FIFO doesn't grow
	/// unbounded across empty batches.
	fn collapse_redundant_punctuations(&mut self) {
		let mut collapsed = VecDeque::with_capacity(self.entries.len());
		for entry in self.entries.drain(..) {
			if matches!(entry, QueueEntry::Punctuation)
				&& matches!(collapsed.back(), Some(QueueEntry::Punctuation))
			{
				continue;
			}
			collapsed.push_back(entry);
		}
		self.entries = collapsed;
	}

	/// Encodes this state for persistence.
	pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
		postcard::to_allocvec(self)
	}

	/// Decodes a state previously written by [`QueueState::to_bytes`].
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
		postcard::from_bytes(bytes)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;
	use std::collections::HashSet;

	use vindex_types::GrainRef;

	use super::*;

	fn action() -> IndexingAction {
		IndexingAction::new(GrainRef::new("T", "p1"), "T", BTreeMap::new())
	}

	#[test]
	fn bytes_round_trip_preserves_order() {
		let mut q = QueueState::new();
		let a = action();
		q.push_action(a.clone());
		q.push_punctuation();
		let bytes = q.to_bytes().unwrap();
		let restored = QueueState::from_bytes(&bytes).unwrap();
		assert_eq!(restored.actions().next().unwrap().action_id(), a.action_id());
	}

	#[test]
	fn dequeue_removes_processed_and_keeps_rest() {
		let mut q = QueueState::new();
		let a = action();
		let b = action();
		q.push_action(a.clone());
		q.push_action(b.clone());
		let mut processed = HashSet::new();
		processed.insert(a.action_id());
		q.dequeue_processed_and_punctuate(&processed);
		let remaining: Vec<_> = q.actions().map(|x| x.action_id()).collect();
		assert_eq!(remaining, vec![b.action_id()]);
	}

	#[test]
	fn consecutive_punctuations_collapse() {
		let mut q = QueueState::new();
		q.push_punctuation();
		q.push_punctuation();
		let punctuations = q
			.entries
			.iter()
			.filter(|e| matches!(e, QueueEntry::Punctuation))
			.count();
		assert_eq!(punctuations, 1);
	}
}

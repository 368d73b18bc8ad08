use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::ids::GrainRef;

/// Marks a [`BucketEntry`] as pending confirmation or pending removal.
///
/// `spec.md` §4.1: "a `Tentative` insert marks an entry 'pending'... a
/// `Tentative` delete marks `tentativeOp=Delete` without removing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TentativeOp {
	/// No pending tentative operation; the entry is steady-state.
	#[default]
	None,
	/// A tentative insert is pending confirmation.
	Insert,
	/// A tentative delete is pending confirmation.
	Delete,
}

/// A single key's entry in a bucket: the set of grains currently indexed
/// under that key, plus any pending tentative operation (`spec.md` §3).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
	values: BTreeSet<GrainRef>,
	tentative_op: TentativeOp,
}

impl BucketEntry {
	/// An entry holding a single grain, steady-state (no tentative flag).
	pub fn single(grain: GrainRef) -> Self {
		let mut values = BTreeSet::new();
		values.insert(grain);
		Self {
			values,
			tentative_op: TentativeOp::None,
		}
	}

	/// Whether the entry currently holds no grains.
	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Number of grains currently under this key.
	pub fn len(&self) -> usize {
		self.values.len()
	}

	/// Whether a tentative insert is pending; a lookup must hide the entry's
	/// visibility from non-uniqueness consumers while this holds
	/// (`spec.md` §4.1).
	pub fn is_tentative_insert(&self) -> bool {
		self.tentative_op == TentativeOp::Insert
	}

	/// Whether a tentative delete is pending.
	pub fn is_tentative_delete(&self) -> bool {
		self.tentative_op == TentativeOp::Delete
	}

	/// Current tentative marker.
	pub fn tentative_op(&self) -> TentativeOp {
		self.tentative_op
	}

	/// Sets the tentative marker directly.
	pub fn set_tentative_op(&mut self, op: TentativeOp) {
		self.tentative_op = op;
	}

	/// All grains currently under this key, in stable (sorted) order.
	///
	/// `spec.md` §4.1 does not promise iteration order within an entry; a
	/// `BTreeSet` gives deterministic order for free, which this crate
	/// relies on only for test reproducibility, never for correctness.
	pub fn values(&self) -> impl Iterator<Item = &GrainRef> {
		self.values.iter()
	}

	/// Whether `grain` is present in this entry's value set.
	pub fn contains(&self, grain: &GrainRef) -> bool {
		self.values.contains(grain)
	}

	/// Inserts `grain`, returning whether it was newly added.
	pub fn insert(&mut self, grain: GrainRef) -> bool {
		self.values.insert(grain)
	}

	/// Removes `grain`, returning whether it was present.
	pub fn remove(&mut self, grain: &GrainRef) -> bool {
		self.values.remove(grain)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grain(pk: &str) -> GrainRef {
		GrainRef::new("T", pk)
	}

	#[test]
	fn single_creates_one_member_steady_entry() {
		let e = BucketEntry::single(grain("p1"));
		assert_eq!(e.len(), 1);
		assert_eq!(e.tentative_op(), TentativeOp::None);
	}

	#[test]
	fn insert_and_remove_round_trip() {
		let mut e = BucketEntry::default();
		assert!(e.insert(grain("p1")));
		assert!(!e.insert(grain("p1")));
		assert!(e.contains(&grain("p1")));
		assert!(e.remove(&grain("p1")));
		assert!(e.is_empty());
	}
}

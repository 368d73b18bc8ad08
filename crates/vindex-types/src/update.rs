use serde::{Deserialize, Serialize};

use crate::key::IndexKey;

/// Classifies an [`IndexedPropertyUpdate`] by the shape of its before/after pair.
///
/// Derivable purely from `(before, after)` (`spec.md` §3): this type never
/// needs to be constructed directly by callers, only read back from
/// [`IndexedPropertyUpdate::op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateOp {
	/// No change: `before == after`, or both absent.
	None,
	/// `before` absent, `after` present.
	Insert,
	/// `before` and `after` present and distinct.
	Update,
	/// `before` present, `after` absent.
	Delete,
}

/// Visibility of an applied update, governing tentative-flag handling in the
/// bucket state machine (`spec.md` §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateVisibility {
	/// Visible only to uniqueness checks; confirmed or reversed by the queue.
	Tentative,
	/// Fully applied and visible to lookups.
	NonTentative,
	/// Applied as part of a transactional (non-tentative, non-reversible)
	/// commit — clears any lingering tentative flag unconditionally.
	Transactional,
}

/// A single property's before/after transition produced by diffing a grain's
/// state on commit (`spec.md` §3, §4.5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedPropertyUpdate {
	before: Option<IndexKey>,
	after: Option<IndexKey>,
	op: UpdateOp,
	/// How this update should be applied by the bucket state machine.
	pub visibility: UpdateVisibility,
}

impl IndexedPropertyUpdate {
	/// Builds an update from a before/after pair, deriving `op` per the
	/// invariants in `spec.md` §3.
	pub fn make(
		before: Option<IndexKey>,
		after: Option<IndexKey>,
		visibility: UpdateVisibility,
	) -> Self {
		let op = match (&before, &after) {
			(None, None) => UpdateOp::None,
			(None, Some(_)) => UpdateOp::Insert,
			(Some(_), None) => UpdateOp::Delete,
			(Some(b), Some(a)) if b == a => UpdateOp::None,
			(Some(_), Some(_)) => UpdateOp::Update,
		};
		Self {
			before,
			after,
			op,
			visibility,
		}
	}

	/// The property value prior to the commit, or `None` if it was absent.
	pub fn before(&self) -> Option<&IndexKey> {
		self.before.as_ref()
	}

	/// The property value after the commit, or `None` if it was cleared.
	pub fn after(&self) -> Option<&IndexKey> {
		self.after.as_ref()
	}

	/// The derived operation kind.
	pub fn op(&self) -> UpdateOp {
		self.op
	}

	/// Whether this update is a no-op (`before == after`).
	pub fn is_noop(&self) -> bool {
		self.op == UpdateOp::None
	}

	/// Builds the reverse CRUD of this update: `Insert` becomes `Delete` and
	/// vice versa, by swapping `before` and `after`. Used by the queue
	/// processor to undo a tentative write left behind by an aborted commit
	/// (`spec.md` §4.6 step 3).
	///
	/// `Update` reverses to the symmetric update (`after`, `before`); `None`
	/// reverses to itself.
	pub fn reversed(&self, visibility: UpdateVisibility) -> Self {
		Self::make(self.after.clone(), self.before.clone(), visibility)
	}
}

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use vindex_types::{BucketEntry, IndexKey, IndexKind};

/// Backing map for a bucket's entries: a hash map for `Hash` indexes, an
/// ordered map for `Sorted` indexes. Kept as one enum (per the Design Note
/// in `spec.md` §9: "tagged variant... avoid deep inheritance hierarchies")
/// so [`crate::BucketState`] has a single `apply` implementation instead of
/// two near-duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EntryMap {
	/// Equality lookup; no iteration-order guarantee.
	Hash(HashMap<IndexKey, BucketEntry>),
	/// Range lookup; ordered by key.
	Sorted(BTreeMap<IndexKey, BucketEntry>),
}

impl EntryMap {
	/// An empty hash-backed map.
	pub fn new_hash() -> Self {
		Self::Hash(HashMap::new())
	}

	/// An empty sorted-backed map.
	pub fn new_sorted() -> Self {
		Self::Sorted(BTreeMap::new())
	}

	/// The index kind this map backs.
	pub fn kind(&self) -> IndexKind {
		match self {
			Self::Hash(_) => IndexKind::Hash,
			Self::Sorted(_) => IndexKind::Sorted,
		}
	}

	/// Number of distinct keys currently stored.
	pub fn len(&self) -> usize {
		match self {
			Self::Hash(m) => m.len(),
			Self::Sorted(m) => m.len(),
		}
	}

	/// Whether the map holds no keys.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn get(&self, key: &IndexKey) -> Option<&BucketEntry> {
		match self {
			Self::Hash(m) => m.get(key),
			Self::Sorted(m) => m.get(key),
		}
	}

	pub fn get_mut(&mut self, key: &IndexKey) -> Option<&mut BucketEntry> {
		match self {
			Self::Hash(m) => m.get_mut(key),
			Self::Sorted(m) => m.get_mut(key),
		}
	}

	pub fn contains_key(&self, key: &IndexKey) -> bool {
		match self {
			Self::Hash(m) => m.contains_key(key),
			Self::Sorted(m) => m.contains_key(key),
		}
	}

	/// Returns the entry at `key`, inserting a default (empty) one first if
	/// absent.
	pub fn entry_or_default(&mut self, key: IndexKey) -> &mut BucketEntry {
		match self {
			Self::Hash(m) => m.entry(key).or_default(),
			Self::Sorted(m) => m.entry(key).or_default(),
		}
	}

	pub fn remove(&mut self, key: &IndexKey) -> Option<BucketEntry> {
		match self {
			Self::Hash(m) => m.remove(key),
			Self::Sorted(m) => m.remove(key),
		}
	}

	/// The smallest and largest keys currently stored, if any (sorted maps
	/// only report this in O(log n); hash maps scan, but this crate never
	/// calls it on a `Hash` variant).
	pub fn min_max(&self) -> Option<(&IndexKey, &IndexKey)> {
		match self {
			Self::Hash(_) => None,
			Self::Sorted(m) => {
				let min = m.keys().next()?;
				let max = m.keys().next_back()?;
				Some((min, max))
			}
		}
	}

	/// Iterates `(key, entry)` pairs with keys in `[start, end]` inclusive,
	/// in ascending key order. Only meaningful for `Sorted`.
	pub fn range_inclusive<'a>(
		&'a self,
		start: &'a IndexKey,
		end: &'a IndexKey,
	) -> Box<dyn Iterator<Item = (&'a IndexKey, &'a BucketEntry)> + 'a> {
		match self {
			Self::Hash(_) => Box::new(std::iter::empty()),
			Self::Sorted(m) => Box::new(m.range(start.clone()..=end.clone())),
		}
	}
}

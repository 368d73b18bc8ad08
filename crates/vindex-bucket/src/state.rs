use serde::{Deserialize, Serialize};
use vindex_types::{
	BucketEntry, BucketPrimaryKey, GrainRef, IndexKey, IndexKind, IndexedPropertyUpdate,
	IndexingError, RangeOverlap, TentativeOp, UpdateOp, UpdateVisibility,
};

use crate::entries::EntryMap;
use crate::status::BucketStatus;

/// On-disk shape of a [`BucketState`], round-tripped through `postcard`
/// (`spec.md` §6: "persisted formats... serialized via versioned field
/// ids"). Kept distinct from `BucketState` itself so the in-memory type is
/// free to gain non-serialized fields (e.g. caches) without a migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BucketStateSnapshot {
	entries: EntryMap,
	next_bucket: Option<BucketPrimaryKey>,
	status: BucketStatus,
}

/// Per-call context an index client supplies to [`BucketState::apply`]:
/// everything the bucket needs from the index descriptor but has no reason
/// to store itself (`spec.md` §4.1).
#[derive(Debug, Clone)]
pub struct ApplyContext {
	/// Name of the index this bucket partitions, for error messages.
	pub index_name: String,
	/// Whether this index enforces at most one non-tentative grain per key.
	pub unique: bool,
	/// Entries-per-bucket ceiling before chaining kicks in.
	pub max_bucket_size: usize,
	/// Whether overflow chaining is enabled for this index. `false` means
	/// an over-full bucket simply keeps growing (used by schemes that never
	/// chain, e.g. a `SingleNode` hash index).
	pub chaining_enabled: bool,
}

/// Result of [`BucketState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOutcome {
	/// Whether this bucket (rather than a successor) handled the update.
	/// `false` means the caller must forward the original update to
	/// `next_bucket`, allocating one on demand if absent.
	pub ok: bool,
	/// Signals that a delete arrived while the bucket was still
	/// `UnderConstruction`; the construction process should tombstone the
	/// key so it isn't resurrected (`spec.md` §4.1).
	pub fix_delete_on_unavailable: bool,
}

impl ApplyOutcome {
	fn accepted() -> Self {
		Self {
			ok: true,
			fix_delete_on_unavailable: false,
		}
	}

	fn forward() -> Self {
		Self {
			ok: false,
			fix_delete_on_unavailable: false,
		}
	}
}

/// In-memory state of one index partition (`spec.md` §3, component C1).
///
/// Materializes on first activation of its owning bucket actor and persists
/// thereafter; this type itself has no I/O, matching the Design Note that
/// the bucket state machine is a pure, synchronous data structure.
#[derive(Debug, Clone)]
pub struct BucketState {
	entries: EntryMap,
	next_bucket: Option<BucketPrimaryKey>,
	status: BucketStatus,
}

impl BucketState {
	/// A fresh, empty hash-backed bucket.
	pub fn new_hash() -> Self {
		Self {
			entries: EntryMap::new_hash(),
			next_bucket: None,
			status: BucketStatus::Available,
		}
	}

	/// A fresh, empty sorted-backed bucket.
	pub fn new_sorted() -> Self {
		Self {
			entries: EntryMap::new_sorted(),
			next_bucket: None,
			status: BucketStatus::Available,
		}
	}

	/// Which index kind this bucket backs.
	pub fn kind(&self) -> IndexKind {
		self.entries.kind()
	}

	/// Current lifecycle status.
	pub fn status(&self) -> BucketStatus {
		self.status
	}

	/// Sets the lifecycle status.
	pub fn set_status(&mut self, status: BucketStatus) {
		self.status = status;
	}

	/// Number of distinct keys currently stored.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the bucket holds no keys.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// The successor bucket in this index's overflow chain, if any.
	pub fn next_bucket(&self) -> Option<&BucketPrimaryKey> {
		self.next_bucket.as_ref()
	}

	/// Records the successor bucket once it has been allocated.
	pub fn set_next_bucket(&mut self, pk: BucketPrimaryKey) {
		self.next_bucket = Some(pk);
	}

	/// Looks up the entry stored under `key`, if any. O(1) for `Hash`,
	/// O(log n) for `Sorted`.
	pub fn try_get(&self, key: &IndexKey) -> Option<&BucketEntry> {
		self.entries.get(key)
	}

	/// A page of `key`'s entry values. Negative `offset`/`size` is rejected;
	/// `size == 0` or `offset` past the matched count returns empty.
	pub fn get_page(
		&self,
		key: &IndexKey,
		offset: i64,
		size: i64,
	) -> Result<Vec<GrainRef>, IndexingError> {
		let (offset, size) = validate_page(offset, size)?;
		let Some(entry) = self.entries.get(key) else {
			return Ok(Vec::new());
		};
		Ok(paginate(entry.values().cloned(), offset, size))
	}

	/// A page of grains across `[start, end]` inclusive, `Sorted` buckets
	/// only. `start <= end` is required.
	pub fn range(
		&self,
		start: &IndexKey,
		end: &IndexKey,
		offset: i64,
		size: i64,
	) -> Result<Vec<GrainRef>, IndexingError> {
		self.require_sorted("range")?;
		assert!(start <= end, "range start must not exceed end");
		let (offset, size) = validate_page(offset, size)?;
		let values = self
			.entries
			.range_inclusive(start, end)
			.flat_map(|(_, entry)| entry.values().cloned());
		Ok(paginate(values, offset, size))
	}

	/// How `[start, end]` relates to this bucket's stored key set
	/// (`spec.md` §4.1, §4.3). `Sorted` buckets only.
	///
	/// Empty-bucket policy: with nothing stored, there is no stored range
	/// for `[start, end]` to overlap, so this reports `GreaterThan` — "skip
	/// and continue" is the safe default, since an empty bucket can never
	/// hold the answer to a lookup.
	pub fn range_overlap(&self, start: &IndexKey, end: &IndexKey) -> Result<RangeOverlap, IndexingError> {
		self.require_sorted("range_overlap")?;
		assert!(start <= end, "range start must not exceed end");
		let Some((min_key, max_key)) = self.entries.min_max() else {
			return Ok(RangeOverlap::GreaterThan);
		};
		Ok(if end < min_key {
			RangeOverlap::LessThan
		} else if start > max_key {
			RangeOverlap::GreaterThan
		} else if start <= min_key && end >= max_key {
			RangeOverlap::Superset
		} else if start <= min_key {
			RangeOverlap::PartialLessThan
		} else if end >= max_key {
			RangeOverlap::PartialGreaterThan
		} else {
			RangeOverlap::Subset
		})
	}

	/// Applies one indexed-property update to this bucket, per the table in
	/// `spec.md` §4.1.
	pub fn apply(
		&mut self,
		grain: &GrainRef,
		update: &IndexedPropertyUpdate,
		ctx: &ApplyContext,
	) -> Result<ApplyOutcome, IndexingError> {
		if !self.status.is_available() {
			if update.op() == UpdateOp::Delete {
				return Ok(ApplyOutcome {
					ok: true,
					fix_delete_on_unavailable: true,
				});
			}
			return Err(IndexingError::IndexUnavailable {
				reason: format!("bucket status is {:?}", self.status),
			});
		}

		match update.op() {
			UpdateOp::None => Ok(ApplyOutcome::accepted()),
			UpdateOp::Insert => {
				let after = update
					.after()
					.ok_or_else(|| invalid("Insert requires an after value"))?;
				self.apply_insert(grain, after, update.visibility, ctx)
			}
			UpdateOp::Delete => {
				let before = update
					.before()
					.ok_or_else(|| invalid("Delete requires a before value"))?;
				self.apply_delete(grain, before, update.visibility)
			}
			UpdateOp::Update => {
				let before = update
					.before()
					.ok_or_else(|| invalid("Update requires a before value"))?;
				let after = update
					.after()
					.ok_or_else(|| invalid("Update requires an after value"))?;
				self.apply_update(grain, before, after, update.visibility, ctx)
			}
		}
	}

	fn apply_insert(
		&mut self,
		grain: &GrainRef,
		key: &IndexKey,
		visibility: UpdateVisibility,
		ctx: &ApplyContext,
	) -> Result<ApplyOutcome, IndexingError> {
		if let Some(existing) = self.entries.get(key) {
			if existing.contains(grain) {
				let entry = self.entries.get_mut(key).expect("checked above");
				set_tentative_for_insert(entry, visibility);
				return Ok(ApplyOutcome::accepted());
			}
			if ctx.unique && !existing.is_empty() {
				let holder = existing.values().next().cloned().unwrap_or_else(|| grain.clone());
				return Err(uniqueness_violation(ctx, key, &holder));
			}
			let entry = self.entries.get_mut(key).expect("checked above");
			entry.insert(grain.clone());
			set_tentative_for_insert(entry, visibility);
			return Ok(ApplyOutcome::accepted());
		}

		if ctx.chaining_enabled && self.entries.len() >= ctx.max_bucket_size {
			return Ok(ApplyOutcome::forward());
		}

		let entry = self.entries.entry_or_default(key.clone());
		entry.insert(grain.clone());
		set_tentative_for_insert(entry, visibility);
		Ok(ApplyOutcome::accepted())
	}

	fn apply_delete(
		&mut self,
		grain: &GrainRef,
		key: &IndexKey,
		visibility: UpdateVisibility,
	) -> Result<ApplyOutcome, IndexingError> {
		let Some(entry) = self.entries.get_mut(key) else {
			return Ok(if self.next_bucket.is_some() {
				ApplyOutcome::forward()
			} else {
				// Idempotent delete at the chain tail (spec.md §8).
				ApplyOutcome::accepted()
			});
		};

		if !entry.contains(grain) {
			return Ok(if self.next_bucket.is_some() {
				ApplyOutcome::forward()
			} else {
				ApplyOutcome::accepted()
			});
		}

		if visibility == UpdateVisibility::Tentative {
			entry.set_tentative_op(TentativeOp::Delete);
			return Ok(ApplyOutcome::accepted());
		}

		// NonTentative and Transactional deletes always physically remove,
		// regardless of index uniqueness: spec.md §4.1 states unconditionally
		// that "the actual removal happens on NonTentative or Transactional
		// delete", which this crate takes as authoritative over the more
		// ambiguous "require tentative-flag" phrasing in the same section's
		// table (see DESIGN.md).
		entry.remove(grain);
		if entry.is_empty() {
			self.entries.remove(key);
		} else {
			entry.set_tentative_op(TentativeOp::None);
		}
		Ok(ApplyOutcome::accepted())
	}

	fn apply_update(
		&mut self,
		grain: &GrainRef,
		before: &IndexKey,
		after: &IndexKey,
		visibility: UpdateVisibility,
		ctx: &ApplyContext,
	) -> Result<ApplyOutcome, IndexingError> {
		let before_here = self.entries.contains_key(before);
		if !before_here && self.next_bucket.is_some() {
			return Ok(ApplyOutcome::forward());
		}

		if let Some(existing) = self.entries.get(after) {
			if ctx.unique && !existing.contains(grain) && !existing.is_empty() {
				let holder = existing.values().next().cloned().unwrap_or_else(|| grain.clone());
				return Err(uniqueness_violation(ctx, after, &holder));
			}
		} else if ctx.chaining_enabled && self.entries.len() >= ctx.max_bucket_size {
			return Ok(ApplyOutcome::forward());
		}

		if before_here {
			if let Some(entry) = self.entries.get_mut(before) {
				entry.remove(grain);
				if entry.is_empty() {
					self.entries.remove(before);
				}
			}
		}

		let entry = self.entries.entry_or_default(after.clone());
		entry.insert(grain.clone());
		set_tentative_for_insert(entry, visibility);
		Ok(ApplyOutcome::accepted())
	}

	fn require_sorted(&self, op: &str) -> Result<(), IndexingError> {
		if self.kind() != IndexKind::Sorted {
			return Err(invalid(&format!("{op} is only valid on a Sorted bucket")));
		}
		Ok(())
	}

	/// Encodes this state for persistence.
	pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
		postcard::to_allocvec(&BucketStateSnapshot {
			entries: self.entries.clone(),
			next_bucket: self.next_bucket.clone(),
			status: self.status,
		})
	}

	/// Decodes a state previously written by [`BucketState::to_bytes`].
	pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
		let snapshot: BucketStateSnapshot = postcard::from_bytes(bytes)?;
		Ok(Self {
			entries: snapshot.entries,
			next_bucket: snapshot.next_bucket,
			status: snapshot.status,
		})
	}
}

fn set_tentative_for_insert(entry: &mut BucketEntry, visibility: UpdateVisibility) {
	match visibility {
		UpdateVisibility::Tentative => entry.set_tentative_op(TentativeOp::Insert),
		UpdateVisibility::NonTentative | UpdateVisibility::Transactional => {
			entry.set_tentative_op(TentativeOp::None)
		}
	}
}

fn uniqueness_violation(ctx: &ApplyContext, key: &IndexKey, holder: &GrainRef) -> IndexingError {
	IndexingError::UniquenessViolation {
		index: ctx.index_name.clone(),
		key: format!("{key:?}"),
		holder: holder.to_string(),
	}
}

fn invalid(reason: &str) -> IndexingError {
	IndexingError::InvalidUpdate {
		reason: reason.to_string(),
	}
}

fn validate_page(offset: i64, size: i64) -> Result<(usize, usize), IndexingError> {
	if offset < 0 {
		return Err(invalid("page offset must not be negative"));
	}
	if size < 0 {
		return Err(invalid("page size must not be negative"));
	}
	Ok((offset as usize, size as usize))
}

fn paginate(values: impl Iterator<Item = GrainRef>, offset: usize, size: usize) -> Vec<GrainRef> {
	if size == 0 {
		return Vec::new();
	}
	values.skip(offset).take(size).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn grain(pk: &str) -> GrainRef {
		GrainRef::new("T", pk)
	}

	fn ctx(unique: bool) -> ApplyContext {
		ApplyContext {
			index_name: "_Status".to_string(),
			unique,
			max_bucket_size: 2,
			chaining_enabled: true,
		}
	}

	fn insert(after: &str) -> IndexedPropertyUpdate {
		IndexedPropertyUpdate::make(
			None,
			Some(IndexKey::Str(after.into())),
			UpdateVisibility::NonTentative,
		)
	}

	#[test]
	fn bytes_round_trip_preserves_entries_and_chain() {
		let mut b = BucketState::new_hash();
		b.apply(&grain("g1"), &insert("k1"), &ctx(false)).unwrap();
		b.set_next_bucket(BucketPrimaryKey::first("T", "P", "0").successor(1));
		let bytes = b.to_bytes().unwrap();
		let restored = BucketState::from_bytes(&bytes).unwrap();
		assert_eq!(restored.len(), 1);
		assert_eq!(restored.next_bucket(), b.next_bucket());
		assert!(restored
			.try_get(&IndexKey::Str("k1".into()))
			.unwrap()
			.contains(&grain("g1")));
	}

	#[test]
	fn insert_into_absent_key_creates_entry() {
		let mut b = BucketState::new_hash();
		let outcome = b.apply(&grain("g1"), &insert("k1"), &ctx(false)).unwrap();
		assert!(outcome.ok);
		assert_eq!(b.try_get(&IndexKey::Str("k1".into())).unwrap().len(), 1);
	}

	#[test]
	fn unique_insert_conflict_is_rejected() {
		let mut b = BucketState::new_hash();
		b.apply(&grain("g1"), &insert("k1"), &ctx(true)).unwrap();
		let err = b.apply(&grain("g2"), &insert("k1"), &ctx(true)).unwrap_err();
		assert!(matches!(err, IndexingError::UniquenessViolation { .. }));
	}

	#[test]
	fn non_unique_insert_allows_multiple_grains() {
		let mut b = BucketState::new_hash();
		b.apply(&grain("g1"), &insert("k1"), &ctx(false)).unwrap();
		b.apply(&grain("g2"), &insert("k1"), &ctx(false)).unwrap();
		assert_eq!(b.try_get(&IndexKey::Str("k1".into())).unwrap().len(), 2);
	}

	#[test]
	fn bucket_full_forwards_instead_of_mutating() {
		let mut c = ctx(false);
		c.max_bucket_size = 1;
		let mut b = BucketState::new_hash();
		b.apply(&grain("g1"), &insert("k1"), &c).unwrap();
		let outcome = b.apply(&grain("g2"), &insert("k2"), &c).unwrap();
		assert!(!outcome.ok);
		assert_eq!(b.len(), 1);
	}

	#[test]
	fn tentative_insert_is_visible_via_entry_flag() {
		let mut b = BucketState::new_hash();
		let update = IndexedPropertyUpdate::make(
			None,
			Some(IndexKey::Str("k1".into())),
			UpdateVisibility::Tentative,
		);
		b.apply(&grain("g1"), &update, &ctx(true)).unwrap();
		let entry = b.try_get(&IndexKey::Str("k1".into())).unwrap();
		assert!(entry.is_tentative_insert());
	}

	#[test]
	fn tentative_delete_does_not_remove() {
		let mut b = BucketState::new_hash();
		b.apply(&grain("g1"), &insert("k1"), &ctx(false)).unwrap();
		let del = IndexedPropertyUpdate::make(
			Some(IndexKey::Str("k1".into())),
			None,
			UpdateVisibility::Tentative,
		);
		b.apply(&grain("g1"), &del, &ctx(false)).unwrap();
		let entry = b.try_get(&IndexKey::Str("k1".into())).unwrap();
		assert!(entry.contains(&grain("g1")));
		assert!(entry.is_tentative_delete());
	}

	#[test]
	fn non_tentative_delete_removes() {
		let mut b = BucketState::new_hash();
		b.apply(&grain("g1"), &insert("k1"), &ctx(false)).unwrap();
		let del = IndexedPropertyUpdate::make(
			Some(IndexKey::Str("k1".into())),
			None,
			UpdateVisibility::NonTentative,
		);
		b.apply(&grain("g1"), &del, &ctx(false)).unwrap();
		assert!(b.try_get(&IndexKey::Str("k1".into())).is_none());
	}

	#[test]
	fn delete_of_absent_key_at_chain_tail_is_idempotent() {
		let mut b = BucketState::new_hash();
		let del = IndexedPropertyUpdate::make(
			Some(IndexKey::Str("missing".into())),
			None,
			UpdateVisibility::NonTentative,
		);
		let outcome = b.apply(&grain("g1"), &del, &ctx(false)).unwrap();
		assert!(outcome.ok);
	}

	#[test]
	fn delete_of_absent_key_when_chained_forwards() {
		let mut b = BucketState::new_hash();
		b.set_next_bucket(BucketPrimaryKey::first("T", "P", "0").successor(1));
		let del = IndexedPropertyUpdate::make(
			Some(IndexKey::Str("missing".into())),
			None,
			UpdateVisibility::NonTentative,
		);
		let outcome = b.apply(&grain("g1"), &del, &ctx(false)).unwrap();
		assert!(!outcome.ok);
	}

	#[test]
	fn update_moves_grain_between_keys() {
		let mut b = BucketState::new_hash();
		b.apply(&grain("g1"), &insert("before"), &ctx(false)).unwrap();
		let upd = IndexedPropertyUpdate::make(
			Some(IndexKey::Str("before".into())),
			Some(IndexKey::Str("after".into())),
			UpdateVisibility::NonTentative,
		);
		b.apply(&grain("g1"), &upd, &ctx(false)).unwrap();
		assert!(b.try_get(&IndexKey::Str("before".into())).is_none());
		assert!(b
			.try_get(&IndexKey::Str("after".into()))
			.unwrap()
			.contains(&grain("g1")));
	}

	#[test]
	fn index_unavailable_rejects_non_delete_updates() {
		let mut b = BucketState::new_hash();
		b.set_status(BucketStatus::UnderConstruction);
		let err = b.apply(&grain("g1"), &insert("k1"), &ctx(false)).unwrap_err();
		assert!(matches!(err, IndexingError::IndexUnavailable { .. }));
	}

	#[test]
	fn index_unavailable_accepts_deletes_with_fix_flag() {
		let mut b = BucketState::new_hash();
		b.set_status(BucketStatus::UnderConstruction);
		let del = IndexedPropertyUpdate::make(
			Some(IndexKey::Str("k1".into())),
			None,
			UpdateVisibility::NonTentative,
		);
		let outcome = b.apply(&grain("g1"), &del, &ctx(false)).unwrap();
		assert!(outcome.fix_delete_on_unavailable);
	}

	fn sorted_with(keys: &[i64]) -> BucketState {
		let mut b = BucketState::new_sorted();
		for k in keys {
			let upd = IndexedPropertyUpdate::make(
				None,
				Some(IndexKey::I64(*k)),
				UpdateVisibility::NonTentative,
			);
			b.apply(&grain("g1"), &upd, &ctx(false)).unwrap();
		}
		b
	}

	#[test]
	fn range_overlap_empty_bucket_is_greater_than() {
		let b = BucketState::new_sorted();
		let overlap = b
			.range_overlap(&IndexKey::I64(0), &IndexKey::I64(10))
			.unwrap();
		assert_eq!(overlap, RangeOverlap::GreaterThan);
	}

	#[test]
	fn range_overlap_variants() {
		let b = sorted_with(&[10, 20, 30]);
		assert_eq!(
			b.range_overlap(&IndexKey::I64(0), &IndexKey::I64(5)).unwrap(),
			RangeOverlap::LessThan
		);
		assert_eq!(
			b.range_overlap(&IndexKey::I64(40), &IndexKey::I64(50)).unwrap(),
			RangeOverlap::GreaterThan
		);
		assert_eq!(
			b.range_overlap(&IndexKey::I64(0), &IndexKey::I64(100)).unwrap(),
			RangeOverlap::Superset
		);
		assert_eq!(
			b.range_overlap(&IndexKey::I64(0), &IndexKey::I64(20)).unwrap(),
			RangeOverlap::PartialLessThan
		);
		assert_eq!(
			b.range_overlap(&IndexKey::I64(20), &IndexKey::I64(100)).unwrap(),
			RangeOverlap::PartialGreaterThan
		);
		assert_eq!(
			b.range_overlap(&IndexKey::I64(15), &IndexKey::I64(25)).unwrap(),
			RangeOverlap::Subset
		);
	}

	#[test]
	fn range_returns_values_within_bounds() {
		let b = sorted_with(&[10, 20, 30]);
		let values = b
			.range(&IndexKey::I64(15), &IndexKey::I64(30), 0, 10)
			.unwrap();
		assert_eq!(values, vec![grain("g1"), grain("g1")]);
	}

	#[test]
	fn get_page_rejects_negative_offset_or_size() {
		let b = sorted_with(&[10]);
		assert!(matches!(
			b.get_page(&IndexKey::I64(10), -1, 1),
			Err(IndexingError::InvalidUpdate { .. })
		));
		assert!(matches!(
			b.get_page(&IndexKey::I64(10), 0, -1),
			Err(IndexingError::InvalidUpdate { .. })
		));
	}

	#[test]
	fn get_page_zero_size_is_empty() {
		let b = sorted_with(&[10]);
		assert!(b.get_page(&IndexKey::I64(10), 0, 0).unwrap().is_empty());
	}

	#[test]
	fn get_page_offset_past_end_is_empty() {
		let b = sorted_with(&[10]);
		assert!(b.get_page(&IndexKey::I64(10), 5, 10).unwrap().is_empty());
	}
}

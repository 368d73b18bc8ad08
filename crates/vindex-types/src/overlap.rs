use serde::{Deserialize, Serialize};

/// How a query range `[start, end]` relates to the key set a bucket (or
/// partition) currently stores, as returned by `range_overlap`
/// (`spec.md` §4.1, §4.3).
///
/// The router contract in `spec.md` §4.3 drives traversal off this value:
/// `LessThan` stops, `GreaterThan` skips and continues, the rest query the
/// bucket/partition (stopping on `PartialLessThan`/`Superset`, continuing on
/// `Subset`/`PartialGreaterThan`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeOverlap {
	/// The entire query range sorts below the stored key set.
	LessThan,
	/// The query range partially overlaps the low end of the stored set.
	PartialLessThan,
	/// The stored set is fully contained within the query range.
	Superset,
	/// The query range is fully contained within the stored set.
	Subset,
	/// The query range partially overlaps the high end of the stored set.
	PartialGreaterThan,
	/// The entire query range sorts above the stored key set.
	GreaterThan,
}

impl RangeOverlap {
	/// Whether traversal should stop after handling this partition/bucket
	/// (`spec.md` §4.3: stop on `LessThan`, `PartialLessThan`, `Superset`).
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::LessThan | Self::PartialLessThan | Self::Superset)
	}

	/// Whether the partition/bucket itself should be queried for results
	/// (every variant except the two pure skips).
	pub fn should_query(self) -> bool {
		!matches!(self, Self::LessThan | Self::GreaterThan)
	}
}

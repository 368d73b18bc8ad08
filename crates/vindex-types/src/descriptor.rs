use serde::{Deserialize, Serialize};

/// Which shape of index a descriptor describes.
///
/// Represented as a tagged variant rather than a trait-object hierarchy
/// per the Design Note in `spec.md` §9 ("dynamic dispatch over indexes:
/// represent index kind as a tagged variant... avoid deep inheritance
/// hierarchies").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
	/// Equality lookup, optionally unique.
	Hash,
	/// Range lookup over an ordered key.
	Sorted,
}

/// Names a partition scheme by kind; the scheme's actual routing logic
/// lives in `vindex-partition` (the router is a pure function per
/// `spec.md` §4.3, kept out of this value-only crate).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionSchemeKind {
	/// Hash-based partitioning over `N` buckets (`N = 0` means per-key).
	Hash {
		/// Number of partitions, or `0` for one partition per distinct key.
		partitions: u32,
	},
	/// Date-time bucketed partitioning, binned by year or by month.
	DateTime {
		/// Bin granularity.
		bin: DateTimeBin,
	},
	/// A single, non-partitioned bucket (`spec.md` §4.7: "for non-partitioned
	/// `SingleNode` hash indexes, the client is a direct reference to one
	/// bucket actor").
	SingleNode,
}

/// Granularity of a date-time partition bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateTimeBin {
	/// One partition per calendar year (`yyyy`).
	Year,
	/// One partition per calendar month (`yyyyMM`).
	Month,
}

/// A registry-resident, immutable index descriptor.
///
/// Invariant (enforced by the registry at build time, not here): within
/// one indexed-state class, all indexes share the same `eager` setting —
/// mixing eagerness is a startup error (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDescriptor {
	/// Index name, derived from the property name prefixed with `_`
	/// (`spec.md` §4.7).
	pub name: String,
	/// Hash or sorted.
	pub kind: IndexKind,
	/// Whether this index enforces at most one non-tentative value per key.
	pub unique: bool,
	/// Whether updates to this index are applied eagerly (synchronously,
	/// as part of the commit) rather than solely through the write-ahead
	/// queue.
	pub eager: bool,
	/// Maximum number of entries a single bucket holds before chaining
	/// into a successor bucket.
	pub max_bucket_size: usize,
	/// Which partition scheme routes keys/ranges for this index.
	pub partition_scheme: PartitionSchemeKind,
	/// Interface type name of the grain this index is declared against.
	pub interface_type: String,
}

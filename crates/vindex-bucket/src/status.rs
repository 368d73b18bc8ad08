use serde::{Deserialize, Serialize};

/// Lifecycle status of a bucket (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BucketStatus {
	/// Being populated (e.g. during a reindex); lookups return empty and
	/// non-delete updates are rejected.
	UnderConstruction,
	/// Serving lookups and updates normally.
	#[default]
	Available,
	/// Torn down; behaves like `UnderConstruction` for incoming traffic.
	Disposed,
}

impl BucketStatus {
	/// Whether the bucket accepts lookups and non-delete updates.
	pub fn is_available(self) -> bool {
		matches!(self, Self::Available)
	}
}

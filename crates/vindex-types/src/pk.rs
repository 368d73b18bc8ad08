use serde::{Deserialize, Serialize};

/// Builds and parses bucket primary keys (`spec.md` §6):
/// `{interfaceFullName}-_{propertyName}_{hash}` for the first bucket in a
/// chain, with successors appending `-{n}` (`n` starting at `1`, monotonically
/// increasing).
///
/// This is pure string formatting — the deterministic identity a bucket
/// actor's chain pointer resolves by, per the Design Note in `spec.md` §9
/// ("bucket -> next_bucket is resolved by identity, not a held reference").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketPrimaryKey(String);

impl BucketPrimaryKey {
	/// The primary key of the first bucket in a chain.
	pub fn first(interface_full_name: &str, property_name: &str, partition_hash: &str) -> Self {
		Self(format!("{interface_full_name}-_{property_name}_{partition_hash}"))
	}

	/// The primary key of this bucket's `n`-th successor (`n >= 1`).
	pub fn successor(&self, n: u32) -> Self {
		assert!(n >= 1, "successor numbering starts at 1");
		Self(format!("{}-{n}", self.0))
	}

	/// Borrows the underlying string form.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Extracts the segment between the first and last `-` of a
	/// three-segment (first-bucket-plus-one-successor-or-more) primary key,
	/// per `spec.md` §6. Returns `None` if the key has fewer than two `-`
	/// characters.
	pub fn index_segment(&self) -> Option<&str> {
		let first = self.0.find('-')?;
		let last = self.0.rfind('-')?;
		if first == last {
			return None;
		}
		Some(&self.0[first + 1..last])
	}
}

impl std::fmt::Display for BucketPrimaryKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<String> for BucketPrimaryKey {
	fn from(s: String) -> Self {
		Self(s)
	}
}

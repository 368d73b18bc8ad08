use vindex_types::IndexKey;

use crate::hash::stable_key_hash;

/// Hash-based partition scheme (`spec.md` §4.3).
///
/// `partition(key) = fmt(hash(key) mod N)` for `N > 0`, or `fmt(hash(key))`
/// when `N == 0` (effectively one partition per distinct key — used for
/// `SingleNode` hash indexes, where there is exactly one bucket regardless
/// of the formatted id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashPartitionScheme {
	/// Number of partitions; `0` means per-key.
	pub partitions: u32,
}

impl HashPartitionScheme {
	/// A scheme with a fixed partition count.
	pub fn new(partitions: u32) -> Self {
		Self { partitions }
	}

	/// Maps a key to its partition identifier string.
	pub fn partition(&self, key: &IndexKey) -> String {
		let hash = stable_key_hash(key);
		if self.partitions == 0 {
			hash.to_string()
		} else {
			(hash % self.partitions).to_string()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_key_routes_to_same_partition() {
		let scheme = HashPartitionScheme::new(4);
		let k = IndexKey::Str("k".into());
		assert_eq!(scheme.partition(&k), scheme.partition(&k));
	}

	#[test]
	fn partition_is_within_bounds() {
		let scheme = HashPartitionScheme::new(4);
		for i in 0..1000 {
			let k = IndexKey::I64(i);
			let p: u32 = scheme.partition(&k).parse().unwrap();
			assert!(p < 4);
		}
	}

	#[test]
	fn zero_partitions_is_per_key() {
		let scheme = HashPartitionScheme::new(0);
		let a = scheme.partition(&IndexKey::Str("a".into()));
		let b = scheme.partition(&IndexKey::Str("b".into()));
		assert_ne!(a, b);
	}

	#[test]
	fn distribution_is_roughly_uniform() {
		// spec.md §8 scenario 5: 10,000 distinct keys within +/-20% of the mean.
		let scheme = HashPartitionScheme::new(4);
		let mut counts = [0u32; 4];
		for i in 0..10_000i64 {
			let k = IndexKey::Str(format!("key-{i}"));
			let p: usize = scheme.partition(&k).parse().unwrap();
			counts[p] += 1;
		}
		let mean = 10_000.0 / 4.0;
		for c in counts {
			let delta = (c as f64 - mean).abs() / mean;
			assert!(delta < 0.2, "bucket count {c} too far from mean {mean}");
		}
	}
}

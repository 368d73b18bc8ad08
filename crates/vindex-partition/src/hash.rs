use vindex_types::IndexKey;

/// Stable, non-randomized string hash (`spec.md` §6).
///
/// Bit-exact across process runs by construction: unchecked 32-bit
/// arithmetic over UTF-16 code units, matching the reference algorithm in
/// the spec verbatim (the classic two-accumulator string hash, not
/// language-default `HashMap` hashing which is randomized per process).
pub fn stable_string_hash(s: &str) -> u32 {
	stable_unit_hash(s.encode_utf16())
}

/// Stable hash of a non-string key's canonical byte encoding
/// (`spec.md` §6: "non-string keys: stable hash of a canonical encoding of
/// the value"). Bytes are paired into big-endian 16-bit units and folded
/// through the same two-accumulator algorithm as [`stable_string_hash`], so
/// both paths share one bit-exact core.
pub fn stable_bytes_hash(bytes: &[u8]) -> u32 {
	let units = bytes
		.chunks(2)
		.map(|pair| match pair {
			[hi, lo] => u16::from_be_bytes([*hi, *lo]),
			[only] => *only as u16,
			_ => unreachable!("chunks(2) never yields more than two elements"),
		});
	stable_unit_hash(units)
}

/// Dispatches to the string or byte-canonical stable hash depending on the
/// key's variant.
pub fn stable_key_hash(key: &IndexKey) -> u32 {
	match key {
		IndexKey::Str(s) => stable_string_hash(s),
		other => stable_bytes_hash(&other.canonical_bytes()),
	}
}

fn stable_unit_hash(units: impl Iterator<Item = u16>) -> u32 {
	let seed: u32 = (5381u32 << 16).wrapping_add(5381);
	let mut h1 = seed;
	let mut h2 = seed;
	let mut units = units;
	loop {
		let Some(c0) = units.next() else { break };
		h1 = (h1 << 5).wrapping_add(h1) ^ (c0 as u32);
		match units.next() {
			Some(c1) => h2 = (h2 << 5).wrapping_add(h2) ^ (c1 as u32),
			None => break,
		}
	}
	h1.wrapping_add(h2.wrapping_mul(1566083941))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn string_hash_is_deterministic() {
		let a = stable_string_hash("P1");
		let b = stable_string_hash("P1");
		assert_eq!(a, b);
	}

	#[test]
	fn string_hash_distinguishes_distinct_inputs() {
		assert_ne!(stable_string_hash("P1"), stable_string_hash("P2"));
	}

	#[test]
	fn empty_string_hash_is_the_seed_combination() {
		let seed: u32 = (5381u32 << 16).wrapping_add(5381);
		assert_eq!(stable_string_hash(""), seed.wrapping_add(seed.wrapping_mul(1566083941)));
	}

	#[test]
	fn bytes_hash_is_deterministic() {
		let a = stable_bytes_hash(&[1, 2, 3, 4, 5]);
		let b = stable_bytes_hash(&[1, 2, 3, 4, 5]);
		assert_eq!(a, b);
	}

	proptest::proptest! {
		#[test]
		fn string_hash_never_panics(s in ".*") {
			let _ = stable_string_hash(&s);
		}
	}
}

use serde::{Deserialize, Serialize};

/// A value extracted from an indexed property by the registry's bound
/// property-reader closure.
///
/// Rust has no runtime reflection over a property's declared type, so the
/// registry resolves the concrete variant once at descriptor-build time
/// (`spec.md` §9: "the property reader per index is a closure bound at
/// registry-build time; no per-update reflection") and every later diff,
/// hash, and comparison operates on this tagged value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexKey {
	/// UTF-8 string key, hashed with the stable string hash (`spec.md` §6).
	Str(String),
	/// Signed integer key.
	I64(i64),
	/// Unsigned integer key.
	U64(u64),
	/// UUID key.
	Uuid(uuid::Uuid),
	/// UTC timestamp key, stored as milliseconds since the Unix epoch so
	/// the type remains `Ord` without pulling in a chrono dependency at
	/// this layer.
	DateTimeUtcMillis(i64),
}

impl IndexKey {
	/// Canonical byte encoding used by the stable non-string hash
	/// (`spec.md` §6: "non-string keys: stable hash of a canonical
	/// encoding of the value").
	pub fn canonical_bytes(&self) -> Vec<u8> {
		match self {
			IndexKey::Str(s) => s.as_bytes().to_vec(),
			IndexKey::I64(v) => v.to_be_bytes().to_vec(),
			IndexKey::U64(v) => v.to_be_bytes().to_vec(),
			IndexKey::Uuid(v) => v.as_bytes().to_vec(),
			IndexKey::DateTimeUtcMillis(v) => v.to_be_bytes().to_vec(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn ordering_matches_declared_variant_order() {
		let a = IndexKey::Str("a".into());
		let b = IndexKey::I64(1);
		assert!(a < b);
	}

	#[test]
	fn canonical_bytes_are_deterministic() {
		let k = IndexKey::I64(-5);
		assert_eq!(k.canonical_bytes(), k.canonical_bytes());
		assert_eq!(k.canonical_bytes(), (-5i64).to_be_bytes().to_vec());
	}
}

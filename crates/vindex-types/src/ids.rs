use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of an indexing action; the unit of dequeue and acknowledge.
pub type ActionId = Uuid;

/// Opaque identity of a grain instance (an actor of the host runtime).
///
/// The actor runtime itself is an external collaborator (see `spec.md`
/// §1), so this core only needs a stable, orderable, hashable reference
/// to "some grain" — the interface type name plus its primary key string,
/// which is also how `spec.md` §6 derives bucket primary keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GrainRef {
	/// Fully-qualified grain interface type name.
	pub interface_type: String,
	/// The grain's primary key, in its canonical string form.
	pub primary_key: String,
}

impl GrainRef {
	/// Builds a grain reference from an interface type name and primary key.
	pub fn new(interface_type: impl Into<String>, primary_key: impl Into<String>) -> Self {
		Self {
			interface_type: interface_type.into(),
			primary_key: primary_key.into(),
		}
	}
}

impl fmt::Display for GrainRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.interface_type, self.primary_key)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_joins_interface_and_key() {
		let g = GrainRef::new("Orders.IOrderGrain", "P1");
		assert_eq!(g.to_string(), "Orders.IOrderGrain/P1");
	}

	#[test]
	fn ordering_is_lexicographic_by_field_order() {
		let a = GrainRef::new("A", "2");
		let b = GrainRef::new("A", "10");
		// String ordering, not numeric — "10" < "2" lexicographically.
		assert!(b < a);
	}
}

use thiserror::Error;

/// Failures building an [`crate::IndexRegistry`] (`spec.md` §4.7).
///
/// A misconfigured startup fails cleanly through this type rather than
/// panicking — the caller decides whether to abort the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryBuildError {
	/// Two indexes on the same state class share a name.
	#[error("state class '{state_type}' declares index '{name}' more than once")]
	DuplicateIndexName {
		/// The indexed-state class the duplicate was declared on.
		state_type: &'static str,
		/// The repeated index name.
		name: String,
	},

	/// A state class mixes eager and non-eager indexes (`spec.md` §3:
	/// "within one indexed-state class, all indexes share the same
	/// eagerness; mixing is a startup error").
	#[error("state class '{state_type}' mixes eager and non-eager indexes")]
	MixedEagerness {
		/// The indexed-state class with inconsistent eagerness.
		state_type: &'static str,
	},

	/// Two different state classes declare indexes against the same grain
	/// interface (`spec.md` §4.7: "verify each indexable grain interface
	/// has exactly one indexed-state type").
	#[error(
		"grain interface '{interface}' has indexes declared by both '{first_state_type}' and '{second_state_type}'"
	)]
	MultipleStateTypesForInterface {
		/// The grain interface type name in conflict.
		interface: String,
		/// The state class seen first for this interface.
		first_state_type: &'static str,
		/// The state class that collided with it.
		second_state_type: &'static str,
	},

	/// A configured parallelism field exceeds the system's hard fan-out
	/// cap (`spec.md` §5: "exceeding this is a configuration error, not
	/// silently relaxed").
	#[error("'{field}' = {value} exceeds the maximum allowed parallelism of {max}")]
	ParallelismExceeded {
		/// Name of the offending configuration field.
		field: &'static str,
		/// The configured value.
		value: u32,
		/// The hard cap it exceeded.
		max: u32,
	},
}

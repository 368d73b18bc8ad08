use std::collections::HashMap;

use tracing::error;
use vindex_config::IndexingSystemConfig;
use vindex_types::IndexDescriptor;

use crate::def::IndexDescriptorDef;
use crate::error::RegistryBuildError;

/// Hard ceiling on any configured parallelism field, independent of the
/// value a caller chooses as a working default (`spec.md` §5: "a
/// parallelism cap (default 10)... exceeding this is a configuration error,
/// not silently relaxed").
pub const MAX_PARALLELISM: u32 = 64;

/// Static, immutable map from grain interface to indexed-state class to the
/// set of index descriptors declared on it (`spec.md` §2, §4.7, component
/// C7).
///
/// Built once at startup and passed by shared read-only reference
/// thereafter (`spec.md` §5: "registry is read-only after construction").
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
	by_interface: HashMap<String, Vec<IndexDescriptor>>,
}

impl IndexRegistry {
	/// Builds the registry by draining every [`IndexDescriptorDef`]
	/// registered via `inventory::submit!` (directly or through the
	/// `register_index_descriptor!` macro) across the whole process, once.
	///
	/// This is the annotation-discovery substitute named in `spec.md` §9:
	/// "if annotation scanning is not available, expose an equivalent
	/// builder API" — [`crate::IndexRegistryBuilder`] is that other half,
	/// for callers who construct descriptors programmatically instead.
	pub fn build(config: &IndexingSystemConfig) -> Result<Self, RegistryBuildError> {
		let defs = inventory::iter::<IndexDescriptorDef>().cloned();
		Self::from_defs(defs, config)
	}

	/// Builds the registry from an explicit iterable of declarations,
	/// shared by [`Self::build`] and [`crate::IndexRegistryBuilder::build`].
	pub(crate) fn from_defs(
		defs: impl IntoIterator<Item = IndexDescriptorDef>,
		config: &IndexingSystemConfig,
	) -> Result<Self, RegistryBuildError> {
		check_parallelism(config)?;

		let mut by_state_type: HashMap<&'static str, Vec<IndexDescriptor>> = HashMap::new();
		for def in defs {
			by_state_type.entry(def.state_type_name).or_default().push(def.descriptor);
		}

		let mut interface_owner: HashMap<String, &'static str> = HashMap::new();
		let mut by_interface: HashMap<String, Vec<IndexDescriptor>> = HashMap::new();

		for (state_type, descriptors) in by_state_type {
			validate_no_duplicate_names(state_type, &descriptors)?;
			validate_consistent_eagerness(state_type, &descriptors)?;

			for descriptor in &descriptors {
				match interface_owner.get(&descriptor.interface_type) {
					Some(owner) if *owner != state_type => {
						return Err(RegistryBuildError::MultipleStateTypesForInterface {
							interface: descriptor.interface_type.clone(),
							first_state_type: owner,
							second_state_type: state_type,
						});
					}
					_ => {
						interface_owner.insert(descriptor.interface_type.clone(), state_type);
					}
				}
			}

			for descriptor in descriptors {
				by_interface.entry(descriptor.interface_type.clone()).or_default().push(descriptor);
			}
		}

		Ok(Self { by_interface })
	}

	/// Every index descriptor declared on `interface`, in declaration
	/// order. Empty if the interface has no indexed-state class.
	pub fn descriptors_for_interface(&self, interface: &str) -> &[IndexDescriptor] {
		self.by_interface.get(interface).map(Vec::as_slice).unwrap_or(&[])
	}

	/// A single named descriptor declared on `interface`, if any.
	pub fn descriptor(&self, interface: &str, name: &str) -> Option<&IndexDescriptor> {
		self.descriptors_for_interface(interface).iter().find(|d| d.name == name)
	}

	/// Every grain interface with at least one registered index.
	pub fn interfaces(&self) -> impl Iterator<Item = &str> {
		self.by_interface.keys().map(String::as_str)
	}
}

fn check_parallelism(config: &IndexingSystemConfig) -> Result<(), RegistryBuildError> {
	let checks: [(&'static str, u32); 2] = [
		("IndexUpdateParallelism", config.index_update_parallelism),
		("EnqueueParallelism", config.enqueue_parallelism),
	];
	for (field, value) in checks {
		if value > MAX_PARALLELISM {
			error!(field, value, max = MAX_PARALLELISM, "configured parallelism exceeds the hard cap");
			return Err(RegistryBuildError::ParallelismExceeded { field, value, max: MAX_PARALLELISM });
		}
	}
	Ok(())
}

fn validate_no_duplicate_names(
	state_type: &'static str,
	descriptors: &[IndexDescriptor],
) -> Result<(), RegistryBuildError> {
	let mut seen = std::collections::HashSet::new();
	for descriptor in descriptors {
		if !seen.insert(descriptor.name.as_str()) {
			return Err(RegistryBuildError::DuplicateIndexName {
				state_type,
				name: descriptor.name.clone(),
			});
		}
	}
	Ok(())
}

fn validate_consistent_eagerness(
	state_type: &'static str,
	descriptors: &[IndexDescriptor],
) -> Result<(), RegistryBuildError> {
	let mut eager_values = descriptors.iter().map(|d| d.eager);
	let Some(first) = eager_values.next() else {
		return Ok(());
	};
	if eager_values.any(|eager| eager != first) {
		return Err(RegistryBuildError::MixedEagerness { state_type });
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use vindex_types::{DateTimeBin, IndexKind, PartitionSchemeKind};

	use super::*;

	fn descriptor(name: &str, unique: bool, eager: bool, interface: &str) -> IndexDescriptor {
		IndexDescriptor {
			name: name.to_string(),
			kind: IndexKind::Hash,
			unique,
			eager,
			max_bucket_size: 1000,
			partition_scheme: PartitionSchemeKind::Hash { partitions: 4 },
			interface_type: interface.to_string(),
		}
	}

	fn sorted_descriptor(name: &str, interface: &str) -> IndexDescriptor {
		IndexDescriptor {
			name: name.to_string(),
			kind: IndexKind::Sorted,
			unique: false,
			eager: false,
			max_bucket_size: 1000,
			partition_scheme: PartitionSchemeKind::DateTime { bin: DateTimeBin::Year },
			interface_type: interface.to_string(),
		}
	}

	#[test]
	fn builds_and_groups_by_interface() {
		let defs = vec![
			IndexDescriptorDef {
				state_type_name: "OrderState",
				descriptor: descriptor("_ProcessId", true, true, "Orders.IOrderGrain"),
			},
			IndexDescriptorDef {
				state_type_name: "OrderState",
				descriptor: sorted_descriptor("_StartedOn", "Orders.IOrderGrain"),
			},
		];
		let registry = IndexRegistry::from_defs(defs, &IndexingSystemConfig::default()).unwrap();
		assert_eq!(registry.descriptors_for_interface("Orders.IOrderGrain").len(), 2);
		assert!(registry.descriptor("Orders.IOrderGrain", "_ProcessId").is_some());
	}

	#[test]
	fn rejects_duplicate_index_name_within_a_state_class() {
		let defs = vec![
			IndexDescriptorDef {
				state_type_name: "OrderState",
				descriptor: descriptor("_ProcessId", true, true, "Orders.IOrderGrain"),
			},
			IndexDescriptorDef {
				state_type_name: "OrderState",
				descriptor: descriptor("_ProcessId", false, true, "Orders.IOrderGrain"),
			},
		];
		let err = IndexRegistry::from_defs(defs, &IndexingSystemConfig::default()).unwrap_err();
		assert!(matches!(err, RegistryBuildError::DuplicateIndexName { .. }));
	}

	#[test]
	fn rejects_mixed_eagerness_within_a_state_class() {
		let defs = vec![
			IndexDescriptorDef {
				state_type_name: "OrderState",
				descriptor: descriptor("_ProcessId", true, true, "Orders.IOrderGrain"),
			},
			IndexDescriptorDef {
				state_type_name: "OrderState",
				descriptor: descriptor("_Status", false, false, "Orders.IOrderGrain"),
			},
		];
		let err = IndexRegistry::from_defs(defs, &IndexingSystemConfig::default()).unwrap_err();
		assert!(matches!(err, RegistryBuildError::MixedEagerness { .. }));
	}

	#[test]
	fn rejects_two_state_classes_on_one_interface() {
		let defs = vec![
			IndexDescriptorDef {
				state_type_name: "OrderState",
				descriptor: descriptor("_ProcessId", true, true, "Orders.IOrderGrain"),
			},
			IndexDescriptorDef {
				state_type_name: "ShadowOrderState",
				descriptor: descriptor("_ShadowId", true, true, "Orders.IOrderGrain"),
			},
		];
		let err = IndexRegistry::from_defs(defs, &IndexingSystemConfig::default()).unwrap_err();
		assert!(matches!(err, RegistryBuildError::MultipleStateTypesForInterface { .. }));
	}

	#[test]
	fn rejects_parallelism_above_the_hard_cap() {
		let mut config = IndexingSystemConfig::default();
		config.index_update_parallelism = MAX_PARALLELISM + 1;
		let err = IndexRegistry::from_defs(Vec::new(), &config).unwrap_err();
		assert!(matches!(err, RegistryBuildError::ParallelismExceeded { .. }));
	}
}

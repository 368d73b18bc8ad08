use vindex_config::IndexingSystemConfig;
use vindex_types::IndexDescriptor;

use crate::def::IndexDescriptorDef;
use crate::error::RegistryBuildError;
use crate::registry::IndexRegistry;

/// Programmatic alternative to `register_index_descriptor!` +
/// [`IndexRegistry::build`], for callers who assemble descriptors in code
/// rather than through inventory discovery — the "equivalent builder API"
/// `spec.md` §9 calls for when annotation scanning isn't available.
///
/// ```
/// use vindex_config::IndexingSystemConfig;
/// use vindex_registry::IndexRegistryBuilder;
/// use vindex_types::{IndexDescriptor, IndexKind, PartitionSchemeKind};
///
/// let registry = IndexRegistryBuilder::new()
///     .register("OrderState", IndexDescriptor {
///         name: "_ProcessId".to_string(),
///         kind: IndexKind::Hash,
///         unique: true,
///         eager: true,
///         max_bucket_size: 10_000,
///         partition_scheme: PartitionSchemeKind::Hash { partitions: 16 },
///         interface_type: "Orders.IOrderGrain".to_string(),
///     })
///     .build(&IndexingSystemConfig::default())
///     .unwrap();
/// assert!(registry.descriptor("Orders.IOrderGrain", "_ProcessId").is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexRegistryBuilder {
	defs: Vec<IndexDescriptorDef>,
}

impl IndexRegistryBuilder {
	/// An empty builder.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers one index descriptor against `state_type_name`.
	pub fn register(mut self, state_type_name: &'static str, descriptor: IndexDescriptor) -> Self {
		self.defs.push(IndexDescriptorDef { state_type_name, descriptor });
		self
	}

	/// Validates and assembles the registered descriptors into an
	/// [`IndexRegistry`], applying the same checks `spec.md` §4.7 requires
	/// of inventory-discovered descriptors.
	pub fn build(self, config: &IndexingSystemConfig) -> Result<IndexRegistry, RegistryBuildError> {
		IndexRegistry::from_defs(self.defs, config)
	}
}

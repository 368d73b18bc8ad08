use vindex_types::IndexDescriptor;

/// A single index's declaration, as produced either by the
/// `register_index_descriptor!` macro (the annotation-discovery substitute,
/// `spec.md` §4.7 / §9) or by [`crate::builder::IndexRegistryBuilder`]
/// directly.
///
/// Carries the indexed-state type's name alongside the descriptor itself so
/// [`crate::registry::IndexRegistry::build`] can enforce the two
/// within-a-class invariants `spec.md` §3/§4.7 name: no duplicate index name
/// within one state class, and consistent eagerness across a state class's
/// indexes. The property-reader closure `spec.md` §9 describes is not part
/// of this value — it lives on the state type's
/// `vindex_controller::IndexedState` implementation, which is typed per `T`
/// and so cannot be stored in a type-erased `inventory` collection.
#[derive(Debug, Clone)]
pub struct IndexDescriptorDef {
	/// Name of the indexed-state class this index is declared on (e.g. a
	/// struct name). Distinct from `descriptor.interface_type`: several
	/// state classes must never share one grain interface (`spec.md` §4.7
	/// "verify each indexable grain interface has exactly one indexed-state
	/// type"), but a single state class's descriptors all repeat the same
	/// interface.
	pub state_type_name: &'static str,
	/// The index this declaration describes.
	pub descriptor: IndexDescriptor,
}

inventory::collect!(IndexDescriptorDef);

/// Declares one index descriptor for inventory-based discovery, the
/// substitute for reflective annotation scanning (`spec.md` §9: "if
/// annotation scanning is not available, expose an equivalent builder
/// API" — this macro is the annotation-like half of that equivalence, the
/// builder is the other half).
///
/// ```ignore
/// register_index_descriptor!(
///     "OrderState",
///     IndexDescriptor {
///         name: "_ProcessId".to_string(),
///         kind: IndexKind::Hash,
///         unique: true,
///         eager: true,
///         max_bucket_size: 10_000,
///         partition_scheme: PartitionSchemeKind::Hash { partitions: 16 },
///         interface_type: "Orders.IOrderGrain".to_string(),
///     }
/// );
/// ```
#[macro_export]
macro_rules! register_index_descriptor {
	($state_type_name:expr, $descriptor:expr) => {
		$crate::inventory::submit! {
			$crate::IndexDescriptorDef {
				state_type_name: $state_type_name,
				descriptor: $descriptor,
			}
		}
	};
}

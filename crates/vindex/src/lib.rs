//! Distributed secondary-indexing core.
//!
//! # Public API surface
//!
//! * [`IndexingRuntime`] — the composition root: wires a built
//!   [`vindex_registry::IndexRegistry`], a validated
//!   [`vindex_config::IndexingSystemConfig`], and a
//!   [`vindex_storage::StorageBridge`] into one [`vindex_client::IndexClient`]
//!   per registered index and one [`vindex_queue::QueueHandle`] per grain
//!   interface, then activates per-grain
//!   [`vindex_controller::IndexedStateController`]s against them.
//! * Component crates ([`vindex_types`], [`vindex_partition`],
//!   [`vindex_bucket`], [`vindex_client`], [`vindex_queue`],
//!   [`vindex_controller`], [`vindex_registry`], [`vindex_storage`],
//!   [`vindex_config`]) remain independently usable; this crate only adds
//!   the glue a host needs to avoid hand-wiring them itself.
//!
//! # Seam contract
//!
//! The actor runtime (grain activation lifecycle, message dispatch,
//! persistence backend selection, timers, grain identity), configuration
//! *binding* (reading the validated [`vindex_config::IndexingSystemConfig`]
//! out of a file or environment), reflective annotation scanning, and the
//! thin query-accessor façade a host exposes to application code all remain
//! external collaborators (`spec.md` §1) — this crate stops at the seam
//! each of those sits behind ([`vindex_storage::StorageBridge`],
//! [`vindex_registry::IndexRegistryBuilder`],
//! [`vindex_controller::IndexedState`]).

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;
use vindex_client::IndexClient;
use vindex_config::IndexingSystemConfig;
use vindex_controller::{DurableActiveActionIds, IndexedState, IndexedStateController};
use vindex_queue::{GrainActiveActions, QueueHandle, QueueRuntimeConfig};
use vindex_registry::IndexRegistry;
use vindex_storage::StorageBridge;
use vindex_types::{GrainRef, IndexingError};

pub use vindex_bucket as bucket;
pub use vindex_client as client;
pub use vindex_config as config;
pub use vindex_controller as controller;
pub use vindex_fanout as fanout;
pub use vindex_partition as partition;
pub use vindex_queue as queue;
pub use vindex_registry as registry;
pub use vindex_storage as storage;
pub use vindex_types as types;

/// The running assembly of every component a grain interface needs to
/// participate in secondary indexing: one [`IndexClient`] per registered
/// index and one [`QueueHandle`] per interface, built once from an
/// [`IndexRegistry`] and shared thereafter (`spec.md` §2 data-flow summary).
pub struct IndexingRuntime {
	storage: Arc<dyn StorageBridge>,
	enqueue_parallelism: usize,
	clients_by_interface: HashMap<String, Vec<IndexClient>>,
	queues_by_interface: HashMap<String, QueueHandle>,
	cancel: CancellationToken,
}

impl IndexingRuntime {
	/// Validates `config`, then spawns one queue actor per grain interface
	/// named in `registry` and builds the index clients that interface's
	/// descriptors require.
	pub async fn start(
		registry: &IndexRegistry,
		config: &IndexingSystemConfig,
		storage: Arc<dyn StorageBridge>,
	) -> Result<Self, IndexingError> {
		config.validate().map_err(|err| IndexingError::InvalidUpdate { reason: err.to_string() })?;

		let cancel = CancellationToken::new();
		let mut clients_by_interface = HashMap::new();
		let mut queues_by_interface = HashMap::new();

		for interface in registry.interfaces() {
			let clients: Vec<IndexClient> = registry
				.descriptors_for_interface(interface)
				.iter()
				.map(|descriptor| IndexClient::new(descriptor.clone(), storage.clone()))
				.collect();

			let grains: Arc<dyn GrainActiveActions> = Arc::new(DurableActiveActionIds::new(storage.clone()));
			let queue_config = QueueRuntimeConfig {
				index_update_parallelism: config.index_update_parallelism as usize,
				output_buffer_size: config.indexing_queue_output_buffer_size as usize,
				output_buffer_timeout: config.indexing_queue_output_buffer_timeout,
			};
			let queue = QueueHandle::start(
				interface,
				clients.clone(),
				storage.clone(),
				grains,
				queue_config,
				cancel.clone(),
			)
			.await;

			info!(interface, index_count = clients.len(), "started indexing queue for grain interface");
			clients_by_interface.insert(interface.to_string(), clients);
			queues_by_interface.insert(interface.to_string(), queue);
		}

		Ok(Self {
			storage,
			enqueue_parallelism: config.enqueue_parallelism as usize,
			clients_by_interface,
			queues_by_interface,
			cancel,
		})
	}

	/// The index clients registered for `interface`, if any.
	pub fn clients_for(&self, interface: &str) -> &[IndexClient] {
		self.clients_by_interface.get(interface).map(Vec::as_slice).unwrap_or(&[])
	}

	/// The queue actor handle serving `interface`, if one was started.
	pub fn queue_for(&self, interface: &str) -> Option<&QueueHandle> {
		self.queues_by_interface.get(interface)
	}

	/// Activates a grain's [`IndexedStateController`] against this
	/// runtime's clients and queue for its interface, running the
	/// recovery-on-activation procedure (`spec.md` §4.5).
	pub async fn activate_controller<T>(
		&self,
		grain: GrainRef,
		default_user_state: T,
	) -> Result<IndexedStateController<T>, IndexingError>
	where
		T: IndexedState + Clone + serde::Serialize + serde::de::DeserializeOwned,
	{
		let clients = self.clients_for(&grain.interface_type).to_vec();
		let mut queues = HashMap::new();
		if let Some(queue) = self.queue_for(&grain.interface_type) {
			queues.insert(grain.interface_type.clone(), queue.clone());
		}
		IndexedStateController::activate(
			grain,
			default_user_state,
			clients,
			queues,
			self.storage.clone(),
			self.enqueue_parallelism,
		)
		.await
	}

	/// Signals every queue actor to stop draining at its next batch
	/// boundary (`spec.md` §5: "on activation shutdown the processor halts
	/// at the next batch boundary").
	pub fn shutdown(&self) {
		self.cancel.cancel();
	}
}

#[cfg(test)]
mod tests {
	use serde::{Deserialize, Serialize};
	use vindex_registry::IndexRegistryBuilder;
	use vindex_storage::MemoryStorageBridge;
	use vindex_types::{IndexDescriptor, IndexKey, IndexKind, PartitionSchemeKind};

	use super::*;

	const INTERFACE: &str = "Orders.IOrderGrain";

	#[derive(Debug, Clone, Default, Serialize, Deserialize)]
	struct OrderState {
		process_id: Option<String>,
	}

	impl IndexedState for OrderState {
		fn indexed_properties(&self) -> Vec<(String, Option<IndexKey>)> {
			vec![("_ProcessId".to_string(), self.process_id.clone().map(IndexKey::Str))]
		}
	}

	fn registry() -> IndexRegistry {
		IndexRegistryBuilder::new()
			.register(
				"OrderState",
				IndexDescriptor {
					name: "_ProcessId".to_string(),
					kind: IndexKind::Hash,
					unique: true,
					eager: true,
					max_bucket_size: 1000,
					partition_scheme: PartitionSchemeKind::Hash { partitions: 4 },
					interface_type: INTERFACE.to_string(),
				},
			)
			.build(&IndexingSystemConfig::default())
			.unwrap()
	}

	#[tokio::test]
	async fn two_grains_racing_for_a_unique_key_resolve_as_spec_scenario_one_describes() {
		let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
		let runtime = IndexingRuntime::start(&registry(), &IndexingSystemConfig::default(), storage)
			.await
			.unwrap();

		let mut g1 = runtime
			.activate_controller(GrainRef::new(INTERFACE, "g1"), OrderState::default())
			.await
			.unwrap();
		g1.perform_update(|s| s.process_id = Some("P1".to_string())).await.unwrap();

		let mut g2 = runtime
			.activate_controller(GrainRef::new(INTERFACE, "g2"), OrderState::default())
			.await
			.unwrap();
		let err = g2.perform_update(|s| s.process_id = Some("P1".to_string())).await.unwrap_err();
		assert!(matches!(err, IndexingError::UniquenessViolation { .. }));
		assert_eq!(g1.user_state().process_id.as_deref(), Some("P1"));
		assert_eq!(g2.user_state().process_id, None);

		runtime.shutdown();
	}
}

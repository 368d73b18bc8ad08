use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use vindex::controller::IndexedState;
use vindex::registry::IndexRegistryBuilder;
use vindex::types::{DateTimeBin, GrainRef, IndexDescriptor, IndexKey, IndexKind, IndexingError, PartitionSchemeKind};
use vindex::IndexingRuntime;
use vindex::config::IndexingSystemConfig;
use vindex_storage::{MemoryStorageBridge, StorageBridge};

const ORDER_INTERFACE: &str = "Orders.IOrderGrain";
const SHIPMENT_INTERFACE: &str = "Shipping.IShipmentGrain";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OrderState {
	process_id: Option<String>,
}

impl IndexedState for OrderState {
	fn indexed_properties(&self) -> Vec<(String, Option<IndexKey>)> {
		vec![("_ProcessId".to_string(), self.process_id.clone().map(IndexKey::Str))]
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ShipmentState {
	shipped_on: Option<i64>,
}

impl IndexedState for ShipmentState {
	fn indexed_properties(&self) -> Vec<(String, Option<IndexKey>)> {
		vec![("_ShippedOn".to_string(), self.shipped_on.map(IndexKey::DateTimeUtcMillis))]
	}
}

/// `spec.md` §8 scenario 1: two grains race to claim the same unique key.
/// The second committer observes `UniquenessViolation` and keeps its prior
/// state; the first keeps the key.
pub async fn unique_race() {
	println!("\n=== unique index race ===");

	let descriptor = IndexDescriptor {
		name: "_ProcessId".to_string(),
		kind: IndexKind::Hash,
		unique: true,
		eager: true,
		max_bucket_size: 1000,
		partition_scheme: PartitionSchemeKind::Hash { partitions: 8 },
		interface_type: ORDER_INTERFACE.to_string(),
	};
	let registry = IndexRegistryBuilder::new()
		.register("OrderState", descriptor)
		.build(&IndexingSystemConfig::default())
		.expect("registry build");

	let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
	let runtime = IndexingRuntime::start(&registry, &IndexingSystemConfig::default(), storage)
		.await
		.expect("runtime start");

	let mut first = runtime
		.activate_controller(GrainRef::new(ORDER_INTERFACE, "order-1"), OrderState::default())
		.await
		.expect("activate order-1");
	first
		.perform_update(|s| s.process_id = Some("PO-42".to_string()))
		.await
		.expect("order-1 claims PO-42");
	println!("order-1 claimed PO-42: {:?}", first.user_state());

	let mut second = runtime
		.activate_controller(GrainRef::new(ORDER_INTERFACE, "order-2"), OrderState::default())
		.await
		.expect("activate order-2");
	match second.perform_update(|s| s.process_id = Some("PO-42".to_string())).await {
		Err(IndexingError::UniquenessViolation { index, key, holder }) => {
			info!(index, key, holder, "order-2 lost the race as expected");
			println!("order-2 rejected: {key} on index '{index}' is already held by {holder}");
		}
		other => panic!("expected a uniqueness violation, got {other:?}"),
	}
	println!("order-2 state after rejection: {:?}", second.user_state());

	runtime.shutdown();
}

/// `spec.md` §8 scenario 4: a sorted index partitioned by year is queried
/// by range, traversing partitions in order and honoring the router's
/// stop/continue contract.
pub async fn sorted_range() {
	println!("\n=== sorted range query across date-time partitions ===");

	let descriptor = IndexDescriptor {
		name: "_ShippedOn".to_string(),
		kind: IndexKind::Sorted,
		unique: false,
		eager: false,
		max_bucket_size: 1000,
		partition_scheme: PartitionSchemeKind::DateTime { bin: DateTimeBin::Year },
		interface_type: SHIPMENT_INTERFACE.to_string(),
	};
	let registry = IndexRegistryBuilder::new()
		.register("ShipmentState", descriptor)
		.build(&IndexingSystemConfig::default())
		.expect("registry build");

	let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
	let runtime = IndexingRuntime::start(&registry, &IndexingSystemConfig::default(), storage)
		.await
		.expect("runtime start");

	let shipments = [
		("shipment-2023", millis(2023, 6, 1)),
		("shipment-2024-a", millis(2024, 2, 15)),
		("shipment-2024-b", millis(2024, 11, 3)),
		("shipment-2025", millis(2025, 1, 9)),
	];
	for (id, shipped_on) in shipments {
		let mut controller = runtime
			.activate_controller(GrainRef::new(SHIPMENT_INTERFACE, id), ShipmentState::default())
			.await
			.expect("activate shipment grain");
		controller
			.perform_update(|s| s.shipped_on = Some(shipped_on))
			.await
			.expect("shipment commit");
	}

	let client = runtime
		.clients_for(SHIPMENT_INTERFACE)
		.first()
		.expect("shipment index registered")
		.clone();
	let page = client
		.lookup_range(&IndexKey::DateTimeUtcMillis(millis(2024, 1, 1)), &IndexKey::DateTimeUtcMillis(millis(2024, 12, 31)), 0, 10)
		.await
		.expect("range query");

	println!("shipments shipped during 2024: {} grain(s)", page.len());
	for grain in &page {
		println!("  {}", grain.primary_key);
	}
	assert_eq!(page.len(), 2, "only the two 2024 shipments should fall in range");

	runtime.shutdown();
}

fn millis(year: i32, month: u32, day: u32) -> i64 {
	Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap().timestamp_millis()
}

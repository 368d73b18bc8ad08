use std::sync::Arc;

use tracing::debug;
use vindex_bucket::actor::{BucketDirectory, InMemoryBucketDirectory};
use vindex_bucket::ApplyContext;
use vindex_partition::{DateTimePartitionScheme, HashPartitionScheme};
use vindex_storage::StorageBridge;
use vindex_types::{
	BucketPrimaryKey, GrainRef, IndexDescriptor, IndexKey, IndexKind, IndexedPropertyUpdate,
	IndexingError, PartitionSchemeKind, RangeOverlap, UpdateOp,
};

/// Routes lookups and updates for one registered index to the bucket
/// actors that partition it (`spec.md` §4.4, component C4).
///
/// One client per [`IndexDescriptor`]: it owns the [`BucketDirectory`] that
/// spawns and tracks that index's bucket actors, but the client itself
/// carries no mutable state — every call recomputes the target
/// partition(s) from the descriptor and the key(s) in hand.
#[derive(Clone)]
pub struct IndexClient {
	descriptor: IndexDescriptor,
	directory: Arc<dyn BucketDirectory>,
}

impl IndexClient {
	/// Builds a client for `descriptor`, spawning bucket actors of its kind
	/// against `storage` on demand.
	pub fn new(descriptor: IndexDescriptor, storage: Arc<dyn StorageBridge>) -> Self {
		let ctx = ApplyContext {
			index_name: descriptor.name.clone(),
			unique: descriptor.unique,
			max_bucket_size: descriptor.max_bucket_size,
			chaining_enabled: true,
		};
		let directory = Arc::new(InMemoryBucketDirectory::new(storage, descriptor.kind, ctx));
		Self { descriptor, directory }
	}

	/// Builds a client over a directory supplied by the caller (tests, or a
	/// host that wants bucket actors shared across more than one client).
	pub fn with_directory(descriptor: IndexDescriptor, directory: Arc<dyn BucketDirectory>) -> Self {
		Self { descriptor, directory }
	}

	/// The descriptor this client routes for.
	pub fn descriptor(&self) -> &IndexDescriptor {
		&self.descriptor
	}

	/// A page of grains under `key` (`spec.md` §4.4: "for hash: `update`
	/// dispatches to the single bucket derived from the key(s)" — the
	/// analogous statement holds for lookups).
	pub async fn lookup_by_key(
		&self,
		key: &IndexKey,
		offset: i64,
		size: i64,
	) -> Result<Vec<GrainRef>, IndexingError> {
		let pk = self.bucket_pk(&self.partition_of(key)?);
		let handle = self.directory.get_or_create(&pk).await;
		handle.get_page(key.clone(), offset, size).await
	}

	/// A page of grains across `[start, end]` inclusive, traversing
	/// partitions in ascending order and stopping per the router contract
	/// in `spec.md` §4.3.
	pub async fn lookup_range(
		&self,
		start: &IndexKey,
		end: &IndexKey,
		offset: i64,
		size: i64,
	) -> Result<Vec<GrainRef>, IndexingError> {
		if self.descriptor.kind != IndexKind::Sorted {
			return Err(invalid("lookup_range is only valid on a Sorted index"));
		}
		let (offset, size) = validate_page(offset, size)?;
		let limit = offset.saturating_add(size);
		let bins = self.bins_in_range(start, end)?;

		let mut collected = Vec::new();
		for bin in bins {
			if collected.len() >= limit {
				break;
			}
			let pk = self.bucket_pk(&bin);
			let handle = self.directory.get_or_create(&pk).await;
			let overlap = handle.range_overlap(start.clone(), end.clone()).await?;
			debug!(index = %self.descriptor.name, bin = %bin, ?overlap, "partition range overlap");
			match overlap {
				RangeOverlap::GreaterThan => continue,
				RangeOverlap::LessThan => break,
				_ => {}
			}
			let remaining = (limit - collected.len()) as i64;
			let page = handle.lookup_range(start.clone(), end.clone(), 0, remaining).await?;
			collected.extend(page);
			if overlap.is_terminal() {
				break;
			}
		}
		Ok(collected.into_iter().skip(offset).take(size).collect())
	}

	/// Applies one indexed-property update for `grain`, decomposing an
	/// `Update` that crosses partitions into a parallel delete/insert pair
	/// (`spec.md` §4.4, §8 scenario 6).
	pub async fn update(&self, grain: GrainRef, update: IndexedPropertyUpdate) -> Result<(), IndexingError> {
		match update.op() {
			UpdateOp::None => Ok(()),
			UpdateOp::Insert | UpdateOp::Delete => {
				let key = update.after().or(update.before()).expect("checked by op()");
				let pk = self.bucket_pk(&self.partition_of(key)?);
				let handle = self.directory.get_or_create(&pk).await;
				handle.update(grain, update).await.map(|_| ())
			}
			UpdateOp::Update => {
				let before = update.before().expect("Update carries a before value");
				let after = update.after().expect("Update carries an after value");
				let before_partition = self.partition_of(before)?;
				let after_partition = self.partition_of(after)?;
				if before_partition == after_partition {
					let pk = self.bucket_pk(&before_partition);
					let handle = self.directory.get_or_create(&pk).await;
					return handle.update(grain, update).await.map(|_| ());
				}

				debug!(
					index = %self.descriptor.name,
					%before_partition,
					%after_partition,
					"update crosses partitions, decomposing into delete + insert"
				);
				let delete = IndexedPropertyUpdate::make(Some(before.clone()), None, update.visibility);
				let insert = IndexedPropertyUpdate::make(None, Some(after.clone()), update.visibility);
				let before_pk = self.bucket_pk(&before_partition);
				let after_pk = self.bucket_pk(&after_partition);
				let before_handle = self.directory.get_or_create(&before_pk).await;
				let after_handle = self.directory.get_or_create(&after_pk).await;

				let delete_grain = grain.clone();
				let (delete_result, insert_result) = tokio::join!(
					before_handle.update(delete_grain, delete),
					after_handle.update(grain, insert),
				);
				delete_result?;
				insert_result?;
				Ok(())
			}
		}
	}

	fn partition_of(&self, key: &IndexKey) -> Result<String, IndexingError> {
		Ok(match &self.descriptor.partition_scheme {
			PartitionSchemeKind::Hash { partitions } => HashPartitionScheme::new(*partitions).partition(key),
			PartitionSchemeKind::DateTime { bin } => match key {
				IndexKey::DateTimeUtcMillis(millis) => DateTimePartitionScheme::new(*bin).partition(*millis),
				_ => return Err(invalid("DateTime partition scheme requires a DateTimeUtcMillis key")),
			},
			PartitionSchemeKind::SingleNode => "0".to_string(),
		})
	}

	fn bins_in_range(&self, start: &IndexKey, end: &IndexKey) -> Result<Vec<String>, IndexingError> {
		match &self.descriptor.partition_scheme {
			PartitionSchemeKind::DateTime { bin } => match (start, end) {
				(IndexKey::DateTimeUtcMillis(s), IndexKey::DateTimeUtcMillis(e)) => {
					Ok(DateTimePartitionScheme::new(*bin).partitions_in_range(*s, *e))
				}
				_ => Err(invalid("DateTime partition scheme requires DateTimeUtcMillis bounds")),
			},
			// A sorted index with no date-time binning routes its whole
			// range to the single partition every key maps to.
			_ => Ok(vec!["0".to_string()]),
		}
	}

	fn bucket_pk(&self, partition: &str) -> BucketPrimaryKey {
		BucketPrimaryKey::first(&self.descriptor.interface_type, self.property_name(), partition)
	}

	fn property_name(&self) -> &str {
		self.descriptor.name.strip_prefix('_').unwrap_or(&self.descriptor.name)
	}
}

fn invalid(reason: &str) -> IndexingError {
	IndexingError::InvalidUpdate { reason: reason.to_string() }
}

fn validate_page(offset: i64, size: i64) -> Result<(usize, usize), IndexingError> {
	if offset < 0 {
		return Err(invalid("page offset must not be negative"));
	}
	if size < 0 {
		return Err(invalid("page size must not be negative"));
	}
	Ok((offset as usize, size as usize))
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use vindex_storage::MemoryStorageBridge;
	use vindex_types::{IndexKind, PartitionSchemeKind, UpdateVisibility};

	use super::*;

	fn hash_descriptor(unique: bool, partitions: u32) -> IndexDescriptor {
		IndexDescriptor {
			name: "_ProcessId".to_string(),
			kind: IndexKind::Hash,
			unique,
			eager: unique,
			max_bucket_size: 1000,
			partition_scheme: PartitionSchemeKind::Hash { partitions },
			interface_type: "Orders.IOrderGrain".to_string(),
		}
	}

	fn sorted_descriptor() -> IndexDescriptor {
		IndexDescriptor {
			name: "_StartedOn".to_string(),
			kind: IndexKind::Sorted,
			unique: false,
			eager: false,
			max_bucket_size: 1000,
			partition_scheme: PartitionSchemeKind::DateTime { bin: vindex_types::DateTimeBin::Year },
			interface_type: "Orders.IOrderGrain".to_string(),
		}
	}

	fn grain(pk: &str) -> GrainRef {
		GrainRef::new("Orders.IOrderGrain", pk)
	}

	fn insert(key: &str) -> IndexedPropertyUpdate {
		IndexedPropertyUpdate::make(None, Some(IndexKey::Str(key.into())), UpdateVisibility::NonTentative)
	}

	#[tokio::test]
	async fn insert_then_lookup_round_trips() {
		let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
		let client = IndexClient::new(hash_descriptor(false, 4), storage);
		client.update(grain("g1"), insert("P1")).await.unwrap();
		let hits = client.lookup_by_key(&IndexKey::Str("P1".into()), 0, 10).await.unwrap();
		assert_eq!(hits, vec![grain("g1")]);
	}

	#[tokio::test]
	async fn second_unique_insert_is_rejected() {
		let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
		let client = IndexClient::new(hash_descriptor(true, 4), storage);
		client.update(grain("g1"), insert("P1")).await.unwrap();
		let err = client.update(grain("g2"), insert("P1")).await.unwrap_err();
		assert!(matches!(err, IndexingError::UniquenessViolation { .. }));
	}

	#[tokio::test]
	async fn update_within_same_partition_moves_the_key() {
		let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
		// One partition only, so before/after always collide.
		let client = IndexClient::new(hash_descriptor(false, 1), storage);
		client.update(grain("g1"), insert("A")).await.unwrap();
		let upd = IndexedPropertyUpdate::make(
			Some(IndexKey::Str("A".into())),
			Some(IndexKey::Str("B".into())),
			UpdateVisibility::NonTentative,
		);
		client.update(grain("g1"), upd).await.unwrap();
		assert!(client.lookup_by_key(&IndexKey::Str("A".into()), 0, 10).await.unwrap().is_empty());
		assert_eq!(
			client.lookup_by_key(&IndexKey::Str("B".into()), 0, 10).await.unwrap(),
			vec![grain("g1")]
		);
	}

	#[tokio::test]
	async fn cross_partition_update_lands_in_both_buckets_correctly() {
		let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
		let client = IndexClient::new(hash_descriptor(false, 4), storage);
		client.update(grain("g1"), insert("A")).await.unwrap();
		let upd = IndexedPropertyUpdate::make(
			Some(IndexKey::Str("A".into())),
			Some(IndexKey::Str("totally-different-key")),
			UpdateVisibility::NonTentative,
		);
		client.update(grain("g1"), upd).await.unwrap();
		assert!(client.lookup_by_key(&IndexKey::Str("A".into()), 0, 10).await.unwrap().is_empty());
		assert_eq!(
			client
				.lookup_by_key(&IndexKey::Str("totally-different-key".into()), 0, 10)
				.await
				.unwrap(),
			vec![grain("g1")]
		);
	}

	#[tokio::test]
	async fn sorted_range_traverses_partitions_in_order() {
		let storage: Arc<dyn StorageBridge> = Arc::new(MemoryStorageBridge::new());
		let client = IndexClient::new(sorted_descriptor(), storage);
		let years = [
			("2021-06-01T00:00:00Z", 1623110400000i64),
			("2022-06-01T00:00:00Z", 1654041600000i64),
			("2023-06-01T00:00:00Z", 1685577600000i64),
		];
		for (_, millis) in years {
			let upd = IndexedPropertyUpdate::make(
				None,
				Some(IndexKey::DateTimeUtcMillis(millis)),
				UpdateVisibility::NonTentative,
			);
			client.update(grain("g1"), upd).await.unwrap();
		}
		let hits = client
			.lookup_range(
				&IndexKey::DateTimeUtcMillis(years[0].1),
				&IndexKey::DateTimeUtcMillis(years[2].1),
				0,
				10,
			)
			.await
			.unwrap();
		assert_eq!(hits.len(), 3);
	}
}

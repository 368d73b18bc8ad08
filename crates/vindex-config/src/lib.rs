//! Configuration for the secondary-indexing subsystem (`spec.md` §6).
//!
//! This crate defines and validates [`IndexingSystemConfig`]; binding it
//! from a config file, environment variables, or a DI container is left to
//! the host application, the same way `evildoer-config`'s `options.rs`
//! separates "shape and validation" from "where the bytes come from".

mod error;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{ConfigError, Result};

/// Default bin granularity for date-time partition schemes that don't name
/// one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateTimePartitionBin {
	/// One partition per calendar year.
	Year,
	/// One partition per calendar month.
	Month,
}

impl Default for DateTimePartitionBin {
	fn default() -> Self {
		Self::Year
	}
}

/// Root configuration section (`IndexingSystem` in `spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSystemConfig {
	/// Number of partitions a hash index without an explicit scheme uses;
	/// `0` means one partition per distinct key.
	pub default_max_hash_index_partitions: u32,
	/// Default bin granularity for date-time sorted schemes.
	pub default_date_time_partition_bin: DateTimePartitionBin,
	/// Name of the storage provider backing indexing-queue persistence.
	pub indexing_queue_storage_provider_name: String,
	/// Cap on in-flight index updates applied in parallel by the queue
	/// processor (`spec.md` §4.6 step 4, §5).
	pub index_update_parallelism: u32,
	/// Capacity of the in-memory channel feeding the queue processor
	/// (`spec.md` §4.6 step 1).
	pub indexing_queue_input_buffer_size: u32,
	/// Number of actions that completes a batch by count
	/// (`spec.md` §4.6 step 1).
	pub indexing_queue_output_buffer_size: u32,
	/// Elapsed time that completes a batch regardless of count.
	#[serde(with = "duration_millis")]
	pub indexing_queue_output_buffer_timeout: Duration,
	/// Cap applied to every bounded-parallelism fan-out in the system
	/// (enqueue, tentative apply, sorted-range dispatch). Exceeding it is a
	/// configuration error, not silently relaxed (`spec.md` §5).
	pub enqueue_parallelism: u32,
}

impl Default for IndexingSystemConfig {
	fn default() -> Self {
		Self {
			default_max_hash_index_partitions: 0,
			default_date_time_partition_bin: DateTimePartitionBin::default(),
			indexing_queue_storage_provider_name: "default".to_string(),
			index_update_parallelism: 10,
			indexing_queue_input_buffer_size: 10,
			indexing_queue_output_buffer_size: 10,
			indexing_queue_output_buffer_timeout: Duration::from_millis(100),
			enqueue_parallelism: 10,
		}
	}
}

impl IndexingSystemConfig {
	/// Checks the struct is internally consistent. Does not touch any I/O.
	pub fn validate(&self) -> Result<()> {
		if self.index_update_parallelism == 0 {
			return Err(ConfigError::ZeroParallelism {
				field: "IndexUpdateParallelism",
			});
		}
		if self.indexing_queue_input_buffer_size == 0 {
			return Err(ConfigError::ZeroParallelism {
				field: "IndexingQueueInputBufferSize",
			});
		}
		if self.indexing_queue_output_buffer_size == 0 {
			return Err(ConfigError::ZeroParallelism {
				field: "IndexingQueueOutputBufferSize",
			});
		}
		if self.enqueue_parallelism == 0 {
			return Err(ConfigError::ZeroParallelism {
				field: "EnqueueParallelism",
			});
		}
		if self.indexing_queue_output_buffer_timeout.is_zero() {
			return Err(ConfigError::ZeroBatchTimeout);
		}
		if self.indexing_queue_storage_provider_name.trim().is_empty() {
			return Err(ConfigError::EmptyStorageProviderName);
		}
		Ok(())
	}
}

mod duration_millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
		s.serialize_u64(d.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
		let millis = u64::deserialize(d)?;
		Ok(Duration::from_millis(millis))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_spec_documented_values() {
		let cfg = IndexingSystemConfig::default();
		assert_eq!(cfg.index_update_parallelism, 10);
		assert_eq!(cfg.indexing_queue_input_buffer_size, 10);
		assert_eq!(cfg.indexing_queue_output_buffer_size, 10);
		assert_eq!(
			cfg.indexing_queue_output_buffer_timeout,
			Duration::from_millis(100)
		);
		assert!(cfg.validate().is_ok());
	}

	#[test]
	fn zero_parallelism_is_rejected() {
		let mut cfg = IndexingSystemConfig::default();
		cfg.index_update_parallelism = 0;
		assert_eq!(
			cfg.validate(),
			Err(ConfigError::ZeroParallelism {
				field: "IndexUpdateParallelism"
			})
		);
	}

	#[test]
	fn zero_timeout_is_rejected() {
		let mut cfg = IndexingSystemConfig::default();
		cfg.indexing_queue_output_buffer_timeout = Duration::ZERO;
		assert_eq!(cfg.validate(), Err(ConfigError::ZeroBatchTimeout));
	}

	#[test]
	fn round_trips_through_json() {
		let cfg = IndexingSystemConfig::default();
		let json = serde_json::to_string(&cfg).unwrap();
		let back: IndexingSystemConfig = serde_json::from_str(&json).unwrap();
		assert_eq!(cfg, back);
	}
}

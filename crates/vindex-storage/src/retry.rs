use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::StorageError;

/// Maximum attempts for a write before the conflict surfaces to the caller
/// (`spec.md` §5: "suggested: up to 10 attempts, linearly increasing
/// delay").
const MAX_ATTEMPTS: u32 = 10;

/// Base delay added per additional attempt.
const BASE_DELAY: Duration = Duration::from_millis(15);

/// Retries `attempt` on [`StorageError::Conflict`] with bounded, linearly
/// increasing backoff; any other error, or a conflict on the final attempt,
/// is returned immediately.
pub async fn with_retry<T, F, Fut>(mut attempt: F) -> Result<T, StorageError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, StorageError>>,
{
	let mut last_err = None;
	for n in 1..=MAX_ATTEMPTS {
		match attempt().await {
			Ok(v) => return Ok(v),
			Err(err) if err.is_conflict() && n < MAX_ATTEMPTS => {
				warn!(attempt = n, "storage conflict, retrying");
				tokio::time::sleep(BASE_DELAY * n).await;
				last_err = Some(err);
			}
			Err(err) => return Err(err),
		}
	}
	// Unreachable unless MAX_ATTEMPTS == 0, kept defensive rather than panicking.
	Err(last_err.unwrap_or(StorageError::Conflict {
		collection: "unknown".to_string(),
		key: "unknown".to_string(),
	}))
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicU32, Ordering};

	use super::*;

	#[tokio::test]
	async fn succeeds_without_retry_on_first_try() {
		let calls = AtomicU32::new(0);
		let result: Result<i32, StorageError> = with_retry(|| async {
			calls.fetch_add(1, Ordering::SeqCst);
			Ok(42)
		})
		.await;
		assert_eq!(result.unwrap(), 42);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn retries_conflicts_and_then_succeeds() {
		let calls = AtomicU32::new(0);
		let result: Result<i32, StorageError> = with_retry(|| async {
			let n = calls.fetch_add(1, Ordering::SeqCst);
			if n < 2 {
				Err(StorageError::Conflict {
					collection: "bucket".into(),
					key: "k".into(),
				})
			} else {
				Ok(7)
			}
		})
		.await;
		assert_eq!(result.unwrap(), 7);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn gives_up_after_max_attempts() {
		let calls = AtomicU32::new(0);
		let result: Result<i32, StorageError> = with_retry(|| async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(StorageError::Conflict {
				collection: "bucket".into(),
				key: "k".into(),
			})
		})
		.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
	}

	#[tokio::test]
	async fn non_conflict_errors_are_not_retried() {
		let calls = AtomicU32::new(0);
		let result: Result<i32, StorageError> = with_retry(|| async {
			calls.fetch_add(1, Ordering::SeqCst);
			Err(StorageError::Io(std::io::Error::other("boom")))
		})
		.await;
		assert!(result.is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}
}

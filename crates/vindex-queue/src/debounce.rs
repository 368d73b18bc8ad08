use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

/// Coalesces concurrent persistence attempts behind one monotonic write id
/// (`spec.md` §4.6 "Debouncing": "writers attach a monotonic write id;
/// under an async mutex the first writer runs the prepare action and the
/// commit; concurrent writers with lower ids are coalesced (their prepare
/// action still runs, but only one commit occurs)").
///
/// The queue processor in this crate runs a single cooperative loop, so in
/// practice only one write is ever in flight at a time; this type is kept
/// general so a host that fans enqueue-triggered persistence out across
/// more than one task still gets the coalescing guarantee.
pub struct Debouncer {
	next_id: AtomicU64,
	committed_id: Mutex<u64>,
}

impl Debouncer {
	/// A debouncer with no committed writes yet.
	pub fn new() -> Self {
		Self {
			next_id: AtomicU64::new(0),
			committed_id: Mutex::new(0),
		}
	}

	/// Issues a fresh, strictly increasing write id for this attempt's
	/// "prepare" phase.
	pub fn issue(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::SeqCst) + 1
	}

	/// Runs `commit` only if `write_id` is still at least as new as the
	/// last committed write once the commit lock is acquired; a writer
	/// whose id has since been superseded by a later `issue()` call returns
	/// `Ok(None)` without running `commit` at all — its prepared bytes were
	/// stale before it reached the front of the queue.
	pub async fn commit_if_latest<F, Fut, T, E>(&self, write_id: u64, commit: F) -> Result<Option<T>, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		let mut committed = self.committed_id.lock().await;
		if write_id < *committed {
			return Ok(None);
		}
		let result = commit().await?;
		*committed = write_id;
		Ok(Some(result))
	}
}

impl Default for Debouncer {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn first_commit_runs_and_records_its_id() {
		let d = Debouncer::new();
		let id = d.issue();
		let ran: Result<Option<i32>, ()> = d.commit_if_latest(id, || async { Ok(42) }).await;
		assert_eq!(ran.unwrap(), Some(42));
	}

	#[tokio::test]
	async fn stale_write_id_is_skipped() {
		let d = Debouncer::new();
		let first = d.issue();
		let second = d.issue();
		// The newer id commits first (simulating a faster concurrent writer).
		d.commit_if_latest(second, || async { Ok::<_, ()>(()) }).await.unwrap();
		// The older attempt, arriving late, is coalesced away.
		let result = d.commit_if_latest(first, || async { Ok::<_, ()>(()) }).await.unwrap();
		assert_eq!(result, None);
	}

	#[tokio::test]
	async fn newer_write_after_older_still_commits() {
		let d = Debouncer::new();
		let first = d.issue();
		let second = d.issue();
		d.commit_if_latest(first, || async { Ok::<_, ()>(()) }).await.unwrap();
		let result = d.commit_if_latest(second, || async { Ok::<_, ()>(()) }).await.unwrap();
		assert!(result.is_some());
	}
}

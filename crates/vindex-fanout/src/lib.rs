//! A bounded-parallel fan-out helper (`spec.md` §5, §9).
//!
//! Every cross-actor fan-out in this workspace — enqueueing an action into
//! each per-interface queue, applying tentative unique updates, dispatching
//! a sorted-range query across partitions — goes through [`bounded_fan_out`]
//! or [`bounded_fan_out_cancellable`] rather than an ad hoc `join_all`, so
//! the parallelism cap named in configuration (`spec.md` §6,
//! `EnqueueParallelism` / `IndexUpdateParallelism`) is actually enforced
//! everywhere instead of silently relaxed.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;

/// Runs `f` over every item in `items` with at most `max_in_flight`
/// concurrently in flight, short-circuiting and returning the first error
/// encountered.
///
/// `max_in_flight` is clamped to at least `1` — a caller passing `0` here is
/// a bug one layer up (`vindex-config`'s `validate()` is where `0` is
/// rejected as a configuration error), not something this helper should
/// silently hang on.
pub async fn bounded_fan_out<T, O, E, F, Fut>(
	items: impl IntoIterator<Item = T>,
	max_in_flight: usize,
	f: F,
) -> Result<Vec<O>, E>
where
	F: Fn(T) -> Fut,
	Fut: Future<Output = Result<O, E>>,
{
	stream::iter(items)
		.map(f)
		.buffer_unordered(max_in_flight.max(1))
		.try_collect()
		.await
}

/// As [`bounded_fan_out`], but stops launching new work once `cancel` fires.
/// Work already in flight is allowed to finish; items observed after
/// cancellation are simply dropped rather than started.
///
/// Used by the queue processor (`spec.md` §5: "cooperative via a
/// cancellation token threaded through the queue processor and any
/// long-running batch operations") so an activation shutdown halts at the
/// next batch boundary instead of mid-fan-out.
pub async fn bounded_fan_out_cancellable<T, O, E, F, Fut>(
	items: impl IntoIterator<Item = T>,
	max_in_flight: usize,
	cancel: &CancellationToken,
	f: F,
) -> Result<Vec<O>, E>
where
	F: Fn(T) -> Fut,
	Fut: Future<Output = Result<O, E>>,
{
	let outcomes: Vec<Option<Result<O, E>>> = stream::iter(items)
		.map(|item| {
			let cancel = cancel.clone();
			let fut = f(item);
			async move {
				if cancel.is_cancelled() {
					None
				} else {
					Some(fut.await)
				}
			}
		})
		.buffer_unordered(max_in_flight.max(1))
		.collect()
		.await;

	let mut out = Vec::with_capacity(outcomes.len());
	for outcome in outcomes {
		match outcome {
			None => continue,
			Some(Ok(v)) => out.push(v),
			Some(Err(e)) => return Err(e),
		}
	}
	Ok(out)
}

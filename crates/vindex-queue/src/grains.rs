use std::collections::HashSet;

use async_trait::async_trait;
use vindex_types::{ActionId, GrainRef};

/// The queue processor's seam into "the grain" (`spec.md` §4.6 steps 2, 3,
/// 5): for each action in a batch, ask its owning grain which action ids
/// are still active, and afterwards tell it which ids to clear.
///
/// The grain activation itself is an external collaborator (`spec.md` §1:
/// "the actor runtime itself... activation lifecycle, message dispatch");
/// this trait is the boundary a host wires to real grain activations.
/// [`vindex-controller`](../vindex_controller) provides an implementation
/// backed by the durable envelope store rather than a live actor message,
/// since this core has no activation runtime of its own to dispatch
/// through.
#[async_trait]
pub trait GrainActiveActions: Send + Sync {
	/// The grain's current view of in-flight indexing action ids.
	async fn active_action_ids(&self, grain: &GrainRef) -> HashSet<ActionId>;

	/// Removes `ids` from the grain's active set once the queue has
	/// finished acting on them (`spec.md` §4.6 step 5).
	async fn clear_action_ids(&self, grain: &GrainRef, ids: &[ActionId]);
}

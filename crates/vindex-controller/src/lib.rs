//! Indexed state controller (C5): owns one grain's state envelope and
//! before-image cache, and runs the commit protocol that keeps them
//! consistent with the registered indexes before anything is persisted.

mod active_ids;
mod controller;
mod envelope;
mod persist;

pub use active_ids::DurableActiveActionIds;
pub use controller::IndexedStateController;
pub use envelope::{IndexedState, IndexedStateEnvelope};

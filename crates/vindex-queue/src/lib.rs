//! Write-ahead indexing queue (C6): durably buffers the index updates one
//! grain interface's commits produce, and replays them against
//! [`vindex_client::IndexClient`] in batches, reversing tentative unique
//! writes an aborted commit left behind.
//!
//! One queue actor exists per grain interface type (`spec.md` §4.6). It owns
//! no indexes itself — it is handed one [`vindex_client::IndexClient`] per
//! index declared on that interface and fans updates out to them.

mod debounce;
mod entry;
mod grains;
mod persist;

pub mod actor;

pub use actor::{QueueActorError, QueueHandle, QueueRuntimeConfig};
pub use entry::{QueueEntry, QueueState};
pub use grains::GrainActiveActions;

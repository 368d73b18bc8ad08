mod commands;
mod handle;
mod service;

pub use handle::{QueueActorError, QueueHandle, QueueRuntimeConfig};

//! Static index registry (C7, `spec.md` §4.7): the process-wide map from
//! grain interface to indexed-state class to the set of index descriptors
//! declared on it.
//!
//! Built once at startup, either by draining descriptors registered through
//! `register_index_descriptor!` (the annotation-discovery substitute, backed
//! by [`inventory`]) or by assembling them directly through
//! [`IndexRegistryBuilder`] — the "equivalent builder API" `spec.md` §9
//! calls for when reflective annotation scanning isn't available. Both
//! paths enforce the same invariants: no duplicate index name within one
//! state class, consistent eagerness within a state class, and exactly one
//! indexed-state type per grain interface.

mod builder;
mod def;
mod error;
mod registry;

// Re-exported so `register_index_descriptor!` can reach `inventory`
// without requiring callers to depend on it directly.
#[doc(hidden)]
pub use inventory;

pub use builder::IndexRegistryBuilder;
pub use def::IndexDescriptorDef;
pub use error::RegistryBuildError;
pub use registry::{IndexRegistry, MAX_PARALLELISM};

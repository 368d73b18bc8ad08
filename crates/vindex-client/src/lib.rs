//! Index client (C4, `spec.md` §4.4): the stateless fan-in/fan-out layer
//! between a registered index and the bucket actors that physically
//! partition it.
//!
//! Routing is pure and recomputed on every call — this crate holds no
//! state of its own beyond the [`vindex_bucket::actor::BucketDirectory`]
//! it routes through, matching `spec.md` §4.4: "the client holds no
//! state; routing is pure and recomputed each call".

mod client;

pub use client::IndexClient;

//! Authoritative in-process registries and their durable mirroring.

pub mod mirror;
pub mod state;
pub mod sync;
pub mod ttl;

pub use mirror::{AggregateRecord, DurableMirror, FsMirror, HttpKvMirror};
pub use state::RegistryState;
pub use sync::MirrorSync;
pub use ttl::TtlCache;

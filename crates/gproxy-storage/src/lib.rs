//! In-process stand-ins for the collaborator traits `gproxy-core` is
//! generic over: `GroupManager`, `KeyProvider`, `SubGroupManager`, and
//! `RequestLogSink`.
//!
//! This crate is explicitly *not* the product's persistence layer (see
//! `spec.md` §1): a real deployment backs groups and keys with a database
//! and ships request logs to a sink of its own, swapping this crate out
//! without touching `gproxy-core`. What's here exists so the workspace
//! builds standalone and its tests exercise the collaborator traits
//! against a real (if minimal) implementation rather than a mock.

pub mod config;
pub mod groups;
pub mod keys;
pub mod log;
pub mod subgroups;

pub use config::{GroupFile, load_groups_from_file, load_groups_from_str};
pub use groups::InMemoryGroupManager;
pub use keys::InMemoryKeyProvider;
pub use log::TracingRequestLogSink;
pub use subgroups::WeightedSubGroupManager;

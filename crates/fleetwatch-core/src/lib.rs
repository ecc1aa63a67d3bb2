//! Agent-side inventory core for fleetwatch.
//!
//! This crate owns the in-memory model an agent keeps of the resources it
//! manages:
//!
//! - **[`TypeGraph`]** - Canonical registry of resource types, interned by
//!   `(name, plugin)`, with a many-to-many parent/child relation kept
//!   acyclic.
//!
//! - **[`ResourceTree`]** - Arena of discovered resources with ids on both
//!   ends of every parent/child link. Mutations under one parent are
//!   serialized by a per-parent lock.
//!
//! - **Discovery** - [`DiscoveryBatch`] results are merged into the tree by
//!   [`ResourceTree::apply_discovery`], matching existing children by
//!   `(type, key)` and pruning stale ones per [`RemovalPolicy`].
//!   [`DiscoveryRunner`] runs [`DiscoveryProbe`]s concurrently and feeds the
//!   merge.
//!
//! - **[`AvailabilityReconciler`]** - Last-known status per resource,
//!   producing full or changes-only [`AvailabilityReport`]s.
//!
//! - **Persistence** ([`persistence`]) - JSON snapshot of the tree that
//!   stores types by key only and re-binds them to the live graph on
//!   restore, recovering what it can.
//!
//! - **[`InventoryAgent`]** - Facade tying the above to a [`ReportSink`]
//!   and an [`InventoryStore`] for a caller that drives the cadence.

pub mod agent;
pub mod availability;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod persistence;
pub mod sink;
pub mod store;
pub mod type_graph;

#[cfg(test)]
pub(crate) mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use agent::InventoryAgent;
pub use availability::AvailabilityReconciler;
pub use config::{AgentSettings, RemovalPolicy};
pub use discovery::{DiscoveryContext, DiscoveryJob, DiscoveryProbe, DiscoveryRunner};
pub use error::{BoxError, CoreError};
pub use persistence::{
    FileInventoryStore, InventoryStore, MemoryInventoryStore, RecordProfile, RestoreFailure,
    RestoreOutcome,
};
pub use sink::{MemoryReportSink, ReportSink};
pub use store::{DiscoveryBatch, MergeOutcome, ResourceTree};
pub use type_graph::TypeGraph;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AvailabilityReport, AvailabilitySample, AvailabilityStatus, CreateDeletePolicy,
    DiscoveredResource, InventoryStatus, PluginCatalog, ProbeOutcome, Resource, ResourceCategory,
    ResourceId, ResourceType, StatusChange, TypeDescriptor, TypeKey,
};

// ── Domain model ──
//
// Canonical inventory types shared by every component of the core.

pub mod availability;
pub mod catalog;
pub mod discovery;
pub mod ids;
pub mod resource;
pub mod resource_type;

pub use availability::{AvailabilityReport, AvailabilitySample, AvailabilityStatus};
pub use catalog::{ParentRef, PluginCatalog, TypeDescriptor};
pub use discovery::{DiscoveredResource, ProbeOutcome};
pub use ids::{ResourceId, TypeKey};
pub use resource::{InventoryStatus, Resource, StatusChange};
pub use resource_type::{
    ConfigurationDefinition, CreateDeletePolicy, CreationDataType, EventDefinition,
    MetricDefinition, MetricKind, OperationDefinition, ProcessScan, PropertyDefinition,
    ResourceCategory, ResourceType, TypeDefinitions,
};

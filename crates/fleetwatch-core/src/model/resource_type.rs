// ── Resource type metadata ──
//
// A ResourceType is built once when its plugin loads and then shared by
// every resource of that type. Identity is the (name, plugin) key only;
// all other attributes are metadata.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::TypeKey;

/// Tier of a resource type in the management hierarchy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceCategory {
    Platform,
    Server,
    #[default]
    Service,
}

/// Which of the create/delete operations a type supports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CreateDeletePolicy {
    #[default]
    Both,
    CreateOnly,
    DeleteOnly,
    Neither,
}

/// How new instances of a creatable type are described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationDataType {
    #[default]
    Configuration,
    Content,
}

// ── Definition sets ─────────────────────────────────────────────────

/// Kind of value a metric produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    Measurement,
    Trait,
    CallTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub kind: MetricKind,
    /// Default collection interval in milliseconds.
    #[serde(default)]
    pub default_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Process query used to locate candidate instances of a server type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessScan {
    pub name: String,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// Schema for either plugin-level connection settings or resource-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationDefinition {
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
}

impl ConfigurationDefinition {
    /// Build a configuration value holding every property's default.
    pub fn defaults(&self) -> serde_json::Value {
        let map = self
            .properties
            .iter()
            .filter_map(|p| p.default.clone().map(|v| (p.name.clone(), v)))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

/// The lazily populated part of a type: what can be measured, emitted,
/// invoked and configured on its instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinitions {
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    #[serde(default)]
    pub operations: Vec<OperationDefinition>,
    #[serde(default)]
    pub process_scans: Vec<ProcessScan>,
    #[serde(default)]
    pub plugin_configuration: Option<ConfigurationDefinition>,
    #[serde(default)]
    pub resource_configuration: Option<ConfigurationDefinition>,
}

// ── ResourceType ────────────────────────────────────────────────────

/// Canonical metadata for one kind of manageable resource.
///
/// Always handled as `Arc<ResourceType>` obtained from the
/// [`TypeGraph`](crate::TypeGraph); parent/child relationships between
/// types live in the graph, not here.
#[derive(Debug)]
pub struct ResourceType {
    key: TypeKey,
    pub description: Option<String>,
    pub category: ResourceCategory,
    pub subcategory: Option<String>,
    pub create_delete_policy: CreateDeletePolicy,
    pub creation_data: CreationDataType,
    pub supports_manual_add: bool,
    /// At most one committed instance per parent.
    pub singleton: bool,
    definitions: ArcSwap<TypeDefinitions>,
}

impl ResourceType {
    pub fn new(name: impl Into<String>, plugin: impl Into<String>, category: ResourceCategory) -> Self {
        Self {
            key: TypeKey::new(name, plugin),
            description: None,
            category,
            subcategory: None,
            create_delete_policy: CreateDeletePolicy::default(),
            creation_data: CreationDataType::default(),
            supports_manual_add: false,
            singleton: false,
            definitions: ArcSwap::from_pointee(TypeDefinitions::default()),
        }
    }

    pub fn with_singleton(mut self, singleton: bool) -> Self {
        self.singleton = singleton;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn plugin(&self) -> &str {
        &self.key.plugin
    }

    pub fn supports_create(&self) -> bool {
        matches!(
            self.create_delete_policy,
            CreateDeletePolicy::Both | CreateDeletePolicy::CreateOnly
        )
    }

    pub fn supports_delete(&self) -> bool {
        matches!(
            self.create_delete_policy,
            CreateDeletePolicy::Both | CreateDeletePolicy::DeleteOnly
        )
    }

    /// Current definition sets (cheap `Arc` clone).
    pub fn definitions(&self) -> Arc<TypeDefinitions> {
        self.definitions.load_full()
    }

    /// Replace the definition sets. Readers holding the previous `Arc`
    /// keep seeing the old value.
    pub fn populate_definitions(&self, definitions: TypeDefinitions) {
        self.definitions.store(Arc::new(definitions));
    }
}

impl PartialEq for ResourceType {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for ResourceType {}

impl Hash for ResourceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for ResourceType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceType {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceType[category={}, name={}, plugin={}]",
            self.category, self.key.name, self.key.plugin
        )
    }
}

// ── Discovery records ──
//
// What a type-specific probe reports back: one record per instance it
// found under a given parent.

use serde::{Deserialize, Serialize};

use super::ids::{ResourceId, TypeKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredResource {
    pub parent_id: ResourceId,
    pub type_name: String,
    pub plugin_name: String,
    pub resource_key: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
}

impl DiscoveredResource {
    pub fn new(
        parent_id: ResourceId,
        resource_type: &TypeKey,
        resource_key: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            parent_id,
            type_name: resource_type.name.clone(),
            plugin_name: resource_type.plugin.clone(),
            resource_key: resource_key.into(),
            name: name.into(),
            version: None,
            description: None,
            config: serde_json::Value::Null,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    pub fn type_key(&self) -> TypeKey {
        TypeKey::new(&self.type_name, &self.plugin_name)
    }
}

/// Result of running one probe for one `(parent, type)` pairing.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Reported(Vec<DiscoveredResource>),
    Failed { message: String },
}

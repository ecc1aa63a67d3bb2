// ── Resource domain types ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{ResourceId, TypeKey};
use super::resource_type::ResourceType;

/// Whether a resource is actively managed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    #[default]
    New,
    Committed,
    Ignored,
}

impl InventoryStatus {
    /// Allowed administrative transitions: commit or ignore a new
    /// resource, and un-ignore an ignored one.
    pub fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::New, Self::Committed | Self::Ignored) | (Self::Ignored, Self::New)
        )
    }
}

/// A discovered instance in the runtime resource tree.
///
/// Parent and children are stored as ids into the owning
/// [`ResourceTree`](crate::ResourceTree); only the tree mutates them.
#[derive(Debug, Clone)]
pub struct Resource {
    pub id: ResourceId,
    /// Server-assigned numeric id, present once committed.
    pub server_id: Option<u32>,
    /// Plugin-supplied key, unique among siblings of the same type.
    pub key: String,
    pub name: String,
    pub version: Option<String>,
    pub description: Option<String>,
    pub resource_type: Arc<ResourceType>,
    pub status: InventoryStatus,
    pub plugin_configuration: serde_json::Value,
    /// Added by an operator rather than by discovery.
    pub manually_added: bool,
    /// Consecutive successful discovery runs that did not report this resource.
    pub missed_discoveries: u32,
    pub discovered_at: DateTime<Utc>,
    pub(crate) parent: Option<ResourceId>,
    pub(crate) children: IndexSet<ResourceId>,
}

impl Resource {
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        resource_type: Arc<ResourceType>,
    ) -> Self {
        Self {
            id: ResourceId::new(),
            server_id: None,
            key: key.into(),
            name: name.into(),
            version: None,
            description: None,
            resource_type,
            status: InventoryStatus::New,
            plugin_configuration: serde_json::Value::Null,
            manually_added: false,
            missed_discoveries: 0,
            discovered_at: Utc::now(),
            parent: None,
            children: IndexSet::new(),
        }
    }

    pub fn type_key(&self) -> &TypeKey {
        self.resource_type.key()
    }

    pub fn parent(&self) -> Option<ResourceId> {
        self.parent
    }

    pub fn children(&self) -> &IndexSet<ResourceId> {
        &self.children
    }

    pub fn is_committed(&self) -> bool {
        self.status == InventoryStatus::Committed
    }
}

/// An administrative inventory status transition, forwarded to the report sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub resource_id: ResourceId,
    pub from: InventoryStatus,
    pub to: InventoryStatus,
    pub server_id: Option<u32>,
}

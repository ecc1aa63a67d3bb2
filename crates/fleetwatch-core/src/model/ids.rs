// ── Core identity types ──
//
// ResourceId and TypeKey form the foundation of every inventory type.
// Resources are identified by an opaque UUID that survives restarts;
// types are identified purely by their (name, plugin) pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ── ResourceId ──────────────────────────────────────────────────────

/// Agent-local identifier for a discovered resource.
///
/// Assigned when the merge engine first creates the resource and kept for
/// its whole life, including across persistence. It doubles as the opaque
/// container identifier in persisted inventory files. The server-side
/// numeric id is a separate field populated on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(Uuid);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for ResourceId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

// ── TypeKey ─────────────────────────────────────────────────────────

/// Identity of a resource type: its name within the defining plugin.
///
/// Two plugins may define types with the same name, so the plugin is
/// always part of the key. Ordering is by name first, then plugin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    pub name: String,
    pub plugin: String,
}

impl TypeKey {
    pub fn new(name: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plugin: plugin.into(),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.plugin)
    }
}

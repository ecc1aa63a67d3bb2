// ── Inventory persistence ──
//
// Snapshot and restore of the resource tree. Types are stored by key only
// and re-resolved against the live type graph on restore, so the graph is
// never duplicated into the snapshot.
//
// Layout (JSON):
//   { "formatVersion": 1,
//     "root": "<resource id>",
//     "resources": [ <ResourceRecord, Full profile>, ... ],  // pre-order
//     "containers": { "<resource id>": { "resource": <Identity record>,
//                                        "availability": "UP" } } }
//
// Records are flat and name their children by id, so neither encoding nor
// decoding recurses with the depth of the tree.

mod store;

pub use store::{FileInventoryStore, InventoryStore, MemoryInventoryStore};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CoreError;
use crate::model::{AvailabilityStatus, InventoryStatus, Resource, ResourceId, TypeKey};
use crate::store::{Arena, ResourceTree};
use crate::type_graph::TypeGraph;

pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ── Records ─────────────────────────────────────────────────────────

/// How much of a resource a record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordProfile {
    /// Every attribute plus the ids of the children, in order.
    #[default]
    Full,
    /// Id, key and type key only.
    Identity,
}

/// Serialized form of one resource. Which optional parts are present is
/// decided by the [`RecordProfile`] it was captured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub id: ResourceId,
    pub key: String,
    pub resource_type: TypeKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<ResourceAttributes>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttributes {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: InventoryStatus,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub plugin_configuration: serde_json::Value,
    #[serde(default)]
    pub manually_added: bool,
    #[serde(default)]
    pub missed_discoveries: u32,
    pub discovered_at: DateTime<Utc>,
}

impl ResourceRecord {
    fn capture(arena: &Arena, id: ResourceId, profile: RecordProfile) -> Option<Self> {
        let resource = arena.nodes.get(&id)?;
        let mut record = Self {
            id,
            key: resource.key.clone(),
            resource_type: resource.type_key().clone(),
            attributes: None,
            children: Vec::new(),
        };
        if profile == RecordProfile::Full {
            record.attributes = Some(ResourceAttributes {
                name: resource.name.clone(),
                server_id: resource.server_id,
                version: resource.version.clone(),
                description: resource.description.clone(),
                status: resource.status,
                plugin_configuration: resource.plugin_configuration.clone(),
                manually_added: resource.manually_added,
                missed_discoveries: resource.missed_discoveries,
                discovered_at: resource.discovered_at,
            });
            record.children = resource.children.iter().copied().collect();
        }
        Some(record)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub resource: ResourceRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<AvailabilityStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventorySnapshot {
    format_version: u32,
    #[serde(default)]
    root: Option<ResourceId>,
    #[serde(default)]
    resources: Vec<ResourceRecord>,
    #[serde(default)]
    containers: IndexMap<ResourceId, ContainerRecord>,
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Serialize the tree plus the last known availability of its resources.
/// Holds the tree's read lock for the duration.
pub fn snapshot(
    tree: &ResourceTree,
    availability: &HashMap<ResourceId, AvailabilityStatus>,
) -> Result<Vec<u8>, CoreError> {
    let snapshot = {
        let arena = tree.read();
        let ids = arena.root.map(|r| arena.descendants(r)).unwrap_or_default();
        let resources = ids
            .iter()
            .filter_map(|id| ResourceRecord::capture(&arena, *id, RecordProfile::Full))
            .collect();
        let containers = ids
            .iter()
            .filter_map(|id| {
                ResourceRecord::capture(&arena, *id, RecordProfile::Identity).map(|resource| {
                    let container = ContainerRecord {
                        resource,
                        availability: availability.get(id).copied(),
                    };
                    (*id, container)
                })
            })
            .collect();
        InventorySnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            root: arena.root,
            resources,
            containers,
        }
    };

    let bytes = serde_json::to_vec(&snapshot).map_err(|e| CoreError::Store {
        message: format!("cannot encode inventory snapshot: {e}"),
    })?;
    info!(resources = snapshot.containers.len(), bytes = bytes.len(), "inventory snapshot taken");
    Ok(bytes)
}

// ── Restore ─────────────────────────────────────────────────────────

/// A subtree left out of a restored tree because its type no longer
/// resolves.
#[derive(Debug)]
pub struct RestoreFailure {
    pub resource_id: ResourceId,
    pub key: String,
    pub resource_type: TypeKey,
    /// Resources dropped with it, including itself.
    pub skipped: usize,
    pub error: CoreError,
}

#[derive(Debug)]
pub struct RestoreOutcome {
    pub tree: ResourceTree,
    /// Last known availability of every restored resource that had one.
    pub availability: HashMap<ResourceId, AvailabilityStatus>,
    pub failures: Vec<RestoreFailure>,
}

/// Rebuild a tree from snapshot bytes, binding every resource to the
/// canonical type instance in `graph`.
///
/// Undecodable bytes, an unsupported format version, a duplicated
/// resource id or a dangling child reference abort the whole restore. A record whose type no longer
/// resolves drops only its own subtree, reported in `failures`.
pub fn restore(bytes: &[u8], graph: &TypeGraph) -> Result<RestoreOutcome, CoreError> {
    let snapshot: InventorySnapshot = serde_json::from_slice(bytes)
        .map_err(|e| CoreError::malformed(format!("undecodable snapshot: {e}")))?;
    if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(CoreError::malformed(format!(
            "unsupported format version {} (expected {SNAPSHOT_FORMAT_VERSION})",
            snapshot.format_version
        )));
    }

    let mut arena = Arena::default();
    let mut failures = Vec::new();
    let mut records = index_records(snapshot.resources)?;
    if let Some(root) = snapshot.root {
        rebuild(&mut arena, &mut records, root, graph, &mut failures)?;
    }
    if !records.is_empty() {
        warn!(count = records.len(), "snapshot records unreachable from the root, ignored");
    }

    let availability = snapshot
        .containers
        .into_iter()
        .filter(|(id, _)| arena.nodes.contains_key(id))
        .filter_map(|(id, c)| c.availability.map(|s| (id, s)))
        .collect();

    info!(
        resources = arena.nodes.len(),
        failures = failures.len(),
        "inventory restored"
    );
    Ok(RestoreOutcome {
        tree: ResourceTree::from_arena(arena),
        availability,
        failures,
    })
}

fn index_records(
    resources: Vec<ResourceRecord>,
) -> Result<HashMap<ResourceId, ResourceRecord>, CoreError> {
    let mut records = HashMap::with_capacity(resources.len());
    for record in resources {
        let id = record.id;
        if records.insert(id, record).is_some() {
            return Err(CoreError::malformed(format!("resource id {id} appears twice")));
        }
    }
    Ok(records)
}

/// Remove the records below `children` from `records`, returning how many
/// were removed.
fn drain_subtree(records: &mut HashMap<ResourceId, ResourceRecord>, children: &[ResourceId]) -> usize {
    let mut drained = 0;
    let mut stack = children.to_vec();
    while let Some(id) = stack.pop() {
        if let Some(record) = records.remove(&id) {
            drained += 1;
            stack.extend(record.children);
        }
    }
    drained
}

/// Walk the records from the root, linking each node to its parent in both
/// directions as it is inserted. Each record is consumed once, so a second
/// reference to it is reported as malformed.
fn rebuild(
    arena: &mut Arena,
    records: &mut HashMap<ResourceId, ResourceRecord>,
    root: ResourceId,
    graph: &TypeGraph,
    failures: &mut Vec<RestoreFailure>,
) -> Result<(), CoreError> {
    let mut stack: Vec<(Option<ResourceId>, ResourceId)> = vec![(None, root)];

    while let Some((parent, id)) = stack.pop() {
        let mut record = records.remove(&id).ok_or_else(|| {
            CoreError::malformed(format!("resource {id} is missing or referenced twice"))
        })?;
        let resource_type = match graph.resolve(&record.resource_type) {
            Ok(t) => t,
            Err(error) => {
                warn!(resource_id = %record.id, resource_type = %record.resource_type, "cannot restore subtree, type unknown");
                failures.push(RestoreFailure {
                    resource_id: record.id,
                    skipped: 1 + drain_subtree(records, &record.children),
                    key: record.key,
                    resource_type: record.resource_type,
                    error,
                });
                continue;
            }
        };
        let attributes = record.attributes.take().ok_or_else(|| {
            CoreError::malformed(format!("resource {id} is missing its attributes"))
        })?;

        let mut resource = Resource::new(record.key, attributes.name, resource_type);
        resource.id = id;
        resource.server_id = attributes.server_id;
        resource.version = attributes.version;
        resource.description = attributes.description;
        resource.status = attributes.status;
        resource.plugin_configuration = attributes.plugin_configuration;
        resource.manually_added = attributes.manually_added;
        resource.missed_discoveries = attributes.missed_discoveries;
        resource.discovered_at = attributes.discovered_at;
        resource.parent = parent;
        resource.children = IndexSet::with_capacity(record.children.len());

        arena.nodes.insert(id, resource);
        match parent {
            Some(p) => {
                arena.get_mut(p)?.children.insert(id);
            }
            None => arena.root = Some(id),
        }
        // Reverse so children pop, and therefore link, in stored order.
        stack.extend(record.children.into_iter().rev().map(|c| (Some(id), c)));
    }
    Ok(())
}

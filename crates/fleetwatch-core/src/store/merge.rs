// ── Discovery merge ──
//
// Applies a batch of probe results into the ResourceTree. Existing
// children are matched by (type, resource key) and updated in place; new
// records become NEW resources. Non-committed children a successful probe
// stopped reporting are pruned according to the removal policy.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::tree::{Arena, ResourceTree};
use crate::config::RemovalPolicy;
use crate::error::CoreError;
use crate::model::{
    DiscoveredResource, InventoryStatus, ProbeOutcome, Resource, ResourceId, ResourceType, TypeKey,
};
use crate::type_graph::TypeGraph;

// ── Batch ───────────────────────────────────────────────────────────

/// Probe results grouped per `(parent, type)` pairing.
///
/// A pairing reported with an empty list means "probe ran and found
/// nothing", which prunes that type's stale children. A pairing absent
/// from the batch, or marked failed, leaves its children untouched.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryBatch {
    reports: IndexMap<ResourceId, IndexMap<TypeKey, ProbeOutcome>>,
}

impl DiscoveryBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group loose records by their own parent and type fields.
    pub fn from_records(records: impl IntoIterator<Item = DiscoveredResource>) -> Self {
        let mut batch = Self::new();
        for record in records {
            let (parent, type_key) = (record.parent_id, record.type_key());
            batch.report(parent, type_key, vec![record]);
        }
        batch
    }

    /// Add records for a pairing, appending to any already reported.
    pub fn report(&mut self, parent: ResourceId, type_key: TypeKey, records: Vec<DiscoveredResource>) {
        let slot = self
            .reports
            .entry(parent)
            .or_default()
            .entry(type_key)
            .or_insert_with(|| ProbeOutcome::Reported(Vec::new()));
        match slot {
            ProbeOutcome::Reported(existing) => existing.extend(records),
            ProbeOutcome::Failed { .. } => {}
        }
    }

    /// Mark a pairing's probe as failed. Failure wins over any records.
    pub fn fail(&mut self, parent: ResourceId, type_key: TypeKey, message: impl Into<String>) {
        self.reports.entry(parent).or_default().insert(
            type_key,
            ProbeOutcome::Failed {
                message: message.into(),
            },
        );
    }

    /// Number of `(parent, type)` pairings.
    pub fn len(&self) -> usize {
        self.reports.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn into_parents(self) -> IndexMap<ResourceId, IndexMap<TypeKey, ProbeOutcome>> {
        self.reports
    }
}

// ── Outcome ─────────────────────────────────────────────────────────

/// What a merge changed, and what it had to reject.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub added: Vec<ResourceId>,
    pub updated: Vec<ResourceId>,
    /// Every removed resource, including descendants of pruned children.
    pub removed: Vec<ResourceId>,
    pub singleton_violations: Vec<CoreError>,
    pub unknown_types: Vec<CoreError>,
    pub probe_failures: Vec<CoreError>,
    /// Other per-record rejections (duplicate keys, vanished parents).
    pub rejected: Vec<CoreError>,
}

impl MergeOutcome {
    /// Whether the merge left the tree exactly as it found it.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub(crate) fn absorb(&mut self, other: Self) {
        self.added.extend(other.added);
        self.updated.extend(other.updated);
        self.removed.extend(other.removed);
        self.singleton_violations.extend(other.singleton_violations);
        self.unknown_types.extend(other.unknown_types);
        self.probe_failures.extend(other.probe_failures);
        self.rejected.extend(other.rejected);
    }
}

// ── Merge ───────────────────────────────────────────────────────────

impl ResourceTree {
    /// Merge a discovery batch. Parents must already be in the tree; their
    /// reports are merged shallowest first regardless of batch order.
    pub fn apply_discovery(
        &self,
        graph: &TypeGraph,
        batch: DiscoveryBatch,
        policy: RemovalPolicy,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for (parent, reports) in self.order_by_depth(batch.into_parents()) {
            outcome.absorb(self.apply_parent_discovery(graph, parent, reports, policy));
        }

        info!(
            added = outcome.added.len(),
            updated = outcome.updated.len(),
            removed = outcome.removed.len(),
            rejected = outcome.singleton_violations.len()
                + outcome.unknown_types.len()
                + outcome.rejected.len(),
            probe_failures = outcome.probe_failures.len(),
            "discovery merged"
        );
        outcome
    }

    /// Merge every pairing reported for one parent, holding that parent's
    /// mutation lock for the whole run.
    pub(crate) fn apply_parent_discovery(
        &self,
        graph: &TypeGraph,
        parent: ResourceId,
        reports: IndexMap<TypeKey, ProbeOutcome>,
        policy: RemovalPolicy,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let lock = self.parent_lock(parent);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.contains(parent) {
            warn!(parent = %parent, "discovery results for unknown parent dropped");
            outcome.rejected.push(CoreError::UnknownResource { id: parent });
            return outcome;
        }

        let mut reported_types = HashSet::new();
        let mut present = HashSet::new();

        for (type_key, probe) in reports {
            let records = match probe {
                ProbeOutcome::Reported(records) => records,
                ProbeOutcome::Failed { message } => {
                    warn!(parent = %parent, resource_type = %type_key, %message, "discovery probe failed");
                    outcome.probe_failures.push(CoreError::ProbeFailed {
                        parent,
                        resource_type: type_key,
                        message,
                    });
                    continue;
                }
            };
            let resource_type = match graph.resolve(&type_key) {
                Ok(t) => t,
                Err(err) => {
                    warn!(parent = %parent, resource_type = %type_key, "discovered resources of unknown type skipped");
                    outcome.unknown_types.push(err);
                    continue;
                }
            };

            let mut arena = self.write();
            for record in records {
                merge_record(&mut arena, parent, &resource_type, record, &mut present, &mut outcome);
            }
            reported_types.insert(type_key);
        }

        let removed = self.prune_missing(parent, &reported_types, &present, policy);
        self.forget_locks(&removed);
        outcome.removed = removed;
        outcome
    }

    /// Count a missed run against every non-committed, non-manual child of
    /// a reported type that was not seen, removing those over the threshold.
    fn prune_missing(
        &self,
        parent: ResourceId,
        reported_types: &HashSet<TypeKey>,
        present: &HashSet<ResourceId>,
        policy: RemovalPolicy,
    ) -> Vec<ResourceId> {
        let mut arena = self.write();
        let candidates: Vec<ResourceId> = arena
            .nodes
            .get(&parent)
            .map(|p| p.children.iter().copied().collect())
            .unwrap_or_default();

        let mut removed = Vec::new();
        for child in candidates {
            if present.contains(&child) || arena.in_manual_subtree(child) {
                continue;
            }
            let Some(node) = arena.nodes.get_mut(&child) else {
                continue;
            };
            if node.status == InventoryStatus::Committed || !reported_types.contains(node.type_key()) {
                continue;
            }
            node.missed_discoveries += 1;
            if policy.should_remove(node.missed_discoveries) {
                debug!(resource_id = %child, key = %node.key, "resource no longer discovered, removing");
                removed.extend(arena.remove_subtree(child));
            } else {
                debug!(resource_id = %child, missed = node.missed_discoveries, "resource missed a discovery run");
            }
        }
        removed
    }

    fn order_by_depth(
        &self,
        parents: IndexMap<ResourceId, IndexMap<TypeKey, ProbeOutcome>>,
    ) -> Vec<(ResourceId, IndexMap<TypeKey, ProbeOutcome>)> {
        let mut ordered: Vec<_> = {
            let arena = self.read();
            parents
                .into_iter()
                .map(|(parent, reports)| {
                    let depth = arena
                        .nodes
                        .contains_key(&parent)
                        .then(|| arena.ancestors(parent).len());
                    (depth.unwrap_or(usize::MAX), parent, reports)
                })
                .collect()
        };
        ordered.sort_by_key(|(depth, _, _)| *depth);
        ordered.into_iter().map(|(_, p, r)| (p, r)).collect()
    }
}

fn merge_record(
    arena: &mut Arena,
    parent: ResourceId,
    resource_type: &Arc<ResourceType>,
    record: DiscoveredResource,
    present: &mut HashSet<ResourceId>,
    outcome: &mut MergeOutcome,
) {
    if let Some(existing) = arena.find_child(parent, resource_type.key(), &record.resource_key) {
        present.insert(existing);
        if let Ok(node) = arena.get_mut(existing) {
            node.missed_discoveries = 0;
            if update_in_place(node, record) {
                outcome.updated.push(existing);
            }
        }
        return;
    }

    let mut resource = Resource::new(record.resource_key, record.name, Arc::clone(resource_type));
    resource.version = record.version;
    resource.description = record.description;
    resource.plugin_configuration = record.config;

    match arena.attach(resource, parent) {
        Ok(id) => {
            debug!(resource_id = %id, parent = %parent, resource_type = %resource_type.key(), "new resource discovered");
            present.insert(id);
            outcome.added.push(id);
        }
        Err(err @ CoreError::SingletonViolation { .. }) => {
            warn!(parent = %parent, error = %err, "discovered resource rejected");
            outcome.singleton_violations.push(err);
        }
        Err(err) => {
            warn!(parent = %parent, error = %err, "discovered resource rejected");
            outcome.rejected.push(err);
        }
    }
}

/// Copy discovery-owned attributes onto an existing resource. Returns
/// whether anything changed.
fn update_in_place(resource: &mut Resource, record: DiscoveredResource) -> bool {
    let mut changed = false;
    if resource.name != record.name {
        resource.name = record.name;
        changed = true;
    }
    if resource.version != record.version {
        resource.version = record.version;
        changed = true;
    }
    if resource.description != record.description {
        resource.description = record.description;
        changed = true;
    }
    if resource.plugin_configuration != record.config {
        resource.plugin_configuration = record.config;
        changed = true;
    }
    changed
}

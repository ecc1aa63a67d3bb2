// ── Runtime resource tree ──
//
// Arena of resources indexed by id. Parent and child links are stored as
// ids on both ends, so the bidirectional invariant reduces to set
// membership checks.
//
// Locking: mutations of a parent's child set are serialized by that
// parent's mutation lock, then applied under the arena write lock. Lock
// order is always parent lock before arena lock. Snapshots hold the arena
// read lock; restore swaps the arena under the write lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{InventoryStatus, Resource, ResourceId, StatusChange, TypeKey};

// ── Arena ───────────────────────────────────────────────────────────

/// Lock-free view of the tree; every method assumes the caller holds the
/// appropriate arena guard.
#[derive(Debug, Default)]
pub(crate) struct Arena {
    pub(crate) root: Option<ResourceId>,
    pub(crate) nodes: HashMap<ResourceId, Resource>,
}

impl Arena {
    pub(crate) fn get(&self, id: ResourceId) -> Result<&Resource, CoreError> {
        self.nodes
            .get(&id)
            .ok_or(CoreError::UnknownResource { id })
    }

    pub(crate) fn get_mut(&mut self, id: ResourceId) -> Result<&mut Resource, CoreError> {
        self.nodes
            .get_mut(&id)
            .ok_or(CoreError::UnknownResource { id })
    }

    /// Child of `parent` with the given type and plugin-supplied key.
    pub(crate) fn find_child(
        &self,
        parent: ResourceId,
        type_key: &TypeKey,
        key: &str,
    ) -> Option<ResourceId> {
        self.nodes.get(&parent)?.children.iter().copied().find(|c| {
            self.nodes
                .get(c)
                .is_some_and(|r| r.key == key && r.type_key() == type_key)
        })
    }

    /// A committed child of `parent` with the given type, other than `excluding`.
    pub(crate) fn committed_sibling(
        &self,
        parent: ResourceId,
        type_key: &TypeKey,
        excluding: Option<ResourceId>,
    ) -> Option<ResourceId> {
        self.nodes.get(&parent)?.children.iter().copied().find(|c| {
            Some(*c) != excluding
                && self
                    .nodes
                    .get(c)
                    .is_some_and(|r| r.is_committed() && r.type_key() == type_key)
        })
    }

    pub(crate) fn set_root(&mut self, mut resource: Resource) -> ResourceId {
        let id = resource.id;
        resource.parent = None;
        resource.children.clear();
        self.nodes.clear();
        self.nodes.insert(id, resource);
        self.root = Some(id);
        id
    }

    /// Link `resource` under `parent`, enforcing key uniqueness and the
    /// singleton rule.
    pub(crate) fn attach(
        &mut self,
        mut resource: Resource,
        parent: ResourceId,
    ) -> Result<ResourceId, CoreError> {
        self.get(parent)?;
        let id = resource.id;
        if self.nodes.contains_key(&id) {
            return Err(CoreError::ConcurrentModification {
                detail: format!("resource {id} is already attached"),
            });
        }

        let type_key = resource.type_key().clone();
        if self.find_child(parent, &type_key, &resource.key).is_some() {
            return Err(CoreError::DuplicateKey {
                parent,
                resource_type: type_key,
                key: resource.key,
            });
        }
        if resource.resource_type.singleton
            && self.committed_sibling(parent, &type_key, None).is_some()
        {
            return Err(CoreError::SingletonViolation {
                parent,
                type_name: type_key.name,
                plugin: type_key.plugin,
            });
        }

        resource.parent = Some(parent);
        resource.children.clear();
        self.nodes.insert(id, resource);
        self.get_mut(parent)?.children.insert(id);
        Ok(id)
    }

    /// Remove `id` and everything below it. Returns the removed ids in
    /// depth-first pre-order.
    pub(crate) fn remove_subtree(&mut self, id: ResourceId) -> Vec<ResourceId> {
        let removed = self.descendants(id);
        if let Some(parent) = self.nodes.get(&id).and_then(Resource::parent) {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.shift_remove(&id);
            }
        }
        for node in &removed {
            self.nodes.remove(node);
        }
        if self.root == Some(id) {
            self.root = None;
        }
        removed
    }

    /// `id` followed by all of its descendants, depth-first pre-order.
    pub(crate) fn descendants(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    pub(crate) fn ancestors(&self, id: ResourceId) -> Vec<ResourceId> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&id).and_then(Resource::parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.nodes.get(&parent).and_then(Resource::parent);
        }
        out
    }

    /// Whether `id` or any of its ancestors was added manually.
    pub(crate) fn in_manual_subtree(&self, id: ResourceId) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .any(|r| self.nodes.get(&r).is_some_and(|n| n.manually_added))
    }

    /// Verify that every parent link is mirrored by a child link and vice
    /// versa, and that every node hangs off the root exactly once.
    pub(crate) fn check_links(&self) -> Result<(), CoreError> {
        let broken = |detail: String| Err(CoreError::ConcurrentModification { detail });

        for (id, node) in &self.nodes {
            match node.parent {
                Some(parent) => match self.nodes.get(&parent) {
                    Some(p) if p.children.contains(id) => {}
                    Some(_) => return broken(format!("{parent} does not list child {id}")),
                    None => return broken(format!("{id} points at missing parent {parent}")),
                },
                None if self.root == Some(*id) => {}
                None => return broken(format!("{id} has no parent and is not the root")),
            }
            for child in &node.children {
                match self.nodes.get(child) {
                    Some(c) if c.parent == Some(*id) => {}
                    Some(_) => return broken(format!("{child} does not point back at {id}")),
                    None => return broken(format!("{id} lists missing child {child}")),
                }
            }
        }

        let reachable = self.root.map_or(0, |r| self.descendants(r).len());
        if reachable != self.nodes.len() {
            return broken(format!(
                "{reachable} of {} resources reachable from the root",
                self.nodes.len()
            ));
        }
        Ok(())
    }
}

// ── ResourceTree ────────────────────────────────────────────────────

/// Thread-safe runtime hierarchy of discovered resources.
#[derive(Debug, Default)]
pub struct ResourceTree {
    arena: RwLock<Arena>,
    parent_locks: DashMap<ResourceId, Arc<Mutex<()>>>,
}

impl ResourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole tree with a single root (the platform).
    pub fn set_root(&self, resource: Resource) -> ResourceId {
        let id = self.write().set_root(resource);
        self.parent_locks.clear();
        debug!(resource_id = %id, "platform root set");
        id
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn root(&self) -> Option<ResourceId> {
        self.read().root
    }

    /// Clone of a resource, if present.
    pub fn get(&self, id: ResourceId) -> Option<Resource> {
        self.read().nodes.get(&id).cloned()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.read().nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().nodes.is_empty()
    }

    pub fn parent(&self, id: ResourceId) -> Option<ResourceId> {
        self.read().nodes.get(&id).and_then(Resource::parent)
    }

    pub fn children(&self, id: ResourceId) -> Vec<ResourceId> {
        self.read()
            .nodes
            .get(&id)
            .map(|r| r.children.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn depth(&self, id: ResourceId) -> Option<usize> {
        let arena = self.read();
        arena.nodes.contains_key(&id).then(|| arena.ancestors(id).len())
    }

    /// Parent, grandparent, … up to the root.
    pub fn ancestors(&self, id: ResourceId) -> Vec<ResourceId> {
        self.read().ancestors(id)
    }

    /// `id` and all its descendants, depth-first pre-order.
    pub fn descendants(&self, id: ResourceId) -> Vec<ResourceId> {
        self.read().descendants(id)
    }

    /// Every resource id, depth-first from the root.
    pub fn ids(&self) -> Vec<ResourceId> {
        let arena = self.read();
        arena.root.map(|r| arena.descendants(r)).unwrap_or_default()
    }

    /// Deduplication lookup by (parent, type, resource key).
    pub fn find_child(&self, parent: ResourceId, type_key: &TypeKey, key: &str) -> Option<ResourceId> {
        self.read().find_child(parent, type_key, key)
    }

    pub fn check_links(&self) -> Result<(), CoreError> {
        self.read().check_links()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Attach `resource` under `parent`, updating both link directions.
    pub fn attach(&self, resource: Resource, parent: ResourceId) -> Result<ResourceId, CoreError> {
        let lock = self.parent_lock(parent);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let id = self.write().attach(resource, parent)?;
        debug!(resource_id = %id, parent = %parent, "resource attached");
        Ok(id)
    }

    /// Attach an operator-supplied resource. It and its subtree are never
    /// removed by discovery.
    pub fn add_manual(&self, mut resource: Resource, parent: ResourceId) -> Result<ResourceId, CoreError> {
        if !resource.resource_type.supports_manual_add {
            return Err(CoreError::ManualAddUnsupported {
                resource_type: resource.type_key().clone(),
            });
        }
        resource.manually_added = true;
        self.attach(resource, parent)
    }

    /// Remove a resource and its whole subtree. Returns the removed ids.
    pub fn detach(&self, id: ResourceId) -> Result<Vec<ResourceId>, CoreError> {
        let parent = self.read().get(id)?.parent();
        let removed = match parent {
            Some(parent) => {
                let lock = self.parent_lock(parent);
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let mut arena = self.write();
                Self::ensure_parent(&arena, id, Some(parent))?;
                arena.remove_subtree(id)
            }
            None => self.write().remove_subtree(id),
        };
        self.forget_locks(&removed);
        debug!(resource_id = %id, count = removed.len(), "subtree detached");
        Ok(removed)
    }

    /// Move a resource to `COMMITTED`, recording its server-assigned id.
    ///
    /// The singleton rule is re-validated here: a NEW sibling may have
    /// been committed since this resource was attached.
    pub fn commit(&self, id: ResourceId, server_id: u32) -> Result<StatusChange, CoreError> {
        self.transition(id, InventoryStatus::Committed, Some(server_id))
    }

    pub fn ignore(&self, id: ResourceId) -> Result<StatusChange, CoreError> {
        self.transition(id, InventoryStatus::Ignored, None)
    }

    pub fn unignore(&self, id: ResourceId) -> Result<StatusChange, CoreError> {
        self.transition(id, InventoryStatus::New, None)
    }

    fn transition(
        &self,
        id: ResourceId,
        to: InventoryStatus,
        server_id: Option<u32>,
    ) -> Result<StatusChange, CoreError> {
        let parent = self.read().get(id)?.parent();
        let lock = parent.map(|p| self.parent_lock(p));
        let _guard = lock
            .as_ref()
            .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner));

        let mut arena = self.write();
        Self::ensure_parent(&arena, id, parent)?;

        let resource = arena.get(id)?;
        let from = resource.status;
        if !from.can_transition_to(to) {
            return Err(CoreError::InvalidTransition { id, from, to });
        }
        if to == InventoryStatus::Committed && resource.resource_type.singleton {
            if let Some(parent) = parent {
                let type_key = resource.type_key().clone();
                if arena.committed_sibling(parent, &type_key, Some(id)).is_some() {
                    return Err(CoreError::SingletonViolation {
                        parent,
                        type_name: type_key.name,
                        plugin: type_key.plugin,
                    });
                }
            }
        }

        let resource = arena.get_mut(id)?;
        resource.status = to;
        if server_id.is_some() {
            resource.server_id = server_id;
        }
        debug!(resource_id = %id, %from, %to, "inventory status changed");
        Ok(StatusChange {
            resource_id: id,
            from,
            to,
            server_id: resource.server_id,
        })
    }

    // ── Crate-internal access ────────────────────────────────────────

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, Arena> {
        self.arena.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        self.arena.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The mutation lock serializing changes to `parent`'s child set.
    pub(crate) fn parent_lock(&self, parent: ResourceId) -> Arc<Mutex<()>> {
        Arc::clone(self.parent_locks.entry(parent).or_default().value())
    }

    pub(crate) fn forget_locks(&self, removed: &[ResourceId]) {
        for id in removed {
            self.parent_locks.remove(id);
        }
    }

    pub(crate) fn from_arena(arena: Arena) -> Self {
        Self {
            arena: RwLock::new(arena),
            parent_locks: DashMap::new(),
        }
    }

    /// Swap in the contents of a freshly restored tree.
    pub(crate) fn replace_with(&self, restored: Self) {
        let arena = restored
            .arena
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        *self.write() = arena;
        self.parent_locks.clear();
    }

    /// Detect a tree mutated between reading `id`'s parent and locking it.
    fn ensure_parent(arena: &Arena, id: ResourceId, expected: Option<ResourceId>) -> Result<(), CoreError> {
        let actual = arena.get(id)?.parent();
        if actual == expected {
            Ok(())
        } else {
            Err(CoreError::ConcurrentModification {
                detail: format!("parent of {id} changed while waiting for its lock"),
            })
        }
    }
}

// ── Type graph ──
//
// Canonical registry of resource types, interned by (name, plugin), plus
// the many-to-many parent/child relation between them. The relation is a
// DAG: an edge that would make a type its own ancestor is rejected.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{PluginCatalog, ResourceType, TypeKey};

/// Both directions of every edge, updated under a single lock.
#[derive(Default)]
struct TypeEdges {
    children: HashMap<TypeKey, IndexSet<TypeKey>>,
    parents: HashMap<TypeKey, IndexSet<TypeKey>>,
}

impl TypeEdges {
    /// Whether `ancestor` is reachable from `key` by following parent edges.
    fn is_ancestor(&self, ancestor: &TypeKey, key: &TypeKey) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([key]);
        while let Some(current) = queue.pop_front() {
            if current == ancestor {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(parents) = self.parents.get(current) {
                queue.extend(parents.iter());
            }
        }
        false
    }
}

/// Shared, thread-safe registry of resource type metadata.
///
/// Callers must always keep the `Arc` returned by
/// [`register_type`](Self::register_type) or [`resolve`](Self::resolve)
/// rather than their own copy, so every resource of a type points at the
/// same instance.
#[derive(Default)]
pub struct TypeGraph {
    types: DashMap<TypeKey, Arc<ResourceType>>,
    edges: RwLock<TypeEdges>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Registration ─────────────────────────────────────────────────

    /// Insert a type, or return the canonical instance already registered
    /// under the same (name, plugin).
    pub fn register_type(&self, resource_type: ResourceType) -> Arc<ResourceType> {
        let key = resource_type.key().clone();
        let entry = self
            .types
            .entry(key)
            .or_insert_with(|| Arc::new(resource_type));
        Arc::clone(entry.value())
    }

    /// Register every type of a plugin, then wire up their parent edges.
    ///
    /// Types are all registered before any edge is added, so descriptors
    /// may reference siblings declared later in the same catalog.
    pub fn register_catalog(
        &self,
        catalog: &PluginCatalog,
    ) -> Result<Vec<Arc<ResourceType>>, CoreError> {
        let registered: Vec<Arc<ResourceType>> = catalog
            .types
            .iter()
            .map(|descriptor| self.register_type(descriptor.to_resource_type(&catalog.plugin)))
            .collect();

        for (descriptor, child) in catalog.types.iter().zip(&registered) {
            for parent in descriptor.parent_keys(&catalog.plugin) {
                if let Err(err) = self.add_parent_child(&parent, child.key()) {
                    warn!(plugin = %catalog.plugin, child = %child.key(), parent = %parent, error = %err, "cannot link type");
                    return Err(err);
                }
            }
        }

        debug!(plugin = %catalog.plugin, count = registered.len(), "registered plugin catalog");
        Ok(registered)
    }

    /// Link `parent` -> `child`, updating both directions together.
    ///
    /// Returns `false` if the edge already existed.
    pub fn add_parent_child(&self, parent: &TypeKey, child: &TypeKey) -> Result<bool, CoreError> {
        if !self.types.contains_key(parent) {
            return Err(CoreError::unknown_type(parent));
        }
        if !self.types.contains_key(child) {
            return Err(CoreError::unknown_type(child));
        }

        let mut edges = self.edges.write().unwrap_or_else(PoisonError::into_inner);
        if edges.is_ancestor(child, parent) {
            return Err(CoreError::TypeCycle {
                parent: parent.clone(),
                child: child.clone(),
            });
        }

        let added = edges
            .children
            .entry(parent.clone())
            .or_default()
            .insert(child.clone());
        edges
            .parents
            .entry(child.clone())
            .or_default()
            .insert(parent.clone());
        Ok(added)
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn resolve(&self, key: &TypeKey) -> Result<Arc<ResourceType>, CoreError> {
        self.types
            .get(key)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| CoreError::unknown_type(key))
    }

    pub fn resolve_named(&self, name: &str, plugin: &str) -> Result<Arc<ResourceType>, CoreError> {
        self.resolve(&TypeKey::new(name, plugin))
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.types.contains_key(key)
    }

    pub fn children_of(&self, key: &TypeKey) -> Vec<Arc<ResourceType>> {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        self.collect(edges.children.get(key))
    }

    pub fn parents_of(&self, key: &TypeKey) -> Vec<Arc<ResourceType>> {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        self.collect(edges.parents.get(key))
    }

    /// Types with no parent type (typically platforms), sorted.
    pub fn root_types(&self) -> Vec<Arc<ResourceType>> {
        let edges = self.edges.read().unwrap_or_else(PoisonError::into_inner);
        let mut roots: Vec<Arc<ResourceType>> = self
            .types
            .iter()
            .filter(|r| edges.parents.get(r.key()).is_none_or(IndexSet::is_empty))
            .map(|r| Arc::clone(r.value()))
            .collect();
        roots.sort();
        roots
    }

    pub fn types_for_plugin(&self, plugin: &str) -> Vec<Arc<ResourceType>> {
        let mut types: Vec<Arc<ResourceType>> = self
            .types
            .iter()
            .filter(|r| r.key().plugin == plugin)
            .map(|r| Arc::clone(r.value()))
            .collect();
        types.sort();
        types
    }

    /// Every registered type, sorted by name then plugin.
    pub fn all_types(&self) -> Vec<Arc<ResourceType>> {
        let mut types: Vec<Arc<ResourceType>> =
            self.types.iter().map(|r| Arc::clone(r.value())).collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn collect(&self, keys: Option<&IndexSet<TypeKey>>) -> Vec<Arc<ResourceType>> {
        keys.into_iter()
            .flatten()
            .filter_map(|k| self.types.get(k).map(|r| Arc::clone(r.value())))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ParentRef, ResourceCategory, TypeDescriptor};

    fn platform() -> ResourceType {
        ResourceType::new("Linux", "platform", ResourceCategory::Platform)
    }

    #[test]
    fn register_returns_canonical_instance() {
        let graph = TypeGraph::new();
        let first = graph.register_type(platform());
        let second = graph.register_type(platform().with_description("ignored copy"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.description.is_none());
        assert!(Arc::ptr_eq(
            &first,
            &graph.resolve_named("Linux", "platform").unwrap()
        ));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn same_name_in_two_plugins_are_distinct() {
        let graph = TypeGraph::new();
        let a = graph.register_type(ResourceType::new("Datasource", "jboss-as", ResourceCategory::Service));
        let b = graph.register_type(ResourceType::new("Datasource", "tomcat", ResourceCategory::Service));
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(graph.types_for_plugin("tomcat").len(), 1);
    }

    #[test]
    fn resolve_unknown_type_is_an_error() {
        let graph = TypeGraph::new();
        let err = graph.resolve_named("Ghost", "nowhere").unwrap_err();
        assert!(matches!(err, CoreError::UnknownType { ref name, .. } if name == "Ghost"));
    }

    #[test]
    fn edges_are_symmetric() {
        let graph = TypeGraph::new();
        let linux = graph.register_type(platform());
        let tomcat = graph.register_type(ResourceType::new("Tomcat", "tomcat", ResourceCategory::Server));

        assert!(graph.add_parent_child(linux.key(), tomcat.key()).unwrap());
        assert!(!graph.add_parent_child(linux.key(), tomcat.key()).unwrap());

        assert_eq!(graph.children_of(linux.key()), vec![Arc::clone(&tomcat)]);
        assert_eq!(graph.parents_of(tomcat.key()), vec![Arc::clone(&linux)]);
        assert_eq!(graph.root_types(), vec![linux]);
    }

    #[test]
    fn type_may_have_parents_from_several_plugins() {
        let graph = TypeGraph::new();
        let tomcat = graph.register_type(ResourceType::new("Tomcat", "tomcat", ResourceCategory::Server));
        let jboss = graph.register_type(ResourceType::new("JBossAS", "jboss-as", ResourceCategory::Server));
        let hibernate = graph.register_type(ResourceType::new("Hibernate", "hibernate", ResourceCategory::Service));

        graph.add_parent_child(tomcat.key(), hibernate.key()).unwrap();
        graph.add_parent_child(jboss.key(), hibernate.key()).unwrap();

        assert_eq!(graph.parents_of(hibernate.key()).len(), 2);
    }

    #[test]
    fn cycles_are_rejected() {
        let graph = TypeGraph::new();
        let a = graph.register_type(ResourceType::new("A", "p", ResourceCategory::Server));
        let b = graph.register_type(ResourceType::new("B", "p", ResourceCategory::Service));
        let c = graph.register_type(ResourceType::new("C", "p", ResourceCategory::Service));
        graph.add_parent_child(a.key(), b.key()).unwrap();
        graph.add_parent_child(b.key(), c.key()).unwrap();

        assert!(matches!(
            graph.add_parent_child(c.key(), a.key()),
            Err(CoreError::TypeCycle { .. })
        ));
        assert!(matches!(
            graph.add_parent_child(a.key(), a.key()),
            Err(CoreError::TypeCycle { .. })
        ));
        assert!(graph.parents_of(a.key()).is_empty());
    }

    #[test]
    fn edge_to_unregistered_type_fails() {
        let graph = TypeGraph::new();
        let linux = graph.register_type(platform());
        let ghost = TypeKey::new("Ghost", "platform");
        assert!(matches!(
            graph.add_parent_child(linux.key(), &ghost),
            Err(CoreError::UnknownType { .. })
        ));
        assert!(graph.children_of(linux.key()).is_empty());
    }

    #[test]
    fn catalog_registers_types_and_edges() {
        let graph = TypeGraph::new();
        graph.register_type(platform());

        let catalog = PluginCatalog {
            plugin: "tomcat".into(),
            types: vec![
                TypeDescriptor {
                    name: "Connector".into(),
                    parents: vec![ParentRef { name: "Tomcat".into(), plugin: None }],
                    ..descriptor("Connector")
                },
                TypeDescriptor {
                    name: "Tomcat".into(),
                    category: ResourceCategory::Server,
                    parents: vec![ParentRef { name: "Linux".into(), plugin: Some("platform".into()) }],
                    ..descriptor("Tomcat")
                },
            ],
        };

        let registered = graph.register_catalog(&catalog).unwrap();
        assert_eq!(registered.len(), 2);
        assert_eq!(graph.len(), 3);

        let tomcat = TypeKey::new("Tomcat", "tomcat");
        assert_eq!(graph.children_of(&tomcat)[0].name(), "Connector");
        assert_eq!(graph.parents_of(&tomcat)[0].name(), "Linux");
    }

    #[test]
    fn catalog_with_missing_parent_fails() {
        let graph = TypeGraph::new();
        let catalog = PluginCatalog {
            plugin: "tomcat".into(),
            types: vec![TypeDescriptor {
                parents: vec![ParentRef { name: "Solaris".into(), plugin: Some("platform".into()) }],
                ..descriptor("Tomcat")
            }],
        };
        assert!(matches!(
            graph.register_catalog(&catalog),
            Err(CoreError::UnknownType { ref name, .. }) if name == "Solaris"
        ));
    }

    fn descriptor(name: &str) -> TypeDescriptor {
        serde_json::from_value(serde_json::json!({ "name": name })).unwrap()
    }
}

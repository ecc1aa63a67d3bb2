// Shared fixtures for unit tests.

use std::sync::Arc;

use crate::model::{DiscoveredResource, Resource, ResourceCategory, ResourceId, ResourceType, TypeKey};
use crate::store::ResourceTree;
use crate::type_graph::TypeGraph;

pub(crate) const PLUGIN: &str = "tomcat";
pub(crate) const PLATFORM: &str = "Linux";
/// Server type that supports manual add.
pub(crate) const SERVER: &str = "Tomcat Server";
pub(crate) const SERVICE: &str = "Connector";
/// Singleton service type.
pub(crate) const SINGLETON: &str = "JVM Agent";

pub(crate) fn key(name: &str) -> TypeKey {
    TypeKey::new(name, PLUGIN)
}

/// A small type graph and a tree holding only the platform root.
pub(crate) struct Fixture {
    pub graph: Arc<TypeGraph>,
    pub tree: Arc<ResourceTree>,
    pub root: ResourceId,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let graph = Arc::new(graph());
        let tree = Arc::new(ResourceTree::new());
        let platform = graph.resolve(&key(PLATFORM)).unwrap_or_else(|e| panic!("{e}"));
        let root = tree.set_root(Resource::new("localhost", "localhost", platform));
        Self { graph, tree, root }
    }

    pub(crate) fn key(&self, name: &str) -> TypeKey {
        key(name)
    }

    pub(crate) fn resource(&self, type_name: &str, resource_key: &str) -> Resource {
        let resource_type = self
            .graph
            .resolve(&key(type_name))
            .unwrap_or_else(|e| panic!("{e}"));
        Resource::new(resource_key, format!("{resource_key} ({type_name})"), resource_type)
    }

    pub(crate) fn discovered(&self, parent: ResourceId, type_name: &str, resource_key: &str) -> DiscoveredResource {
        DiscoveredResource::new(
            parent,
            &key(type_name),
            resource_key,
            format!("{resource_key} ({type_name})"),
        )
    }
}

/// Linux -> {Tomcat Server, Connector, JVM Agent}, Tomcat Server -> Connector.
pub(crate) fn graph() -> TypeGraph {
    let graph = TypeGraph::new();
    graph.register_type(ResourceType::new(PLATFORM, PLUGIN, ResourceCategory::Platform));

    let mut server = ResourceType::new(SERVER, PLUGIN, ResourceCategory::Server);
    server.supports_manual_add = true;
    graph.register_type(server);
    graph.register_type(ResourceType::new(SERVICE, PLUGIN, ResourceCategory::Service));
    graph.register_type(
        ResourceType::new(SINGLETON, PLUGIN, ResourceCategory::Service).with_singleton(true),
    );

    for (parent, child) in [
        (PLATFORM, SERVER),
        (PLATFORM, SERVICE),
        (PLATFORM, SINGLETON),
        (SERVER, SERVICE),
    ] {
        graph
            .add_parent_child(&key(parent), &key(child))
            .unwrap_or_else(|e| panic!("{e}"));
    }
    graph
}

// ── Plugin type catalogs ──
//
// The serialized form in which a plugin announces its resource types.
// Catalogs are read from TOML or JSON descriptors and fed to
// `TypeGraph::register_catalog`.

use serde::{Deserialize, Serialize};

use super::ids::TypeKey;
use super::resource_type::{
    CreateDeletePolicy, CreationDataType, ResourceCategory, ResourceType, TypeDefinitions,
};

/// Reference to a parent type. The plugin defaults to the catalog's own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub category: ResourceCategory,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub singleton: bool,
    #[serde(default)]
    pub supports_manual_add: bool,
    #[serde(default)]
    pub create_delete_policy: CreateDeletePolicy,
    #[serde(default)]
    pub creation_data: CreationDataType,
    #[serde(default)]
    pub parents: Vec<ParentRef>,
    #[serde(flatten)]
    pub definitions: TypeDefinitions,
}

/// All resource types contributed by one plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginCatalog {
    pub plugin: String,
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}

impl TypeDescriptor {
    /// Build the canonical type this descriptor declares under `plugin`.
    pub fn to_resource_type(&self, plugin: &str) -> ResourceType {
        let mut resource_type = ResourceType::new(&self.name, plugin, self.category);
        resource_type.description.clone_from(&self.description);
        resource_type.subcategory.clone_from(&self.subcategory);
        resource_type.singleton = self.singleton;
        resource_type.supports_manual_add = self.supports_manual_add;
        resource_type.create_delete_policy = self.create_delete_policy;
        resource_type.creation_data = self.creation_data;
        resource_type.populate_definitions(self.definitions.clone());
        resource_type
    }

    /// Parent keys, resolving omitted plugins to `default_plugin`.
    pub fn parent_keys<'a>(&'a self, default_plugin: &'a str) -> impl Iterator<Item = TypeKey> + 'a {
        self.parents.iter().map(move |p| {
            TypeKey::new(&p.name, p.plugin.as_deref().unwrap_or(default_plugin))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_deserializes_with_defaults_and_definitions() {
        let catalog: PluginCatalog = serde_json::from_value(json!({
            "plugin": "tomcat",
            "types": [{
                "name": "Tomcat Server",
                "category": "server",
                "singleton": true,
                "parents": [{ "name": "Linux", "plugin": "platform" }],
                "metrics": [{ "name": "threads.busy" }],
                "process_scans": [{ "name": "bootstrap", "query": "process|basename|match=^java.*" }]
            }]
        }))
        .unwrap();

        let descriptor = &catalog.types[0];
        assert_eq!(descriptor.category, ResourceCategory::Server);
        assert_eq!(descriptor.create_delete_policy, CreateDeletePolicy::Both);
        assert_eq!(descriptor.definitions.metrics.len(), 1);
        assert_eq!(descriptor.definitions.process_scans.len(), 1);

        let rt = descriptor.to_resource_type(&catalog.plugin);
        assert!(rt.singleton);
        assert_eq!(rt.definitions().metrics[0].name, "threads.busy");
    }

    #[test]
    fn parent_plugin_defaults_to_catalog_plugin() {
        let descriptor = TypeDescriptor {
            name: "Connector".into(),
            category: ResourceCategory::Service,
            description: None,
            subcategory: None,
            singleton: false,
            supports_manual_add: false,
            create_delete_policy: CreateDeletePolicy::Neither,
            creation_data: CreationDataType::Configuration,
            parents: vec![
                ParentRef { name: "Tomcat Server".into(), plugin: None },
                ParentRef { name: "JBossAS Server".into(), plugin: Some("jboss-as".into()) },
            ],
            definitions: TypeDefinitions::default(),
        };

        let keys: Vec<TypeKey> = descriptor.parent_keys("tomcat").collect();
        assert_eq!(
            keys,
            vec![
                TypeKey::new("Tomcat Server", "tomcat"),
                TypeKey::new("JBossAS Server", "jboss-as"),
            ]
        );
    }
}

//! Type catalog command handlers.

use serde::Serialize;
use tabled::Tabled;

use fleetwatch_core::ResourceType;

use crate::cli::{GlobalOpts, TypesArgs, TypesCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Row types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct TypeEntry {
    name: String,
    plugin: String,
    category: String,
    singleton: bool,
    supports_manual_add: bool,
    create_delete_policy: String,
    parents: Vec<String>,
    children: Vec<String>,
}

#[derive(Tabled)]
struct TypeRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Plugin")]
    plugin: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Singleton")]
    singleton: String,
    #[tabled(rename = "Parents")]
    parents: String,
}

impl TypeEntry {
    fn new(resource_type: &ResourceType, parents: Vec<String>, children: Vec<String>) -> Self {
        Self {
            name: resource_type.name().to_owned(),
            plugin: resource_type.plugin().to_owned(),
            category: resource_type.category.to_string(),
            singleton: resource_type.singleton,
            supports_manual_add: resource_type.supports_manual_add,
            create_delete_policy: resource_type.create_delete_policy.to_string(),
            parents,
            children,
        }
    }
}

fn to_row(entry: &TypeEntry) -> TypeRow {
    TypeRow {
        name: entry.name.clone(),
        plugin: entry.plugin.clone(),
        category: entry.category.clone(),
        singleton: if entry.singleton { "yes" } else { "" }.into(),
        parents: entry.parents.join(", "),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: TypesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        TypesCommand::List { catalogs, plugin } => {
            let cfg = util::load_config()?;
            let paths = util::catalog_paths(&catalogs, &cfg)?;
            let graph = util::build_graph(&paths)?;

            let types = match plugin.as_deref() {
                Some(plugin) => graph.types_for_plugin(plugin),
                None => graph.all_types(),
            };
            let entries: Vec<TypeEntry> = types
                .iter()
                .map(|t| {
                    let parents = graph.parents_of(t.key()).iter().map(|p| p.key().to_string()).collect();
                    let children = graph.children_of(t.key()).iter().map(|c| c.key().to_string()).collect();
                    TypeEntry::new(t, parents, children)
                })
                .collect();

            let out = output::render_list(&global.output, &entries, to_row, |e| {
                format!("{}@{}", e.name, e.plugin)
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

//! Shared helpers for command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use fleetwatch_config::Config;
use fleetwatch_core::TypeGraph;

use crate::cli::CatalogArgs;
use crate::error::CliError;

/// Load the effective config (defaults, file, `FLEETWATCH_*`).
pub fn load_config() -> Result<Config, CliError> {
    Ok(fleetwatch_config::load_config()?)
}

/// Catalog files from `--catalog`, falling back to `agent.plugin_catalogs`.
pub fn catalog_paths(args: &CatalogArgs, cfg: &Config) -> Result<Vec<PathBuf>, CliError> {
    let paths = if args.catalogs.is_empty() {
        cfg.agent.plugin_catalogs.clone()
    } else {
        args.catalogs.clone()
    };
    if paths.is_empty() {
        return Err(CliError::NoCatalogs {
            config_path: fleetwatch_config::config_path().display().to_string(),
        });
    }
    Ok(paths)
}

/// Build a type graph from catalog files.
///
/// Every type of every catalog is registered before any edge, so a
/// catalog may name parents declared by a catalog loaded after it.
pub fn build_graph(paths: &[PathBuf]) -> Result<Arc<TypeGraph>, CliError> {
    let catalogs = fleetwatch_config::load_catalogs(paths)?;
    let graph = TypeGraph::new();
    for catalog in &catalogs {
        for descriptor in &catalog.types {
            graph.register_type(descriptor.to_resource_type(&catalog.plugin));
        }
    }
    for catalog in &catalogs {
        graph.register_catalog(catalog)?;
    }
    tracing::debug!(
        catalogs = catalogs.len(),
        types = graph.len(),
        "built type graph"
    );
    Ok(Arc::new(graph))
}


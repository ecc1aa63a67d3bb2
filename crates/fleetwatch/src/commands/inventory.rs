//! Inventory command handlers.

use std::path::PathBuf;

use serde::Serialize;
use tabled::Tabled;

use fleetwatch_core::persistence;
use fleetwatch_core::{
    AvailabilityStatus, FileInventoryStore, InventoryStatus, InventoryStore, ResourceId,
    RestoreOutcome,
};

use crate::cli::{GlobalOpts, InventoryArgs, InventoryCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Row types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct InventoryEntry {
    id: ResourceId,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<ResourceId>,
    depth: usize,
    key: String,
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
    status: InventoryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    availability: Option<AvailabilityStatus>,
}

#[derive(Tabled)]
struct InventoryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Server ID")]
    server_id: String,
    #[tabled(rename = "Availability")]
    availability: String,
}

fn row_builder(color: bool) -> impl Fn(&InventoryEntry) -> InventoryRow {
    move |e| InventoryRow {
        name: format!("{}{}", "  ".repeat(e.depth), e.name),
        resource_type: e.resource_type.clone(),
        key: e.key.clone(),
        status: output::paint_status(e.status, color),
        server_id: e.server_id.map(|id| id.to_string()).unwrap_or_default(),
        availability: e.availability.map(|a| a.to_string()).unwrap_or_default(),
    }
}

// ── Tree walk ───────────────────────────────────────────────────────

/// Depth-first, parents before children, siblings in insertion order.
fn flatten(outcome: &RestoreOutcome) -> Vec<InventoryEntry> {
    let tree = &outcome.tree;
    let mut entries = Vec::with_capacity(tree.len());
    let Some(root) = tree.root() else {
        return entries;
    };

    let mut stack = vec![(root, 0usize)];
    while let Some((id, depth)) = stack.pop() {
        let Some(resource) = tree.get(id) else {
            continue;
        };
        stack.extend(resource.children().iter().rev().map(|c| (*c, depth + 1)));
        entries.push(InventoryEntry {
            id,
            parent: resource.parent(),
            depth,
            key: resource.key.clone(),
            name: resource.name.clone(),
            resource_type: resource.type_key().to_string(),
            status: resource.status,
            server_id: resource.server_id,
            availability: outcome.availability.get(&id).copied(),
        });
    }
    entries
}

fn parse_status(raw: &str) -> Result<InventoryStatus, CliError> {
    raw.to_ascii_uppercase()
        .parse()
        .map_err(|_| CliError::Validation {
            field: "status".into(),
            reason: format!("'{raw}' is not one of new, committed, ignored"),
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: InventoryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        InventoryCommand::Show {
            catalogs,
            file,
            status,
        } => {
            let status = status.as_deref().map(parse_status).transpose()?;
            let cfg = util::load_config()?;
            let path: PathBuf = file.unwrap_or_else(|| cfg.inventory_path());
            let paths = util::catalog_paths(&catalogs, &cfg)?;
            let graph = util::build_graph(&paths)?;

            let store = FileInventoryStore::new(&path);
            let bytes = store.load()?.ok_or(CliError::NoInventory { path })?;
            let outcome = persistence::restore(&bytes, &graph)?;

            for failure in &outcome.failures {
                output::print_warning(
                    &format!(
                        "dropped '{}' ({}) with {} resource(s): {}",
                        failure.key, failure.resource_type, failure.skipped, failure.error
                    ),
                    global.quiet,
                );
            }

            let mut entries = flatten(&outcome);
            if let Some(status) = status {
                entries.retain(|e| e.status == status);
            }

            let color = output::should_color(&global.color);
            let out = output::render_list(&global.output, &entries, row_builder(color), |e| {
                e.id.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_is_case_insensitive() {
        assert_eq!(parse_status("committed").unwrap(), InventoryStatus::Committed);
        assert_eq!(parse_status("New").unwrap(), InventoryStatus::New);
        assert!(matches!(
            parse_status("gone"),
            Err(CliError::Validation { .. })
        ));
    }
}

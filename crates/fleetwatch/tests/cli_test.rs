//! Integration tests for the `fleetwatch` CLI binary.
//!
//! These tests cover argument parsing, help output, shell completions,
//! catalog listing and inventory display against files written to a
//! temporary directory.
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

use fleetwatch_core::{
    AvailabilityStatus, PluginCatalog, Resource, ResourceTree, TypeGraph, TypeKey, persistence,
};

// ── Helpers ─────────────────────────────────────────────────────────

const CATALOG: &str = r#"
plugin = "tomcat"

[[types]]
name = "Linux"
category = "platform"

[[types]]
name = "Tomcat Server"
category = "server"
supports_manual_add = true
parents = [{ name = "Linux" }]

[[types]]
name = "Web Application"
parents = [{ name = "Tomcat Server" }]
"#;

/// Build a [`Command`] for the `fleetwatch` binary with env isolation.
///
/// Points the config file at a nonexistent path and clears `FLEETWATCH_*`
/// overrides so tests never touch the user's real configuration.
fn fleetwatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("fleetwatch");
    cmd.env("HOME", "/tmp/fleetwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/fleetwatch-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/fleetwatch-cli-test-nonexistent")
        .env(
            "FLEETWATCH_CONFIG",
            "/tmp/fleetwatch-cli-test-nonexistent/config.toml",
        )
        .env_remove("FLEETWATCH_OUTPUT")
        .env_remove("FLEETWATCH_AGENT__NAME")
        .env_remove("FLEETWATCH_AGENT__DATA_DIR")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("tomcat.toml");
    std::fs::write(&path, CATALOG).unwrap();
    path
}

/// Linux host with a committed Tomcat server holding one web application.
fn write_inventory(dir: &Path) -> PathBuf {
    let catalog: PluginCatalog = toml::from_str(CATALOG).unwrap();
    let graph = TypeGraph::new();
    graph.register_catalog(&catalog).unwrap();
    let resolve = |name: &str| graph.resolve(&TypeKey::new(name, "tomcat")).unwrap();

    let tree = ResourceTree::new();
    let root = tree.set_root(Resource::new("host-1", "host-1", resolve("Linux")));
    let server = tree
        .attach(
            Resource::new("/opt/tomcat", "Tomcat (8080)", resolve("Tomcat Server")),
            root,
        )
        .unwrap();
    tree.attach(
        Resource::new("/shop", "shop", resolve("Web Application")),
        server,
    )
    .unwrap();
    tree.commit(server, 501).unwrap();

    let availability = HashMap::from([(server, AvailabilityStatus::Up)]);
    let bytes = persistence::snapshot(&tree, &availability).unwrap();
    let path = dir.join("inventory.json");
    std::fs::write(&path, bytes).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = fleetwatch_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    fleetwatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("type catalogs")
            .and(predicate::str::contains("types"))
            .and(predicate::str::contains("inventory"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    fleetwatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleetwatch"));
}

#[test]
fn test_completions_zsh() {
    fleetwatch_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_invalid_subcommand() {
    let output = fleetwatch_cmd().arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

// ── Types ───────────────────────────────────────────────────────────

#[test]
fn test_types_list_without_catalogs_is_usage_error() {
    let output = fleetwatch_cmd().args(["types", "list"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("catalog"), "Expected catalog hint:\n{text}");
}

#[test]
fn test_types_list_plain() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    fleetwatch_cmd()
        .args(["types", "list", "-o", "plain", "--catalog"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Linux@tomcat")
                .and(predicate::str::contains("Tomcat Server@tomcat"))
                .and(predicate::str::contains("Web Application@tomcat")),
        );
}

#[test]
fn test_types_list_json_has_parents() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let output = fleetwatch_cmd()
        .args(["types", "list", "-o", "json", "--catalog"])
        .arg(&catalog)
        .output()
        .unwrap();
    assert!(output.status.success());
    let types: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let server = types
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "Tomcat Server")
        .unwrap();
    assert_eq!(server["parents"], serde_json::json!(["Linux@tomcat"]));
    assert_eq!(server["children"], serde_json::json!(["Web Application@tomcat"]));
}

#[test]
fn test_types_list_unknown_parent_is_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        "plugin = \"jboss\"\n[[types]]\nname = \"JBoss\"\nparents = [{ name = \"Nope\" }]\n",
    )
    .unwrap();
    let output = fleetwatch_cmd()
        .args(["types", "list", "--catalog"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
}

// ── Inventory ───────────────────────────────────────────────────────

#[test]
fn test_inventory_show_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let output = fleetwatch_cmd()
        .args(["inventory", "show", "--catalog"])
        .arg(&catalog)
        .arg("--file")
        .arg(dir.path().join("absent.json"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(combined_output(&output).contains("absent.json"));
}

#[test]
fn test_inventory_show_json() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let inventory = write_inventory(dir.path());
    let output = fleetwatch_cmd()
        .args(["inventory", "show", "-o", "json", "--catalog"])
        .arg(&catalog)
        .arg("--file")
        .arg(&inventory)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let entries: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["host-1", "Tomcat (8080)", "shop"]);
    assert_eq!(entries[1]["status"], "COMMITTED");
    assert_eq!(entries[1]["server_id"], 501);
    assert_eq!(entries[1]["availability"], "UP");
    assert_eq!(entries[2]["depth"], 2);
}

#[test]
fn test_inventory_show_status_filter() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let inventory = write_inventory(dir.path());
    let output = fleetwatch_cmd()
        .args(["inventory", "show", "-o", "plain", "--status", "committed"])
        .arg("--catalog")
        .arg(&catalog)
        .arg("--file")
        .arg(&inventory)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 1);
}

#[test]
fn test_inventory_show_reports_dropped_subtree() {
    let dir = tempfile::tempdir().unwrap();
    let inventory = write_inventory(dir.path());
    // Same plugin without the web application type.
    let trimmed = dir.path().join("trimmed.toml");
    let cut = CATALOG
        .find("[[types]]\nname = \"Web Application\"")
        .unwrap();
    std::fs::write(&trimmed, &CATALOG[..cut]).unwrap();

    let output = fleetwatch_cmd()
        .args(["inventory", "show", "-o", "plain", "--catalog"])
        .arg(&trimmed)
        .arg("--file")
        .arg(&inventory)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("/shop"), "Expected dropped-subtree warning:\n{stderr}");
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 2);
}

#[test]
fn test_inventory_show_rejects_garbage() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(dir.path());
    let path = dir.path().join("inventory.json");
    std::fs::write(&path, b"not json").unwrap();
    let output = fleetwatch_cmd()
        .args(["inventory", "show", "--catalog"])
        .arg(&catalog)
        .arg("--file")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(6));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_env() {
    fleetwatch_cmd()
        .args(["config", "path"])
        .env("FLEETWATCH_CONFIG", "/tmp/elsewhere/fleetwatch.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/elsewhere/fleetwatch.toml"));
}

#[test]
fn test_config_show_applies_env_overrides() {
    fleetwatch_cmd()
        .args(["config", "show"])
        .env("FLEETWATCH_DISCOVERY__MAX_PARALLEL_PROBES", "3")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_parallel_probes = 3"));
}

#[test]
fn test_config_show_rejects_invalid_values() {
    let output = fleetwatch_cmd()
        .args(["config", "show"])
        .env("FLEETWATCH_DISCOVERY__MAX_PARALLEL_PROBES", "0")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(5));
}

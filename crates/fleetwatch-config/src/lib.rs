//! Shared configuration for fleetwatch binaries.
//!
//! TOML configuration layered under `FLEETWATCH_` environment variables,
//! plugin catalog loading, and translation to
//! `fleetwatch_core::AgentSettings`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleetwatch_core::{AgentSettings, PluginCatalog, RemovalPolicy};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "FLEETWATCH_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("cannot parse catalog {path}: {reason}")]
    Catalog { path: PathBuf, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub discovery: DiscoverySection,

    #[serde(default)]
    pub availability: AvailabilitySection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AgentSection {
    /// Origin id stamped on every availability report.
    #[serde(default = "default_name")]
    pub name: String,

    /// Where the inventory lives. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Inventory file name, relative to `data_dir` unless absolute.
    #[serde(default = "default_inventory_file")]
    pub inventory_file: PathBuf,

    /// Plugin catalog descriptors (TOML or JSON).
    #[serde(default)]
    pub plugin_catalogs: Vec<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: None,
            inventory_file: default_inventory_file(),
            plugin_catalogs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoverySection {
    /// Successful runs a non-committed resource may be missing from before
    /// it is removed.
    #[serde(default = "default_missed_cycles")]
    pub missed_cycles_before_removal: u32,

    #[serde(default = "default_parallel_probes")]
    pub max_parallel_probes: usize,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            missed_cycles_before_removal: default_missed_cycles(),
            max_parallel_probes: default_parallel_probes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AvailabilitySection {
    /// Every Nth report is full; `0` turns periodic full reports off.
    #[serde(default = "default_full_report_interval")]
    pub full_report_interval: u32,
}

impl Default for AvailabilitySection {
    fn default() -> Self {
        Self {
            full_report_interval: default_full_report_interval(),
        }
    }
}

fn default_name() -> String {
    "fleetwatch-agent".into()
}
fn default_inventory_file() -> PathBuf {
    PathBuf::from("inventory.json")
}
fn default_missed_cycles() -> u32 {
    1
}
fn default_parallel_probes() -> usize {
    8
}
fn default_full_report_interval() -> u32 {
    10
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.name.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "agent.name".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.discovery.max_parallel_probes == 0 {
            return Err(ConfigError::Validation {
                field: "discovery.max_parallel_probes".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.discovery.missed_cycles_before_removal == 0 {
            return Err(ConfigError::Validation {
                field: "discovery.missed_cycles_before_removal".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Effective data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.agent.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Effective inventory file path.
    pub fn inventory_path(&self) -> PathBuf {
        self.data_dir().join(&self.agent.inventory_file)
    }

    /// Translate into the core's runtime settings.
    pub fn to_agent_settings(&self) -> AgentSettings {
        AgentSettings {
            origin_id: self.agent.name.clone(),
            removal: RemovalPolicy {
                missed_cycles_before_removal: self.discovery.missed_cycles_before_removal,
            },
            max_parallel_probes: self.discovery.max_parallel_probes,
            full_report_interval: self.availability.full_report_interval,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "fleetwatch", "fleetwatch")
}

/// Resolve the config file path: `FLEETWATCH_CONFIG`, then platform
/// conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("data"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fleetwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path` if it exists, then `FLEETWATCH_*` variables
/// (nested keys split on `__`, e.g. `FLEETWATCH_DISCOVERY__MAX_PARALLEL_PROBES`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FLEETWATCH_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Plugin catalogs ─────────────────────────────────────────────────

/// Read a plugin catalog. `.json` files are parsed as JSON, anything else
/// as TOML.
pub fn load_catalog(path: &Path) -> Result<PluginCatalog, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    let parsed = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    } else {
        toml::from_str(&text).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| ConfigError::Catalog {
        path: path.to_path_buf(),
        reason,
    })
}

/// Read every catalog listed, in order.
pub fn load_catalogs(paths: &[PathBuf]) -> Result<Vec<PluginCatalog>, ConfigError> {
    paths.iter().map(|p| load_catalog(p)).collect()
}

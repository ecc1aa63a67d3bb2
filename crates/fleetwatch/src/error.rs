//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use fleetwatch_config::ConfigError;
use fleetwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFIG: i32 = 5;
    pub const DATA: i32 = 6;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Inputs ───────────────────────────────────────────────────────

    #[error("No plugin catalogs given")]
    #[diagnostic(
        code(fleetwatch::no_catalogs),
        help(
            "Pass one or more --catalog <FILE>, or list them under\n\
             agent.plugin_catalogs in {config_path}"
        )
    )]
    NoCatalogs { config_path: String },

    #[error("Inventory file not found: {}", path.display())]
    #[diagnostic(
        code(fleetwatch::no_inventory),
        help("Pass --file <FILE>, or check agent.data_dir and agent.inventory_file.")
    )]
    NoInventory { path: PathBuf },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(fleetwatch::not_found))]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleetwatch::validation))]
    Validation { field: String, reason: String },

    // ── Catalogs / inventory ─────────────────────────────────────────

    #[error("Unknown resource type '{name}' from plugin '{plugin}'")]
    #[diagnostic(
        code(fleetwatch::unknown_type),
        help("Load the catalog that declares it, e.g. --catalog <{plugin} catalog>.")
    )]
    UnknownType { name: String, plugin: String },

    #[error("Inventory file is unreadable: {reason}")]
    #[diagnostic(
        code(fleetwatch::malformed_inventory),
        help("The file is not a fleetwatch inventory snapshot, or was written by a newer version.")
    )]
    MalformedInventory { reason: String },

    #[error("{message}")]
    #[diagnostic(code(fleetwatch::core))]
    Core { message: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(fleetwatch::config),
        help("Check the config file (fleetwatch config path) and FLEETWATCH_* variables.")
    )]
    Config(#[from] ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(fleetwatch::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoCatalogs { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::NoInventory { .. } | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Config(_) => exit_code::CONFIG,
            Self::UnknownType { .. } | Self::MalformedInventory { .. } => exit_code::DATA,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownType { name, plugin } => CliError::UnknownType { name, plugin },

            CoreError::TypeCycle { parent, child } => CliError::Validation {
                field: "catalog".into(),
                reason: format!("{parent} -> {child} would make the type graph cyclic"),
            },

            CoreError::MalformedSnapshot { reason } => CliError::MalformedInventory { reason },

            CoreError::UnknownResource { id } => CliError::NotFound {
                resource_type: "resource".into(),
                identifier: id.to_string(),
            },

            CoreError::Io(e) => CliError::Io(e),

            other => CliError::Core {
                message: other.to_string(),
            },
        }
    }
}

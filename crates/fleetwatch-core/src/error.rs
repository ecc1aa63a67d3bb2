// ── Core error types ──
//
// Errors raised by the inventory core. Collaborator failures (probes,
// report sink, snapshot store) are wrapped into domain variants so callers
// never match on a collaborator's own error type.

use thiserror::Error;

use crate::model::{InventoryStatus, ResourceId, TypeKey};

/// Error type returned by collaborators (probes, report sinks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Type graph ───────────────────────────────────────────────────
    #[error("Unknown resource type '{name}' from plugin '{plugin}'")]
    UnknownType { name: String, plugin: String },

    #[error("Type edge {parent} -> {child} would introduce a cycle")]
    TypeCycle { parent: TypeKey, child: TypeKey },

    // ── Resource tree ────────────────────────────────────────────────
    #[error("Resource not found: {id}")]
    UnknownResource { id: ResourceId },

    #[error(
        "Singleton violation: parent {parent} already has a committed {type_name} ({plugin})"
    )]
    SingletonViolation {
        parent: ResourceId,
        type_name: String,
        plugin: String,
    },

    #[error("Parent {parent} already has a {resource_type} with key '{key}'")]
    DuplicateKey {
        parent: ResourceId,
        resource_type: TypeKey,
        key: String,
    },

    #[error("Resource type {resource_type} does not support manual add")]
    ManualAddUnsupported { resource_type: TypeKey },

    #[error("Resource {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ResourceId,
        from: InventoryStatus,
        to: InventoryStatus,
    },

    #[error("Resource tree invariant broken: {detail}")]
    ConcurrentModification { detail: String },

    // ── Persistence ──────────────────────────────────────────────────
    #[error("Malformed inventory snapshot: {reason}")]
    MalformedSnapshot { reason: String },

    #[error("Inventory store failed: {message}")]
    Store { message: String },

    // ── Collaborators ────────────────────────────────────────────────
    #[error("Discovery probe for {resource_type} under {parent} failed: {message}")]
    ProbeFailed {
        parent: ResourceId,
        resource_type: TypeKey,
        message: String,
    },

    #[error("Report sink rejected delivery: {message}")]
    Sink { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn unknown_type(key: &TypeKey) -> Self {
        Self::UnknownType {
            name: key.name.clone(),
            plugin: key.plugin.clone(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSnapshot {
            reason: reason.into(),
        }
    }
}

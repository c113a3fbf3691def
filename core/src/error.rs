//! Error types for schema resolution.
//!
//! Data-dependent problems with the input modules are never returned as
//! errors; they are reported as [`Finding`](crate::Finding)s. The errors here
//! cover misuse of the API, broken tree invariants and I/O while loading
//! configuration or serialized inputs.

use thiserror::Error;

use crate::statement::NodeId;

/// Errors that can occur while building or resolving a schema.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The resolution passes were invoked a second time on the same schema.
    #[error("Schema has already been processed.")]
    AlreadyProcessed,

    /// A node handle does not belong to the statement arena.
    #[error("unknown statement node: {0:?}")]
    UnknownNode(NodeId),

    /// A node expected to be attached to a parent has been detached.
    #[error("statement node is detached from its tree: {0:?}")]
    Detached(NodeId),

    /// A parsed unit cannot be registered (bad root, unknown keyword, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`ResolveError`].
pub type Result<T> = std::result::Result<T, ResolveError>;

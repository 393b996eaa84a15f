//! Error types for the resource graph.

use thiserror::Error;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur while declaring or rendering the graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Duplicate logical id: {0}")]
    DuplicateLogicalId(String),

    #[error("Invalid logical id: {0}")]
    InvalidLogicalId(String),

    #[error("Unknown dependency {dependency} declared by {resource}")]
    UnknownDependency { resource: String, dependency: String },

    #[error("Duplicate output key: {0}")]
    DuplicateOutput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

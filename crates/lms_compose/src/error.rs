//! Error types for the composition module.

use thiserror::Error;

/// Result type alias for composition operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors that can occur while composing the stack.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error("Invalid input {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Config file error: {0}")]
    ConfigFile(String),

    #[error("Graph error: {0}")]
    Graph(#[from] lms_graph::GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cgextract operations
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph construction failed: {0}")]
    GraphConstruction(String),

    #[error("Failed to write output chunk {chunk} to {}: {source}", path.display())]
    Serialization {
        chunk: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractError>;

/// Failure to resolve metadata for a single edge.
///
/// Never escapes the graph walker: the affected field degrades to its raw form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("context entry refers to unknown method {0}")]
    UnknownMethod(u32),

    #[error("instruction {index} of {method} has no bytecode offset")]
    MissingOffset { method: String, index: usize },

    #[error("unsupported context kind '{0}'")]
    UnsupportedContext(String),
}

//! Error types for dsl-typer

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dsl-typer operations
pub type Result<T> = std::result::Result<T, TyperError>;

/// Main error type for signature extraction and solver analysis
#[derive(Error, Debug)]
pub enum TyperError {
    #[error("Source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TyperError {
    pub(crate) fn parse(line: usize, column: usize, message: impl Into<String>) -> Self {
        TyperError::ParseError {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Read a text file, mapping a missing file to `SourceNotFound`.
pub fn read_source(path: &std::path::Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(TyperError::SourceNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(TyperError::Io(e)),
    }
}

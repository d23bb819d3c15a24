//! Common error types used throughout tagvault.
//!
//! This module provides a unified error type covering the failure cases of
//! the pipeline: unresolvable paths, files vanishing mid-batch, extraction
//! backend failures, cache access problems, and invalid caller input.

use std::path::PathBuf;

/// Common error type for tagvault.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No filesystem variant of the input path exists.
    #[error("Path could not be resolved: {0}")]
    PathUnresolved(String),

    /// The file existed during resolution but was gone at extraction time.
    #[error("File missing at extraction time: {0}")]
    FileMissing(PathBuf),

    /// The extraction backend failed or returned malformed data.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Invalid input was provided (rating or orientation out of domain).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A cache store operation failed. Callers treat this as a miss.
    #[error("Cache access failed: {0}")]
    Cache(String),

    /// A required external tool is not installed.
    #[error("Required tool not found: {0}")]
    ToolNotFound(String),

    /// Output of an external tool could not be parsed.
    #[error("Failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new Extraction error.
    pub fn extraction<S: Into<String>>(msg: S) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Cache error.
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a new ToolNotFound error.
    pub fn tool_not_found<S: Into<String>>(name: S) -> Self {
        Self::ToolNotFound(name.into())
    }

    /// Create a new Parse error for an external tool's output.
    pub fn parse_error<S: Into<String>, M: Into<String>>(tool: S, message: M) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

//! Error types shared across DCL crates

use thiserror::Error;

/// Result type alias for shared DCL operations
pub type Result<T> = std::result::Result<T, DclError>;

/// Main error type for DCL shared utilities
#[derive(Error, Debug)]
pub enum DclError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidEnv {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl DclError {
    pub fn logging(msg: impl Into<String>) -> Self {
        Self::Logging(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

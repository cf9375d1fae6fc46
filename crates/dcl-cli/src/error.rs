//! Error types for the DCL CLI
//!
//! User-facing errors with actionable messages. Input problems are raised
//! before any network activity; per-record remote failures never surface
//! here (they land in the submission result or the discrepancy log).

use crate::submission::SubmissionResult;
use dcl_common::DclError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Comprehensive error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Input file is malformed or unsupported
    #[error("Invalid input: {0}")]
    UserInput(String),

    /// Dataset repeats submitter ids
    #[error("File contains duplicate submitter_ids: {}. submitter_ids must be unique within a node.", .ids.join(", "))]
    DuplicateIdentifier { ids: Vec<String> },

    /// Submission run aborted; the partial result travels with the error
    #[error(transparent)]
    Submission(#[from] SubmitError),

    /// Index has no record for the guid
    #[error("Index client could not find record for GUID: {0}")]
    RecordNotFound(String),

    /// Remote API answered with an error payload
    #[error("Server error: {0}")]
    Api(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("Network request failed: {0}. Check your connection and the commons endpoint.")]
    Http(#[from] reqwest::Error),

    /// Delimited file could not be read or written
    #[error("Tabular data error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or command-line flags.")]
    Config(String),

    /// Shared-crate failure (env parsing, logging)
    #[error(transparent)]
    Common(#[from] DclError),

    /// Generic anyhow error wrapper
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn user_input(msg: impl Into<String>) -> Self {
        Self::UserInput(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn record_not_found(guid: impl Into<String>) -> Self {
        Self::RecordNotFound(guid.into())
    }
}

/// Unrecoverable conditions that abort a submission run
#[derive(Error, Debug)]
pub enum SubmitError {
    /// The server keeps overloading even on single-record chunks
    #[error("Submission is timing out at row {offset} even with a chunk size of 1. Please contact the commons helpdesk.")]
    Exhausted {
        offset: usize,
        partial: Box<SubmissionResult>,
    },

    /// Every entity in the chunk was valid and the chunk still failed
    #[error("Chunk at row {offset} failed although all entities were valid ({}). Please check your data for correct file encoding, special characters, or duplicate submitter_ids or ids.", .submitter_ids.join(", "))]
    FatalInconsistency {
        offset: usize,
        submitter_ids: Vec<String>,
        partial: Box<SubmissionResult>,
    },
}

impl SubmitError {
    /// Everything recorded before the run aborted
    pub fn partial(&self) -> &SubmissionResult {
        match self {
            SubmitError::Exhausted { partial, .. } => partial,
            SubmitError::FatalInconsistency { partial, .. } => partial,
        }
    }
}

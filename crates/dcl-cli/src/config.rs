//! Configuration management for the DCL CLI
//!
//! Defaults, overlaid by `DCL_*` environment variables, overlaid by
//! command-line flags.

use crate::api::client::{DEFAULT_API_TIMEOUT_SECS, DEFAULT_ENDPOINT};
use crate::auth::Credentials;
use crate::error::{CliError, Result};
use crate::submission::DEFAULT_CHUNK_SIZE;
use crate::verify::{parse_delimiter, DEFAULT_CONCURRENCY, DEFAULT_DELIMITER, MAX_CONCURRENCY};
use chrono::{DateTime, Utc};
use dcl_common::env;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Environment Variables
// ============================================================================

pub const ENV_ENDPOINT: &str = "DCL_ENDPOINT";
pub const ENV_CONCURRENCY: &str = "DCL_CONCURRENCY";
pub const ENV_DELIMITER: &str = "DCL_DELIMITER";
pub const ENV_CHUNK_SIZE: &str = "DCL_CHUNK_SIZE";
pub const ENV_ROW_OFFSET: &str = "DCL_ROW_OFFSET";
pub const ENV_API_TIMEOUT_SECS: &str = "DCL_API_TIMEOUT_SECS";
pub const ENV_ACCESS_TOKEN: &str = "DCL_ACCESS_TOKEN";
pub const ENV_CREDENTIALS: &str = "DCL_CREDENTIALS";

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Commons endpoint, without trailing slash
    pub endpoint: String,

    /// Maximum concurrent index requests during verification
    pub concurrency: usize,

    /// Manifest column delimiter
    pub delimiter: u8,

    /// Initial rows per submission batch
    pub chunk_size: usize,

    /// Rows skipped before the first batch
    pub row_offset: usize,

    /// Per-request timeout
    pub api_timeout_secs: u64,

    /// Access token for the submission API
    #[serde(skip_serializing)]
    pub access_token: Option<String>,

    /// API key file exchanged for an access token
    pub credentials: Option<PathBuf>,
}

impl Config {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            delimiter: DEFAULT_DELIMITER,
            chunk_size: DEFAULT_CHUNK_SIZE,
            row_offset: 0,
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
            access_token: None,
            credentials: None,
        }
    }

    /// Load config from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Some(endpoint) = env::parse_var::<String>(ENV_ENDPOINT)? {
            config.endpoint = endpoint;
        }
        if let Some(concurrency) = env::parse_var(ENV_CONCURRENCY)? {
            config.concurrency = concurrency;
        }
        // not trimmed: a literal tab is a valid value
        if let Ok(delimiter) = std::env::var(ENV_DELIMITER) {
            config.delimiter = parse_delimiter(&delimiter)?;
        }
        if let Some(chunk_size) = env::parse_var(ENV_CHUNK_SIZE)? {
            config.chunk_size = chunk_size;
        }
        if let Some(row_offset) = env::parse_var(ENV_ROW_OFFSET)? {
            config.row_offset = row_offset;
        }
        if let Some(timeout) = env::parse_var(ENV_API_TIMEOUT_SECS)? {
            config.api_timeout_secs = timeout;
        }
        if let Some(token) = env::parse_var::<String>(ENV_ACCESS_TOKEN)? {
            config.access_token = Some(token);
        }
        if let Some(path) = env::parse_var::<String>(ENV_CREDENTIALS)? {
            config.credentials = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Check the numeric limits
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(CliError::config("endpoint must not be empty"));
        }
        if self.concurrency == 0 {
            return Err(CliError::config("concurrency must be at least 1"));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(CliError::config(format!(
                "concurrency must be at most {}",
                MAX_CONCURRENCY
            )));
        }
        if self.chunk_size == 0 {
            return Err(CliError::config("chunk size must be at least 1"));
        }
        Ok(())
    }

    /// Set the endpoint
    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
    }

    /// Get the endpoint
    pub fn endpoint(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Credentials for the submission API; a token wins over a key file
    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::resolve(self.access_token.as_deref(), self.credentials.as_deref())
    }

    /// `verify-manifest-errors-{unix_ts}.log` in the working directory
    pub fn default_verify_output(now: DateTime<Utc>) -> PathBuf {
        PathBuf::from(format!("verify-manifest-errors-{}.log", now.timestamp()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

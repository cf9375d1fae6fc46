//! API request and response types

use crate::error::CliError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// `PROGRAM-PROJECT` pair naming a project in the commons
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectId {
    pub program: String,
    pub project: String,
}

impl FromStr for ProjectId {
    type Err = CliError;

    /// Split on the first `-`; the project part may contain further hyphens
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('-') {
            Some((program, project)) if !program.is_empty() && !project.is_empty() => Ok(Self {
                program: program.to_string(),
                project: project.to_string(),
            }),
            _ => Err(CliError::user_input(format!(
                "project id '{}' must look like PROGRAM-PROJECT",
                s
            ))),
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.program, self.project)
    }
}

/// Export payload format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    #[default]
    Json,
    Tsv,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Tsv => "tsv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export response body
#[derive(Debug, Clone, PartialEq)]
pub enum ExportPayload {
    Json(Value),
    Tsv(String),
}

/// GraphQL request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
}

/// API key file as downloaded from the commons profile page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub api_key: String,
    pub key_id: String,
}

/// Token exchange response
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

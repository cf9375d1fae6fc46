//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod dictionary;
pub mod export;
pub mod program;
pub mod query;
pub mod records;
pub mod schema;
pub mod submit;
pub mod verify;

use crate::error::{CliError, Result};
use serde_json::Value;
use std::path::Path;

/// Read a JSON document given on the command line
pub(crate) fn read_json_file(file: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(file).map_err(|e| {
        CliError::user_input(format!("cannot read '{}': {}", file.display(), e))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        CliError::user_input(format!("'{}' is not valid JSON: {}", file.display(), e))
    })
}

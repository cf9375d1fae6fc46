//! `dcl query` command implementation
//!
//! Runs a GraphQL query against the submission service.

use crate::api::SubmissionClient;
use crate::config::Config;
use crate::error::{CliError, Result};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Run `query`, reading it from a file when `query` names one
pub async fn run(config: &Config, query: &str, variables: Option<&str>, max_tries: u32) -> Result<()> {
    let query = load_query(query)?;
    let variables = variables.map(parse_variables).transpose()?;

    let client = SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())?;
    debug!(max_tries, "Running GraphQL query");
    let data = client.query(&query, variables, max_tries).await?;

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

/// Query text given inline or as a path to a `.graphql` file
fn load_query(query: &str) -> Result<String> {
    let path = Path::new(query);
    if path.is_file() {
        return Ok(std::fs::read_to_string(path)?);
    }
    Ok(query.to_string())
}

/// Variables as a JSON object
fn parse_variables(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| CliError::user_input(format!("--variables is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(CliError::user_input("--variables must be a JSON object"));
    }
    Ok(value)
}

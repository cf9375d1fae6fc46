//! `dcl submit-record` and `dcl delete-record` command implementations
//!
//! Single-record operations against one project.

use super::read_json_file;
use crate::api::{ProjectId, SubmissionClient};
use crate::config::Config;
use crate::error::Result;
use std::path::Path;

/// Submit the JSON record(s) in `file`
pub async fn submit(config: &Config, project_id: &str, file: &Path) -> Result<()> {
    let project: ProjectId = project_id.parse()?;
    let records = read_json_file(file)?;

    let client = SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())?;
    let response = client.submit_record(&project, &records).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Delete one entity by uuid
pub async fn delete(config: &Config, project_id: &str, id: &str) -> Result<()> {
    let project: ProjectId = project_id.parse()?;
    let client = SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())?;
    let response = client.delete_record(&project, id).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

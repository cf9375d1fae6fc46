//! `dcl export` command implementation
//!
//! Exports records by id or a whole node type as JSON or TSV, to stdout or
//! a file.

use crate::api::{ExportFormat, ExportPayload, ProjectId, SubmissionClient};
use crate::config::Config;
use crate::error::Result;
use colored::Colorize;
use std::path::Path;

/// Export specific records (comma separated ids)
pub async fn record(
    config: &Config,
    project_id: &str,
    ids: &str,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let project: ProjectId = project_id.parse()?;
    let client = SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())?;
    let payload = client.export_record(&project, ids, format).await?;
    emit(&payload, output)
}

/// Export every record of one node type
pub async fn node(
    config: &Config,
    project_id: &str,
    node_label: &str,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let project: ProjectId = project_id.parse()?;
    let client = SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())?;
    let payload = client.export_node(&project, node_label, format).await?;
    emit(&payload, output)
}

fn render(payload: &ExportPayload) -> Result<String> {
    Ok(match payload {
        ExportPayload::Json(value) => serde_json::to_string_pretty(value)?,
        ExportPayload::Tsv(text) => text.clone(),
    })
}

fn emit(payload: &ExportPayload, output: Option<&Path>) -> Result<()> {
    let text = render(payload)?;
    match output {
        Some(path) => {
            std::fs::write(path, text)?;
            println!("{} Output written to file: {}", "✓".green(), path.display());
        },
        None => println!("{}", text),
    }
    Ok(())
}

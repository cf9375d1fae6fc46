//! `dcl program` and `dcl project` command implementations
//!
//! Programs and projects are created from their JSON nodes and can only be
//! deleted once empty; the service answer is printed as returned.

use super::read_json_file;
use crate::api::{ProjectId, SubmissionClient};
use crate::config::Config;
use crate::error::{CliError, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

fn client(config: &Config) -> Result<SubmissionClient> {
    SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())
}

fn print_response(response: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

/// Create a program from the JSON node in `file`
pub async fn create_program(config: &Config, file: &Path) -> Result<()> {
    let program = read_json_file(file)?;
    info!(file = %file.display(), "Creating program");
    print_response(&client(config)?.create_program(&program).await?)
}

/// Delete an empty program
pub async fn delete_program(config: &Config, program: &str) -> Result<()> {
    let program = program.trim();
    if program.is_empty() {
        return Err(CliError::user_input("program name must not be empty"));
    }
    info!(program, "Deleting program");
    print_response(&client(config)?.delete_program(program).await?)
}

/// Create a project under `program` from the JSON node in `file`
pub async fn create_project(config: &Config, program: &str, file: &Path) -> Result<()> {
    let project = read_json_file(file)?;
    info!(program, file = %file.display(), "Creating project");
    print_response(&client(config)?.create_project(program, &project).await?)
}

/// Delete an empty project (`PROGRAM-PROJECT`)
pub async fn delete_project(config: &Config, project_id: &str) -> Result<()> {
    let project: ProjectId = project_id.parse()?;
    info!(project = %project, "Deleting project");
    print_response(&client(config)?.delete_project(&project).await?)
}

//! `dcl submit` command implementation
//!
//! Bulk-submits a CSV/TSV file to one project node in adaptive chunks.

use crate::api::{ProjectId, SubmissionClient};
use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::{CliError, Result};
use crate::progress;
use crate::submission::{ChunkSubmitter, SubmissionResult, SubmitBatch, SubmitOptions};
use colored::Colorize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// Submit `file` to `project_id` (`PROGRAM-PROJECT`)
pub async fn run(config: &Config, file: &Path, project_id: &str, report: Option<&Path>) -> Result<()> {
    config.validate()?;
    let project: ProjectId = project_id.parse()?;
    let dataset = Dataset::load(file)?;
    dataset.validate()?;

    println!(
        "{} Submitting {} with {} records.",
        "→".cyan(),
        file.display(),
        dataset.len()
    );

    let client = SubmissionClient::new(config.endpoint(), config.credentials()?, config.api_timeout())?;
    let options = SubmitOptions {
        chunk_size: config.chunk_size,
        row_offset: config.row_offset,
    };

    submit_dataset(client.for_project(project), &dataset, options, report).await?;
    Ok(())
}

/// Run a submission and report it, whether it completes or aborts
///
/// On abort the partial result is still printed and written to `report`
/// before the error is returned.
pub async fn submit_dataset<C: SubmitBatch>(
    client: C,
    dataset: &Dataset,
    options: SubmitOptions,
    report: Option<&Path>,
) -> Result<SubmissionResult> {
    let pb = progress::create_submission_progress(dataset.len() as u64, "Submitting records");
    let submitter = ChunkSubmitter::new(client, options).with_progress(pb.clone());
    let outcome = submitter.submit(dataset).await;
    pb.finish_and_clear();

    match outcome {
        Ok(result) => {
            print_summary(&result);
            if let Some(path) = report {
                write_report(path, &result)?;
            }
            Ok(result)
        },
        Err(CliError::Submission(e)) => {
            print_summary(e.partial());
            if let Some(path) = report {
                write_report(path, e.partial())?;
            }
            Err(e.into())
        },
        Err(e) => Err(e),
    }
}

fn print_summary(result: &SubmissionResult) {
    println!(
        "{} Successful records: {}",
        "✓".green(),
        result.unique_succeeded()
    );

    if result.invalid.is_empty() {
        println!("{} Failed invalid records: 0", "✓".green());
    } else {
        println!(
            "{} Failed invalid records: {}",
            "✗".red(),
            result.invalid.len()
        );
        for (submitter_id, message) in &result.invalid {
            println!("  {}: {}", submitter_id.yellow(), message);
        }
    }

    if !result.other.is_empty() {
        println!(
            "{} Unclassified responses: {}",
            "!".yellow(),
            result.other.len()
        );
    }
}

/// Write the full result as pretty JSON
pub fn write_report(path: &Path, result: &SubmissionResult) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)?;
    info!(report = %path.display(), "Submission report written");
    println!("Report saved: {}", path.display());
    Ok(())
}

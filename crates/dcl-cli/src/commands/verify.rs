//! `dcl verify` command implementation
//!
//! Checks every manifest row against the file index and appends the
//! discrepancies to an output log.

use crate::api::IndexClient;
use crate::config::Config;
use crate::error::Result;
use crate::progress;
use crate::verify::{
    read_manifest, Dispatcher, DiscrepancyReporter, RawRow, RecordFetcher, RowParsers, ScratchLog,
    VerifySummary,
};
use chrono::Utc;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Verify `manifest` against the index at the configured endpoint
pub async fn run(config: &Config, manifest: &Path, output: Option<PathBuf>) -> Result<()> {
    config.validate()?;
    let rows = read_manifest(manifest, config.delimiter)?;
    let output = output.unwrap_or_else(|| Config::default_verify_output(Utc::now()));

    println!(
        "{} Verifying {} records from {} against {}",
        "→".cyan(),
        rows.len(),
        manifest.display(),
        config.endpoint()
    );

    let fetcher = IndexClient::new(config.endpoint(), config.api_timeout())?;
    let started = Instant::now();
    let summary = verify_rows(
        fetcher,
        RowParsers::default(),
        config.concurrency,
        rows,
        &output,
    )
    .await?;

    let elapsed = started.elapsed().as_secs_f64();
    if summary.flagged_rows == 0 {
        println!(
            "{} All {} records match the index ({:.2}s)",
            "✓".green(),
            summary.rows,
            elapsed
        );
    } else {
        println!(
            "{} {} of {} records have discrepancies ({} missing from the index, {:.2}s)",
            "✗".red(),
            summary.flagged_rows,
            summary.rows,
            summary.missing_records,
            elapsed
        );
    }
    println!("Output: {}", output.display());

    Ok(())
}

/// Verify pre-read rows, appending discrepancy lines to `output`
///
/// Lines are collected in a scratch file and appended to `output` only once
/// the run completes.
pub async fn verify_rows<F: RecordFetcher>(
    fetcher: F,
    parsers: RowParsers,
    concurrency: usize,
    rows: Vec<RawRow>,
    output: &Path,
) -> Result<VerifySummary> {
    let dispatcher = Dispatcher::new(fetcher, parsers, concurrency)?;
    let scratch = ScratchLog::create(output)?;
    let mut reporter = DiscrepancyReporter::new(scratch.file()?);

    let spinner = progress::create_spinner("Verifying records...");
    let summary = dispatcher.run(rows, &mut reporter).await;
    spinner.finish_and_clear();
    let summary = summary?;

    reporter.finish()?;
    scratch.commit()?;
    Ok(summary)
}

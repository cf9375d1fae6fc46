//! Bounded-concurrency verification pipeline
//!
//! ```text
//!  producer ──queue──▶ consumer ──▶ fetch (≤ limit in flight) ──▶ consumer ──▶ reporter
//! ```
//!
//! One producer streams manifest rows in file order and finishes with a
//! `Done` sentinel. One consumer parses rows, starts their index fetches,
//! and compares and reports each result as it completes. A counting
//! semaphore is held only around the remote call, so it bounds outstanding
//! requests, not parsed rows. Output order follows fetch completion and is
//! not deterministic.

use crate::error::{CliError, Result};
use crate::verify::compare::{compare_record, Discrepancy};
use crate::verify::record::{IndexRecord, ManifestRow, RawRow, RowParsers};
use crate::verify::reporter::DiscrepancyReporter;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::io::Write;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, instrument};

/// Default cap on concurrent index requests
pub const DEFAULT_CONCURRENCY: usize = 24;

/// Largest accepted concurrency limit; the row queue holds twice as many
/// slots and must stay within the semaphore permit range
pub const MAX_CONCURRENCY: usize = Semaphore::MAX_PERMITS / 2;

/// Remote operation that looks a record up by guid
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    async fn fetch_record(&self, guid: &str) -> Result<IndexRecord>;
}

#[async_trait]
impl<T: RecordFetcher + ?Sized> RecordFetcher for std::sync::Arc<T> {
    async fn fetch_record(&self, guid: &str) -> Result<IndexRecord> {
        (**self).fetch_record(guid).await
    }
}

/// Counters of one verification run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    /// Manifest rows processed
    pub rows: usize,
    /// Rows whose record could not be fetched
    pub missing_records: usize,
    /// Rows with at least one discrepancy (missing records included)
    pub flagged_rows: usize,
    /// Lines written to the output log
    pub discrepancies: usize,
}

enum QueueItem {
    Row(RawRow),
    Done,
}

struct CheckedRow {
    raw: RawRow,
    expected: ManifestRow,
    outcome: Result<IndexRecord>,
}

/// Verifies manifest rows against the remote index
pub struct Dispatcher<F> {
    fetcher: F,
    parsers: RowParsers,
    concurrency_limit: usize,
}

impl<F: RecordFetcher> Dispatcher<F> {
    pub fn new(fetcher: F, parsers: RowParsers, concurrency_limit: usize) -> Result<Self> {
        if concurrency_limit == 0 {
            return Err(CliError::config("concurrency limit must be at least 1"));
        }
        if concurrency_limit > MAX_CONCURRENCY {
            return Err(CliError::config(format!(
                "concurrency limit must be at most {}, got {}",
                MAX_CONCURRENCY, concurrency_limit
            )));
        }
        Ok(Self {
            fetcher,
            parsers,
            concurrency_limit,
        })
    }

    /// Verify every row, writing discrepancies to `reporter`
    ///
    /// Per-row fetch failures become `no_record` lines; only a failing
    /// output sink aborts the run.
    #[instrument(skip_all, fields(rows = rows.len(), concurrency = self.concurrency_limit))]
    pub async fn run<W: Write>(
        &self,
        rows: Vec<RawRow>,
        reporter: &mut DiscrepancyReporter<W>,
    ) -> Result<VerifySummary> {
        let (tx, rx) = mpsc::channel(self.concurrency_limit.saturating_mul(2));

        let producer = async move {
            for row in rows {
                if tx.send(QueueItem::Row(row)).await.is_err() {
                    // consumer stopped early
                    return;
                }
            }
            let _ = tx.send(QueueItem::Done).await;
        };

        let ((), summary) = tokio::join!(producer, self.consume(rx, reporter));
        let summary = summary?;

        info!(
            rows = summary.rows,
            missing = summary.missing_records,
            flagged = summary.flagged_rows,
            discrepancies = summary.discrepancies,
            "Verification finished"
        );
        Ok(summary)
    }

    async fn consume<W: Write>(
        &self,
        mut queue: mpsc::Receiver<QueueItem>,
        reporter: &mut DiscrepancyReporter<W>,
    ) -> Result<VerifySummary> {
        let limiter = Semaphore::new(self.concurrency_limit);
        let mut in_flight = FuturesUnordered::new();
        let mut summary = VerifySummary::default();
        let mut drained = false;

        loop {
            tokio::select! {
                item = queue.recv(), if !drained => match item {
                    Some(QueueItem::Row(raw)) => {
                        summary.rows += 1;
                        let expected = self.parsers.parse(&raw);
                        in_flight.push(self.fetch(&limiter, raw, expected));
                    },
                    Some(QueueItem::Done) | None => drained = true,
                },
                Some(checked) = in_flight.next(), if !in_flight.is_empty() => {
                    self.settle(checked, reporter, &mut summary)?;
                },
                else => break,
            }
        }

        Ok(summary)
    }

    async fn fetch(&self, limiter: &Semaphore, raw: RawRow, expected: ManifestRow) -> CheckedRow {
        let outcome = match expected.guid.as_deref() {
            None => Err(CliError::user_input("manifest row has no guid")),
            Some(guid) => match limiter.acquire().await {
                Ok(permit) => {
                    let fetched = self.fetcher.fetch_record(guid).await;
                    drop(permit);
                    fetched
                },
                Err(e) => Err(CliError::Other(e.into())),
            },
        };

        CheckedRow {
            raw,
            expected,
            outcome,
        }
    }

    fn settle<W: Write>(
        &self,
        checked: CheckedRow,
        reporter: &mut DiscrepancyReporter<W>,
        summary: &mut VerifySummary,
    ) -> Result<()> {
        let CheckedRow {
            raw,
            expected,
            outcome,
        } = checked;

        let found = match outcome {
            Err(e) => {
                summary.missing_records += 1;
                vec![Discrepancy::no_record(expected.guid.as_deref(), &raw, &e)]
            },
            Ok(record) => {
                let guid = expected.guid.as_deref().unwrap_or_default();
                debug!(guid, "verifying");
                compare_record(guid, &expected, &record)
            },
        };

        if !found.is_empty() {
            summary.flagged_rows += 1;
        }
        for discrepancy in &found {
            reporter.report(discrepancy)?;
            summary.discrepancies += 1;
        }
        Ok(())
    }
}

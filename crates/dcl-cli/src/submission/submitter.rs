//! Adaptive chunked bulk submission
//!
//! The dataset is walked with a window `[start, start + size)`. Each window
//! is sent as one TSV batch and the response decides what happens next:
//!
//! - success: record the ids, slide the window forward
//! - partial failure: park invalid rows for good, resend only the rows the
//!   server said were valid, same window
//! - overload: halve the window (floor 1) and resend at the same offset
//! - anything else: record it and slide forward
//!
//! The run is sequential; the only suspension point is the remote call.

use crate::dataset::Dataset;
use crate::error::{CliError, Result, SubmitError};
use crate::submission::classifier::{classify, Classification};
use crate::submission::result::SubmissionResult;
use async_trait::async_trait;
use indicatif::ProgressBar;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use tracing::{error, info, warn};

/// Default number of rows per batch
pub const DEFAULT_CHUNK_SIZE: usize = 30;

/// Remote operation that accepts one TSV batch (header included)
#[async_trait]
pub trait SubmitBatch: Send + Sync {
    /// Returns the raw response body for any HTTP answer; `Err` only when no
    /// answer arrived at all.
    async fn submit_batch(&self, tsv: String) -> Result<String>;
}

#[async_trait]
impl<T: SubmitBatch + ?Sized> SubmitBatch for std::sync::Arc<T> {
    async fn submit_batch(&self, tsv: String) -> Result<String> {
        (**self).submit_batch(tsv).await
    }
}

/// Chunking parameters of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Initial rows per batch
    pub chunk_size: usize,
    /// Rows to skip before the first batch
    pub row_offset: usize,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            row_offset: 0,
        }
    }
}

/// Drives one submission run against a [`SubmitBatch`] implementation
pub struct ChunkSubmitter<C> {
    client: C,
    options: SubmitOptions,
    progress: Option<ProgressBar>,
}

impl<C: SubmitBatch> ChunkSubmitter<C> {
    pub fn new(client: C, options: SubmitOptions) -> Self {
        Self {
            client,
            options,
            progress: None,
        }
    }

    /// Report rows accounted for on the given progress bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Submit every row from the configured offset on
    ///
    /// Bad records never abort the run. Only input preconditions, an
    /// all-valid chunk that still fails, or overload at chunk size 1 do; the
    /// latter two return the partial result inside [`SubmitError`].
    pub async fn submit(&self, dataset: &Dataset) -> Result<SubmissionResult> {
        let SubmitOptions {
            chunk_size,
            row_offset,
        } = self.options;

        if chunk_size == 0 {
            return Err(CliError::config("chunk size must be at least 1"));
        }
        dataset.validate()?;

        let total = dataset.len();
        if row_offset > total {
            return Err(CliError::user_input(format!(
                "row offset {} is past the end of the file ({} records)",
                row_offset, total
            )));
        }

        let index = dataset.submitter_index();
        let mut result = SubmissionResult::new();
        let mut start = row_offset;
        let mut size = chunk_size;
        // rows recorded as invalid; never sent again
        let mut settled: HashSet<usize> = HashSet::new();
        let mut retry: Option<Vec<usize>> = None;
        let mut count = 0usize;

        info!(total, chunk_size, row_offset, "Starting submission");

        while start < total {
            let rows: Vec<usize> = match retry.take() {
                Some(rows) => rows,
                None => {
                    let end = (start + size).min(total);
                    (start..end).filter(|row| !settled.contains(row)).collect()
                },
            };

            if rows.is_empty() {
                start += size;
                continue;
            }

            count += 1;
            info!(
                chunk = count,
                chunk_size = size,
                rows = rows.len(),
                submitted = result.submitted(),
                total,
                "Submitting chunk"
            );

            let body = dataset.chunk_tsv(&rows)?;
            let text = match self.client.submit_batch(body).await {
                Ok(text) => text,
                Err(e) => {
                    let detail = e.to_string();
                    warn!(chunk = count, error = %detail, "Chunk submission did not get a response");
                    result.record_detail(detail.clone());
                    detail
                },
            };

            match classify(&text) {
                Classification::TransientOverload { marker } => {
                    result.record_response(format!("Reducing Chunk Size: {}", text));
                    if size < 2 {
                        error!(offset = start, marker, "Server overloaded by single-record chunks");
                        return Err(SubmitError::Exhausted {
                            offset: start,
                            partial: Box::new(result),
                        }
                        .into());
                    }
                    size /= 2;
                    warn!(offset = start, chunk_size = size, marker, "Server overloaded; retrying with a smaller chunk");
                },

                Classification::Success { entities } => {
                    info!(chunk = count, entities = entities.len(), "Chunk succeeded");
                    result.record_response(format!(
                        "Chunk {} Succeeded: {} entities.",
                        count,
                        entities.len()
                    ));
                    result.record_success(entities.into_iter().map(|e| e.submitter_id));
                    start += size;
                },

                Classification::PartialFailure { code, entities } => {
                    result.record_response(format!(
                        "Chunk {} Failed: {} entities.",
                        count,
                        entities.len()
                    ));

                    let mut valid_but_failed = Vec::new();
                    let mut invalid = 0usize;
                    for entity in entities {
                        if entity.valid {
                            valid_but_failed.push(entity.submitter_id);
                        } else {
                            invalid += 1;
                            if let Some(&row) = index.get(entity.submitter_id.as_str()) {
                                settled.insert(row);
                            }
                            let message = entity.error_text();
                            result.record_invalid(entity.submitter_id, message);
                        }
                    }

                    info!(
                        chunk = count,
                        code,
                        invalid,
                        valid_but_failed = valid_but_failed.len(),
                        "Chunk failed"
                    );

                    if valid_but_failed.is_empty() {
                        start += size;
                    } else if invalid == 0 {
                        error!(chunk = count, offset = start, "Chunk failed with no invalid entities");
                        return Err(SubmitError::FatalInconsistency {
                            offset: start,
                            submitter_ids: valid_but_failed,
                            partial: Box::new(result),
                        }
                        .into());
                    } else {
                        let resend = rows_to_resend(&valid_but_failed, &rows, &index, &settled);
                        if resend.is_empty() || resend.len() >= rows.len() {
                            error!(chunk = count, offset = start, "Valid entities cannot be isolated from the failed chunk");
                            return Err(SubmitError::FatalInconsistency {
                                offset: start,
                                submitter_ids: valid_but_failed,
                                partial: Box::new(result),
                            }
                            .into());
                        }
                        info!(chunk = count, entities = resend.len(), "Retrying valid entities from failed chunk");
                        retry = Some(resend);
                    }
                },

                Classification::ServerError { message } => {
                    error!(chunk = count, response = %text, "Internal server error");
                    result.record_response(format!("Internal Server Error: {}", text));
                    result.record_other(json!({ "code": 500, "message": message }));
                    start += size;
                },

                Classification::Unparseable { reason, payload } => {
                    warn!(chunk = count, %reason, "Unhandled API response");
                    result.record_response(format!("Error Chunk {}: {}", count, reason));
                    if let Some(payload) = payload {
                        result.record_other(payload);
                    }
                    start += size;
                },
            }

            if let Some(progress) = &self.progress {
                progress.set_position(result.submitted() as u64);
            }
        }

        info!(
            succeeded = result.unique_succeeded(),
            invalid = result.invalid.len(),
            chunks = count,
            "Finished data submission"
        );

        Ok(result)
    }
}

/// Rows of the failed chunk the server reported as valid, in file order
fn rows_to_resend(
    valid_ids: &[String],
    submitted: &[usize],
    index: &HashMap<&str, usize>,
    settled: &HashSet<usize>,
) -> Vec<usize> {
    let valid: HashSet<usize> = valid_ids
        .iter()
        .filter_map(|id| index.get(id.as_str()).copied())
        .collect();

    submitted
        .iter()
        .copied()
        .filter(|row| valid.contains(row) && !settled.contains(row))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Fake submission endpoint; `respond` sees the submitter ids of each batch
    struct FakeSubmit<F> {
        respond: F,
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl<F> FakeSubmit<F>
    where
        F: Fn(usize, &[String]) -> String + Send + Sync,
    {
        fn new(respond: F) -> Self {
            Self {
                respond,
                batches: Mutex::new(Vec::new()),
            }
        }

        fn batches(&self) -> Vec<Vec<String>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl<F> SubmitBatch for FakeSubmit<F>
    where
        F: Fn(usize, &[String]) -> String + Send + Sync,
    {
        async fn submit_batch(&self, tsv: String) -> Result<String> {
            let ids: Vec<String> = tsv
                .lines()
                .skip(1)
                .map(|line| line.split('\t').next().unwrap().to_string())
                .collect();
            let call = {
                let mut batches = self.batches.lock().unwrap();
                batches.push(ids.clone());
                batches.len()
            };
            Ok((self.respond)(call, &ids))
        }
    }

    fn dataset(n: usize) -> Dataset {
        Dataset::from_rows(
            vec!["submitter_id".into(), "type".into()],
            (0..n).map(|i| vec![format!("s-{}", i), "case".into()]).collect(),
        )
        .unwrap()
    }

    fn entities(ids: &[String], valid: impl Fn(&str) -> bool) -> Value {
        ids.iter()
            .map(|id| {
                if valid(id) {
                    json!({"unique_keys": [{"submitter_id": id}], "valid": true})
                } else {
                    json!({"unique_keys": [{"submitter_id": id}], "valid": false, "errors": ["invalid"]})
                }
            })
            .collect()
    }

    fn success(ids: &[String]) -> String {
        json!({"code": 200, "entities": entities(ids, |_| true)}).to_string()
    }

    fn options(chunk_size: usize, row_offset: usize) -> SubmitOptions {
        SubmitOptions {
            chunk_size,
            row_offset,
        }
    }

    #[tokio::test]
    async fn test_chunk_coverage_without_failures() {
        let client = FakeSubmit::new(|_, ids: &[String]| success(ids));
        let submitter = ChunkSubmitter::new(client, options(3, 0));

        let result = submitter.submit(&dataset(10)).await.unwrap();

        let batches = submitter.client.batches();
        assert_eq!(batches.len(), 4);
        assert_eq!(
            batches.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![3, 3, 3, 1]
        );
        let expected: Vec<String> = (0..10).map(|i| format!("s-{}", i)).collect();
        assert_eq!(batches.concat(), expected);
        assert_eq!(result.succeeded, expected);
        assert!(result.invalid.is_empty());
    }

    #[tokio::test]
    async fn test_row_offset_skips_rows() {
        let client = FakeSubmit::new(|_, ids: &[String]| success(ids));
        let submitter = ChunkSubmitter::new(client, options(30, 4));

        let result = submitter.submit(&dataset(6)).await.unwrap();
        assert_eq!(result.succeeded, vec!["s-4", "s-5"]);
    }

    #[tokio::test]
    async fn test_row_offset_at_end_submits_nothing() {
        let client = FakeSubmit::new(|_, ids: &[String]| success(ids));
        let submitter = ChunkSubmitter::new(client, options(2, 3));

        let result = submitter.submit(&dataset(3)).await.unwrap();
        assert!(result.succeeded.is_empty());
        assert!(submitter.client.batches().is_empty());
    }

    #[tokio::test]
    async fn test_overload_halves_until_accepted() {
        let client = FakeSubmit::new(|_, ids: &[String]| {
            if ids.len() > 2 {
                "<html>504 Gateway Request Timeout</html>".to_string()
            } else {
                success(ids)
            }
        });
        let submitter = ChunkSubmitter::new(client, options(8, 0));

        let result = submitter.submit(&dataset(8)).await.unwrap();

        let sizes: Vec<usize> = submitter.client.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![8, 4, 2, 2, 2, 2]);
        assert_eq!(result.succeeded.len(), 8);
        assert_eq!(
            result
                .responses
                .iter()
                .filter(|r| r.starts_with("Reducing Chunk Size"))
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_overload_at_size_one_is_fatal() {
        let client = FakeSubmit::new(|_, _: &[String]| "service failure - try again later".to_string());
        let submitter = ChunkSubmitter::new(client, options(4, 0));

        let err = submitter.submit(&dataset(5)).await.unwrap_err();

        let sizes: Vec<usize> = submitter.client.batches().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4, 2, 1]);
        match err {
            CliError::Submission(SubmitError::Exhausted { offset, partial }) => {
                assert_eq!(offset, 0);
                assert_eq!(partial.responses.len(), 3);
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_partial_failure_isolates_invalid_entity() {
        let client = FakeSubmit::new(|_, ids: &[String]| {
            if ids.iter().any(|id| id == "s-1") {
                json!({"code": 400, "entities": entities(ids, |id| id != "s-1")}).to_string()
            } else {
                success(ids)
            }
        });
        let submitter = ChunkSubmitter::new(client, options(3, 0));

        let result = submitter.submit(&dataset(3)).await.unwrap();

        let batches = submitter.client.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1], vec!["s-0", "s-2"]);
        assert_eq!(result.invalid.len(), 1);
        assert!(result.invalid.contains_key("s-1"));
        assert_eq!(result.succeeded, vec!["s-0", "s-2"]);
        assert!(batches.iter().skip(1).all(|b| !b.contains(&"s-1".to_string())));
    }

    #[tokio::test]
    async fn test_invalid_rows_stay_out_after_overload() {
        // first call: s-1 invalid; retry of s-0,s-2,s-3 overloads; smaller windows follow
        let client = FakeSubmit::new(|call, ids: &[String]| match call {
            1 => json!({"code": 400, "entities": entities(ids, |id| id != "s-1")}).to_string(),
            2 => "413 Request Entity Too Large".to_string(),
            _ => success(ids),
        });
        let submitter = ChunkSubmitter::new(client, options(4, 0));

        let result = submitter.submit(&dataset(4)).await.unwrap();

        let batches = submitter.client.batches();
        assert_eq!(batches[1], vec!["s-0", "s-2", "s-3"]);
        assert_eq!(batches[2], vec!["s-0"]);
        assert_eq!(batches[3], vec!["s-2", "s-3"]);
        assert_eq!(result.succeeded, vec!["s-0", "s-2", "s-3"]);
    }

    #[tokio::test]
    async fn test_all_invalid_chunk_advances() {
        let client = FakeSubmit::new(|_, ids: &[String]| {
            json!({"code": 400, "entities": entities(ids, |_| false)}).to_string()
        });
        let submitter = ChunkSubmitter::new(client, options(2, 0));

        let result = submitter.submit(&dataset(4)).await.unwrap();
        assert_eq!(submitter.client.batches().len(), 2);
        assert_eq!(result.invalid.len(), 4);
        assert!(result.succeeded.is_empty());
    }

    #[tokio::test]
    async fn test_valid_but_failed_without_invalid_is_fatal() {
        let client = FakeSubmit::new(|call, ids: &[String]| {
            if call == 1 {
                success(ids)
            } else {
                json!({"code": 400, "entities": entities(ids, |_| true)}).to_string()
            }
        });
        let submitter = ChunkSubmitter::new(client, options(2, 0));

        match submitter.submit(&dataset(4)).await.unwrap_err() {
            CliError::Submission(SubmitError::FatalInconsistency {
                offset,
                submitter_ids,
                partial,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(submitter_ids, vec!["s-2", "s-3"]);
                assert_eq!(partial.succeeded, vec!["s-0", "s-1"]);
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparseable_and_server_errors_advance() {
        let client = FakeSubmit::new(|call, ids: &[String]| match call {
            1 => "<html>502 Bad Gateway</html>".to_string(),
            2 => json!({"code": 500, "message": "boom"}).to_string(),
            _ => success(ids),
        });
        let submitter = ChunkSubmitter::new(client, options(1, 0));

        let result = submitter.submit(&dataset(3)).await.unwrap();

        assert_eq!(submitter.client.batches().len(), 3);
        assert_eq!(result.succeeded, vec!["s-2"]);
        assert_eq!(result.other.len(), 2);
        assert!(result.responses[1].starts_with("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_duplicate_ids_fail_before_any_call() {
        let dataset = Dataset::from_rows(
            vec!["submitter_id".into()],
            vec![vec!["a".into()], vec!["a".into()]],
        )
        .unwrap();
        let client = FakeSubmit::new(|_, ids: &[String]| success(ids));
        let submitter = ChunkSubmitter::new(client, options(2, 0));

        assert!(matches!(
            submitter.submit(&dataset).await,
            Err(CliError::DuplicateIdentifier { .. })
        ));
        assert!(submitter.client.batches().is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let client = FakeSubmit::new(|_, ids: &[String]| success(ids));
        let submitter = ChunkSubmitter::new(client, options(0, 0));
        assert!(matches!(submitter.submit(&dataset(1)).await, Err(CliError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_submitter_column_fails_before_any_call() {
        let dataset = Dataset::from_rows(
            vec!["type".into(), "name".into()],
            vec![
                vec!["case".into(), "a".into()],
                vec!["case".into(), "b".into()],
            ],
        )
        .unwrap();
        let client = FakeSubmit::new(|_, ids: &[String]| success(ids));
        let submitter = ChunkSubmitter::new(client, options(2, 0));

        let err = submitter.submit(&dataset).await.unwrap_err();
        assert!(matches!(err, CliError::UserInput(msg) if msg.contains("submitter_id")));
        assert!(submitter.client.batches().is_empty());
    }
}

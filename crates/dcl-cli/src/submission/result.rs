//! Accumulated outcome of one submission run

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Outcome buckets of a submission run
///
/// Buckets only grow. `succeeded` keeps every id the server accepted, in
/// order, including repeats from retried chunks; `invalid` keeps the latest
/// error text per id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionResult {
    /// Submitter ids the server created or updated
    pub succeeded: Vec<String>,

    /// Submitter id -> validation error text
    pub invalid: BTreeMap<String, String>,

    /// Opaque payloads of responses the client could not interpret
    pub other: Vec<Value>,

    /// Transport failures and other raw detail
    pub details: Vec<String>,

    /// Human-readable trace of every chunk response
    pub responses: Vec<String>,
}

impl SubmissionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.succeeded.extend(ids);
    }

    pub(crate) fn record_invalid(&mut self, submitter_id: String, message: String) {
        self.invalid.insert(submitter_id, message);
    }

    pub(crate) fn record_response(&mut self, line: impl Into<String>) {
        self.responses.push(line.into());
    }

    pub(crate) fn record_other(&mut self, payload: Value) {
        self.other.push(payload);
    }

    pub(crate) fn record_detail(&mut self, detail: impl Into<String>) {
        self.details.push(detail.into());
    }

    /// Number of distinct submitter ids that succeeded
    pub fn unique_succeeded(&self) -> usize {
        self.succeeded.iter().collect::<HashSet<_>>().len()
    }

    /// Rows accounted for so far, used for progress reporting
    pub fn submitted(&self) -> usize {
        self.succeeded.len() + self.invalid.len()
    }
}

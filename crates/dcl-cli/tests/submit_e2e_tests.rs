//! End-to-end tests for dcl submit
//!
//! These tests run the binary against a mock submission service:
//! - Chunking and final partial chunks
//! - Chunk shrinking under overload
//! - Invalid record isolation
//! - Input errors raised before any request
//! - Partial reports on abort

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

const SUBMISSION_PATH: &str = "/api/v0/submission/DEV/test";

/// Helper to write a TSV data file with `n` case records
fn create_cases_file(dir: &TempDir, n: usize) -> PathBuf {
    let file = dir.path().join("cases.tsv");
    let mut content = String::from("type\t*submitter_id\tprimary_site\n");
    for i in 1..=n {
        content.push_str(&format!("case\tcase-{}\tLung\n", i));
    }
    fs::write(&file, content).expect("Failed to create data file");
    file
}

/// Submitter ids in a TSV request body
fn submitter_ids(request: &Request) -> Vec<String> {
    let body = String::from_utf8_lossy(&request.body).to_string();
    let mut lines = body.lines();
    let header: Vec<&str> = lines.next().unwrap_or_default().split('\t').collect();
    let column = header
        .iter()
        .position(|h| *h == "submitter_id")
        .expect("submitter_id column");
    lines
        .map(|line| line.split('\t').nth(column).unwrap_or_default().to_string())
        .collect()
}

fn entity(id: &str, valid: bool) -> Value {
    if valid {
        json!({"unique_keys": [{"submitter_id": id}], "valid": true})
    } else {
        json!({
            "unique_keys": [{"submitter_id": id}],
            "valid": false,
            "errors": [{"message": format!("{} has an unknown primary_site", id)}]
        })
    }
}

/// Accepts every batch, answering overload for batches over `limit` rows
/// and rejecting `bad` ids
struct CommonsStub {
    limit: usize,
    bad: Vec<String>,
    batches: Arc<AtomicUsize>,
}

impl Respond for CommonsStub {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let ids = submitter_ids(request);

        if ids.len() > self.limit {
            return ResponseTemplate::new(413).set_body_string("413 Request Entity Too Large");
        }

        if ids.iter().any(|id| self.bad.contains(id)) {
            let entities: Vec<Value> = ids
                .iter()
                .map(|id| entity(id, !self.bad.contains(id)))
                .collect();
            return ResponseTemplate::new(400)
                .set_body_json(json!({"code": 400, "entities": entities}));
        }

        let entities: Vec<Value> = ids.iter().map(|id| entity(id, true)).collect();
        ResponseTemplate::new(200).set_body_json(json!({"code": 200, "entities": entities}))
    }
}

fn stub(limit: usize, bad: &[&str]) -> (CommonsStub, Arc<AtomicUsize>) {
    let batches = Arc::new(AtomicUsize::new(0));
    (
        CommonsStub {
            limit,
            bad: bad.iter().map(|s| s.to_string()).collect(),
            batches: batches.clone(),
        },
        batches,
    )
}

fn dcl(dir: &TempDir, server: &MockServer) -> Command {
    let mut cmd = Command::cargo_bin("dcl").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DCL_ACCESS_TOKEN")
        .env_remove("DCL_CREDENTIALS")
        .env_remove("DCL_CHUNK_SIZE")
        .env_remove("DCL_ROW_OFFSET")
        .arg("--endpoint")
        .arg(server.uri());
    cmd
}

fn read_report(path: &PathBuf) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("report written")).expect("report is JSON")
}

#[tokio::test]
async fn test_submit_in_chunks() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let (responder, batches) = stub(usize::MAX, &[]);

    Mock::given(method("PUT"))
        .and(path(SUBMISSION_PATH))
        .and(header("content-type", "text/tab-separated-values"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(responder)
        .mount(&server)
        .await;

    let file = create_cases_file(&dir, 7);
    let report = dir.path().join("report.json");

    dcl(&dir, &server)
        .env("DCL_ACCESS_TOKEN", "test-token")
        .arg("submit")
        .arg(&file)
        .arg("--project-id")
        .arg("DEV-test")
        .arg("--chunk-size")
        .arg("3")
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("with 7 records"))
        .stdout(predicate::str::contains("Successful records: 7"));

    // 3 + 3 + 1
    assert_eq!(batches.load(Ordering::SeqCst), 3);

    let report = read_report(&report);
    assert_eq!(report["succeeded"].as_array().unwrap().len(), 7);
    assert_eq!(report["invalid"], json!({}));
}

#[tokio::test]
async fn test_submit_shrinks_chunks_under_overload() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let (responder, batches) = stub(2, &[]);

    Mock::given(method("PUT"))
        .and(path(SUBMISSION_PATH))
        .respond_with(responder)
        .mount(&server)
        .await;

    let file = create_cases_file(&dir, 6);
    let report = dir.path().join("report.json");

    dcl(&dir, &server)
        .arg("submit")
        .arg(&file)
        .arg("-p")
        .arg("DEV-test")
        .arg("--chunk-size")
        .arg("8")
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("Successful records: 6"));

    // 8 -> overload, 4 -> overload, then three chunks of 2
    assert_eq!(batches.load(Ordering::SeqCst), 5);

    let report = read_report(&report);
    let reductions = report["responses"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|r| r.as_str().unwrap_or_default().starts_with("Reducing Chunk Size"))
        .count();
    assert_eq!(reductions, 2);
}

#[tokio::test]
async fn test_submit_isolates_invalid_records() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let (responder, _) = stub(usize::MAX, &["case-2"]);

    Mock::given(method("PUT"))
        .and(path(SUBMISSION_PATH))
        .respond_with(responder)
        .mount(&server)
        .await;

    let file = create_cases_file(&dir, 4);
    let report = dir.path().join("report.json");

    dcl(&dir, &server)
        .arg("submit")
        .arg(&file)
        .arg("-p")
        .arg("DEV-test")
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("Successful records: 3"))
        .stdout(predicate::str::contains("Failed invalid records: 1"))
        .stdout(predicate::str::contains("case-2"));

    let report = read_report(&report);
    assert!(report["invalid"]["case-2"]
        .as_str()
        .unwrap()
        .contains("unknown primary_site"));
    let mut succeeded: Vec<String> = serde_json::from_value(report["succeeded"].clone()).unwrap();
    succeeded.sort();
    assert_eq!(succeeded, vec!["case-1", "case-3", "case-4"]);
}

#[tokio::test]
async fn test_submit_duplicate_ids_fail_before_any_request() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let file = dir.path().join("dupes.csv");
    fs::write(&file, "type,submitter_id\ncase,a\ncase,b\ncase,a\n").unwrap();

    dcl(&dir, &server)
        .arg("submit")
        .arg(&file)
        .arg("-p")
        .arg("DEV-test")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("duplicate submitter_ids: a"));
}

#[tokio::test]
async fn test_submit_rejects_unsupported_files() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    let file = dir.path().join("cases.xlsx");
    fs::write(&file, "not really a spreadsheet").unwrap();

    dcl(&dir, &server)
        .arg("submit")
        .arg(&file)
        .arg("-p")
        .arg("DEV-test")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Export its first worksheet"));

    dcl(&dir, &server)
        .arg("submit")
        .arg(create_cases_file(&dir, 1))
        .arg("-p")
        .arg("DEVtest")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PROGRAM-PROJECT"));
}

#[tokio::test]
async fn test_submit_exhaustion_writes_partial_report() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path(SUBMISSION_PATH))
        .respond_with(ResponseTemplate::new(504).set_body_string("Request Timeout"))
        .mount(&server)
        .await;

    let file = create_cases_file(&dir, 3);
    let report = dir.path().join("report.json");

    dcl(&dir, &server)
        .arg("submit")
        .arg(&file)
        .arg("-p")
        .arg("DEV-test")
        .arg("--chunk-size")
        .arg("2")
        .arg("--report")
        .arg(&report)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("chunk size of 1"));

    let report = read_report(&report);
    assert_eq!(report["responses"].as_array().unwrap().len(), 2);
    assert_eq!(report["succeeded"], json!([]));
}

//! HTTP clients for the commons submission API and file index

use crate::api::endpoints;
use crate::api::types::{ExportFormat, ExportPayload, GraphQlRequest, ProjectId};
use crate::auth::{AuthProvider, Credentials};
use crate::error::{CliError, Result};
use crate::submission::SubmitBatch;
use crate::verify::{IndexRecord, RecordFetcher};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// API Client Constants
// ============================================================================

/// Default timeout for API requests in seconds.
/// Large chunks can take minutes to be validated server side.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 300;

/// Default commons endpoint when not specified via flag or environment.
pub const DEFAULT_ENDPOINT: &str = "http://localhost";

/// Content type of bulk TSV submissions
pub const TSV_CONTENT_TYPE: &str = "text/tab-separated-values";

fn normalize_base(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Parse a body as JSON, falling back to the raw text
fn json_or_text(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Client for the submission service (`/api/v0/submission`)
#[derive(Debug, Clone)]
pub struct SubmissionClient {
    client: Client,
    base_url: String,
    auth: Arc<AuthProvider>,
}

impl SubmissionClient {
    /// Create a new submission client
    pub fn new(base_url: impl Into<String>, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base(base_url);
        let client = Client::builder().timeout(timeout).build()?;
        let auth = Arc::new(AuthProvider::new(base_url.clone(), credentials, client.clone()));

        Ok(Self {
            client,
            base_url,
            auth,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bind the client to one project for bulk submission
    pub fn for_project(&self, project: ProjectId) -> ProjectSubmitter {
        ProjectSubmitter {
            client: self.clone(),
            project,
        }
    }

    /// PUT one TSV batch and return the raw response body
    ///
    /// Any HTTP answer is returned as text, error statuses included; the
    /// caller classifies it.
    pub async fn submit_tsv(&self, project: &ProjectId, tsv: String) -> Result<String> {
        let url = endpoints::submission_url(&self.base_url, &project.program, &project.project);
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, TSV_CONTENT_TYPE)
            .body(tsv);

        let response = self.auth.authorize(request).await?.send().await?;
        debug!(status = %response.status(), "Submission response");
        Ok(response.text().await?)
    }

    /// Send an authorized request; the body is returned whatever the status
    async fn send_authorized(&self, request: RequestBuilder) -> Result<Value> {
        let response = self.auth.authorize(request).await?.send().await?;
        debug!(status = %response.status(), url = %response.url(), "Submission API response");
        Ok(json_or_text(response.text().await?))
    }

    /// Submit records as JSON (one object or an array)
    pub async fn submit_record(&self, project: &ProjectId, records: &Value) -> Result<Value> {
        let url = endpoints::submission_url(&self.base_url, &project.program, &project.project);
        self.send_authorized(self.client.put(&url).json(records)).await
    }

    /// Delete one entity by uuid
    pub async fn delete_record(&self, project: &ProjectId, id: &str) -> Result<Value> {
        let url = endpoints::entity_url(&self.base_url, &project.program, &project.project, id);
        self.send_authorized(self.client.delete(&url)).await
    }

    /// Create a program from its JSON node
    pub async fn create_program(&self, program: &Value) -> Result<Value> {
        let url = endpoints::submission_root_url(&self.base_url);
        self.send_authorized(self.client.post(&url).json(program)).await
    }

    /// Delete an empty program
    pub async fn delete_program(&self, program: &str) -> Result<Value> {
        let url = endpoints::program_url(&self.base_url, program);
        self.send_authorized(self.client.delete(&url)).await
    }

    /// Create a project under `program` from its JSON node
    pub async fn create_project(&self, program: &str, project: &Value) -> Result<Value> {
        let url = endpoints::program_url(&self.base_url, program);
        self.send_authorized(self.client.put(&url).json(project)).await
    }

    /// Delete an empty project
    pub async fn delete_project(&self, project: &ProjectId) -> Result<Value> {
        let url = endpoints::submission_url(&self.base_url, &project.program, &project.project);
        self.send_authorized(self.client.delete(&url)).await
    }

    /// GraphQL schema of the commons (introspection result)
    pub async fn graphql_schema(&self) -> Result<Value> {
        let url = endpoints::graphql_schema_url(&self.base_url);
        let response = self.client.get(&url).send().await?;
        Ok(json_or_text(response.text().await?))
    }

    /// Run a GraphQL query
    ///
    /// A response carrying `errors` fails immediately. Transport failures and
    /// responses without `data` are retried until `max_tries` attempts have
    /// been made; the last answer is returned.
    pub async fn query(&self, query: &str, variables: Option<Value>, max_tries: u32) -> Result<Value> {
        let url = endpoints::graphql_url(&self.base_url);
        let body = GraphQlRequest {
            query: query.to_string(),
            variables,
        };
        let max_tries = max_tries.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = self.client.post(&url).json(&body);
            let outcome = match self.auth.authorize(request).await?.send().await {
                Ok(response) => response.text().await.map_err(CliError::from),
                Err(e) => Err(e.into()),
            };

            let data = match outcome.and_then(|text| Ok(serde_json::from_str::<Value>(&text)?)) {
                Ok(data) => data,
                Err(e) if attempt < max_tries => {
                    warn!(attempt, max_tries, error = %e, "GraphQL query failed, retrying");
                    continue;
                },
                Err(e) => return Err(e),
            };

            if let Some(errors) = data.get("errors") {
                return Err(CliError::api(format!("GraphQL query returned errors: {}", errors)));
            }
            if data.get("data").is_none() && attempt < max_tries {
                warn!(attempt, max_tries, "GraphQL response has no data, retrying");
                continue;
            }
            return Ok(data);
        }
    }

    /// Export records by id (comma separated)
    pub async fn export_record(
        &self,
        project: &ProjectId,
        ids: &str,
        format: ExportFormat,
    ) -> Result<ExportPayload> {
        let url = endpoints::export_record_url(
            &self.base_url,
            &project.program,
            &project.project,
            ids,
            format.as_str(),
        );
        self.export(&url, format).await
    }

    /// Export every record of a node type
    pub async fn export_node(
        &self,
        project: &ProjectId,
        node_label: &str,
        format: ExportFormat,
    ) -> Result<ExportPayload> {
        let url = endpoints::export_node_url(
            &self.base_url,
            &project.program,
            &project.project,
            node_label,
            format.as_str(),
        );
        self.export(&url, format).await
    }

    async fn export(&self, url: &str, format: ExportFormat) -> Result<ExportPayload> {
        let request = self.client.get(url);
        let response = self
            .auth
            .authorize(request)
            .await?
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;

        Ok(match format {
            ExportFormat::Json => ExportPayload::Json(serde_json::from_str(&text)?),
            ExportFormat::Tsv => ExportPayload::Tsv(text),
        })
    }

    /// Dictionary schema of one node type (`_all` for the whole dictionary)
    pub async fn dictionary_node(&self, node: &str) -> Result<Value> {
        let url = endpoints::dictionary_url(&self.base_url, node);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CliError::api(format!(
                "Dictionary has no node '{}'. Use '_all' to list the whole dictionary.",
                node
            )));
        }
        Ok(response.error_for_status()?.json().await?)
    }
}

/// Submission client bound to one project
#[derive(Debug, Clone)]
pub struct ProjectSubmitter {
    client: SubmissionClient,
    project: ProjectId,
}

#[async_trait]
impl SubmitBatch for ProjectSubmitter {
    async fn submit_batch(&self, tsv: String) -> Result<String> {
        self.client.submit_tsv(&self.project, tsv).await
    }
}

/// Certificate handling for index requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Verify server certificates
    Verify,
    /// Accept any certificate (endpoints not served over https)
    AcceptInvalid,
}

impl TlsMode {
    /// Certificates are verified only when the endpoint mentions https
    pub fn for_endpoint(endpoint: &str) -> Self {
        if endpoint.contains("https") {
            TlsMode::Verify
        } else {
            TlsMode::AcceptInvalid
        }
    }
}

/// Read-only client for the file index
#[derive(Debug, Clone)]
pub struct IndexClient {
    client: Client,
    base_url: String,
    tls: TlsMode,
}

impl IndexClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = normalize_base(base_url);
        let tls = TlsMode::for_endpoint(&base_url);

        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(tls == TlsMode::AcceptInvalid)
            .build()?;

        Ok(Self {
            client,
            base_url,
            tls,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tls_mode(&self) -> TlsMode {
        self.tls
    }
}

#[async_trait]
impl RecordFetcher for IndexClient {
    async fn fetch_record(&self, guid: &str) -> Result<IndexRecord> {
        let url = endpoints::index_record_url(&self.base_url, guid);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CliError::record_not_found(guid));
        }

        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn project() -> ProjectId {
        "DEV-test".parse().unwrap()
    }

    fn submission_client(server: &MockServer, credentials: Credentials) -> SubmissionClient {
        SubmissionClient::new(server.uri(), credentials, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client =
            SubmissionClient::new("http://localhost/", Credentials::Anonymous, Duration::from_secs(1))
                .unwrap();
        assert_eq!(client.base_url(), "http://localhost");
    }

    #[test]
    fn test_tls_mode_follows_scheme() {
        assert_eq!(TlsMode::for_endpoint("https://data.example.org"), TlsMode::Verify);
        assert_eq!(TlsMode::for_endpoint("http://localhost"), TlsMode::AcceptInvalid);

        let client = IndexClient::new("http://localhost", Duration::from_secs(1)).unwrap();
        assert_eq!(client.tls_mode(), TlsMode::AcceptInvalid);
    }

    #[tokio::test]
    async fn test_submit_batch_puts_tsv_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v0/submission/DEV/test"))
            .and(header("content-type", TSV_CONTENT_TYPE))
            .and(header("authorization", "Bearer tok"))
            .and(body_string("submitter_id\ns-1\n"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"code": 200, "entities": []}"#))
            .expect(1)
            .mount(&server)
            .await;

        let submitter = submission_client(&server, Credentials::Token("tok".into())).for_project(project());
        let body = submitter.submit_batch("submitter_id\ns-1\n".into()).await.unwrap();
        assert!(body.contains("\"code\": 200"));
    }

    #[tokio::test]
    async fn test_submit_batch_returns_error_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(413).set_body_string("413 Request Entity Too Large"))
            .mount(&server)
            .await;

        let submitter = submission_client(&server, Credentials::Anonymous).for_project(project());
        let body = submitter.submit_batch("x".into()).await.unwrap();
        assert_eq!(body, "413 Request Entity Too Large");
    }

    #[tokio::test]
    async fn test_query_errors_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/submission/graphql"))
            .and(body_json(json!({"query": "{ nope }"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": ["bad field"]})))
            .expect(1)
            .mount(&server)
            .await;

        let client = submission_client(&server, Credentials::Anonymous);
        let err = client.query("{ nope }", None, 3).await.unwrap_err();
        assert!(matches!(err, CliError::Api(msg) if msg.contains("bad field")));
    }

    #[tokio::test]
    async fn test_query_retries_until_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"project": []}})))
            .mount(&server)
            .await;

        let client = submission_client(&server, Credentials::Anonymous);
        let data = client.query("{ project { code } }", None, 3).await.unwrap();
        assert_eq!(data["data"]["project"], json!([]));

        let again = client.query("{ project { code } }", None, 1).await.unwrap();
        assert!(again.get("data").is_some());
    }

    #[tokio::test]
    async fn test_export_record_json_and_tsv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/submission/DEV/test/export"))
            .and(query_param("ids", "u-1"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "u-1"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v0/submission/DEV/test/export/"))
            .and(query_param("node_label", "sample"))
            .and(query_param("format", "tsv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("type\tid\nsample\tu-1\n"))
            .mount(&server)
            .await;

        let client = submission_client(&server, Credentials::Anonymous);
        assert_eq!(
            client.export_record(&project(), "u-1", ExportFormat::Json).await.unwrap(),
            ExportPayload::Json(json!([{"id": "u-1"}]))
        );
        assert_eq!(
            client.export_node(&project(), "sample", ExportFormat::Tsv).await.unwrap(),
            ExportPayload::Tsv("type\tid\nsample\tu-1\n".into())
        );
    }

    #[tokio::test]
    async fn test_delete_and_submit_record() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v0/submission/DEV/test/entities/u-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v0/submission/DEV/test"))
            .and(body_json(json!({"type": "case", "submitter_id": "c-1"})))
            .respond_with(ResponseTemplate::new(400).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = submission_client(&server, Credentials::Anonymous);
        assert_eq!(client.delete_record(&project(), "u-1").await.unwrap(), json!({"code": 200}));
        assert_eq!(
            client
                .submit_record(&project(), &json!({"type": "case", "submitter_id": "c-1"}))
                .await
                .unwrap(),
            json!("not json")
        );
    }

    #[tokio::test]
    async fn test_program_and_project_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v0/submission/"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({"type": "program", "name": "DEV", "dbgap_accession_number": "phs1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "created_entity_count": 1})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v0/submission/DEV"))
            .and(header("authorization", "Bearer tok"))
            .and(body_json(json!({"type": "project", "code": "test"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v0/submission/DEV/test"))
            .respond_with(ResponseTemplate::new(400).set_body_string("project is not empty"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v0/submission/DEV"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = submission_client(&server, Credentials::Token("tok".into()));
        let created = client
            .create_program(&json!({"type": "program", "name": "DEV", "dbgap_accession_number": "phs1"}))
            .await
            .unwrap();
        assert_eq!(created["created_entity_count"], 1);
        assert_eq!(
            client
                .create_project("DEV", &json!({"type": "project", "code": "test"}))
                .await
                .unwrap(),
            json!({"code": 200})
        );
        assert_eq!(
            client.delete_project(&project()).await.unwrap(),
            json!("project is not empty")
        );
        assert_eq!(client.delete_program("DEV").await.unwrap(), json!(""));
    }

    #[tokio::test]
    async fn test_graphql_schema() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/submission/getschema"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"__schema": {"types": []}}})),
            )
            .mount(&server)
            .await;

        let client = submission_client(&server, Credentials::Anonymous);
        let schema = client.graphql_schema().await.unwrap();
        assert_eq!(schema["data"]["__schema"]["types"], json!([]));
    }

    #[tokio::test]
    async fn test_dictionary_node() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v0/submission/_dictionary/case"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "case"})))
            .mount(&server)
            .await;

        let client = submission_client(&server, Credentials::Anonymous);
        assert_eq!(client.dictionary_node("case").await.unwrap()["id"], "case");
        assert!(matches!(client.dictionary_node("nope").await, Err(CliError::Api(_))));
    }

    #[tokio::test]
    async fn test_fetch_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index/index/g-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "did": "g-1",
                "size": 10,
                "hashes": {"md5": "abc"},
                "urls": ["s3://b/k"],
                "acl": null,
                "authz": ["/programs/DEV"],
                "file_name": null
            })))
            .mount(&server)
            .await;

        let client = IndexClient::new(server.uri(), Duration::from_secs(5)).unwrap();
        let record = client.fetch_record("g-1").await.unwrap();
        assert_eq!(record.size, Some(10));
        assert_eq!(record.md5(), Some("abc"));
        assert!(record.acl.is_empty());

        let err = client.fetch_record("g-2").await.unwrap_err();
        assert_eq!(err.to_string(), "Index client could not find record for GUID: g-2");
    }
}

//! Authentication for the submission API
//!
//! Requests carry a bearer token. The token is either given directly or
//! obtained once per client by exchanging an API key file at the commons
//! token endpoint.

use crate::api::endpoints;
use crate::api::types::{AccessTokenResponse, ApiKey};
use crate::error::{CliError, Result};
use reqwest::{Client, RequestBuilder};
use std::fmt;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::debug;

/// Where the access token comes from
#[derive(Clone, Default)]
pub enum Credentials {
    /// No Authorization header (public dictionary and index reads)
    #[default]
    Anonymous,
    /// Ready-made access token
    Token(String),
    /// API key exchanged for an access token on first use
    ApiKey(ApiKey),
}

impl Credentials {
    /// Load an API key file (`{"api_key": .., "key_id": ..}`)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CliError::config(format!("cannot read credentials file '{}': {}", path.display(), e))
        })?;
        let key: ApiKey = serde_json::from_str(&text).map_err(|e| {
            CliError::config(format!(
                "credentials file '{}' is not an API key file: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::ApiKey(key))
    }

    /// Pick credentials from the configured token and key file; the token wins
    pub fn resolve(token: Option<&str>, key_file: Option<&Path>) -> Result<Self> {
        match (token.filter(|t| !t.trim().is_empty()), key_file) {
            (Some(token), _) => Ok(Self::Token(token.trim().to_string())),
            (None, Some(path)) => Self::from_file(path),
            (None, None) => Ok(Self::Anonymous),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => f.write_str("Anonymous"),
            Credentials::Token(_) => f.write_str("Token(..)"),
            Credentials::ApiKey(key) => f.debug_struct("ApiKey").field("key_id", &key.key_id).finish(),
        }
    }
}

/// Attaches the bearer token to outgoing requests
pub struct AuthProvider {
    endpoint: String,
    credentials: Credentials,
    http: Client,
    token: OnceCell<Option<String>>,
}

impl AuthProvider {
    pub fn new(endpoint: impl Into<String>, credentials: Credentials, http: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials,
            http,
            token: OnceCell::new(),
        }
    }

    /// Current access token, exchanging the API key on first call
    pub async fn access_token(&self) -> Result<Option<&str>> {
        let token = self.token.get_or_try_init(|| self.obtain_token()).await?;
        Ok(token.as_deref())
    }

    /// Add the Authorization header when there is a token
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.access_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn obtain_token(&self) -> Result<Option<String>> {
        match &self.credentials {
            Credentials::Anonymous => Ok(None),
            Credentials::Token(token) => Ok(Some(token.clone())),
            Credentials::ApiKey(key) => {
                let url = endpoints::access_token_url(&self.endpoint);
                debug!(key_id = %key.key_id, "Exchanging API key for access token");

                let response = self.http.post(&url).json(key).send().await?;
                if !response.status().is_success() {
                    return Err(CliError::api(format!(
                        "API key exchange failed with status {}. Download a fresh API key from your commons profile page.",
                        response.status()
                    )));
                }

                let body: AccessTokenResponse = response.json().await?;
                Ok(Some(body.access_token))
            },
        }
    }
}

impl fmt::Debug for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthProvider")
            .field("endpoint", &self.endpoint)
            .field("credentials", &self.credentials)
            .field("token_cached", &self.token.initialized())
            .finish()
    }
}

//! HTTP implementation of the remote service

use super::types::{
    AgentRequest, AgentResponse, AgentSelection, ConversationReply, ConversationRequest,
    ConversationResponse,
};
use super::{RemoteError, RemoteService};
use crate::catalog::CatalogEntry;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the remote service
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RemoteConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            base_url: lookup("CURATOR_REMOTE_URL").unwrap_or(defaults.base_url),
            timeout: lookup("CURATOR_REMOTE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.timeout, Duration::from_secs),
        }
    }
}

/// Remote service reached over HTTP
pub struct HttpRemoteService {
    client: Client,
    base_url: String,
}

impl HttpRemoteService {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let response = self
            .client
            .get(self.endpoint(path))
            .send()
            .await
            .map_err(classify_send_error)?;
        read_json(response).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(classify_send_error)?;
        read_json(response).await
    }
}

fn classify_send_error(e: reqwest::Error) -> RemoteError {
    if e.is_timeout() {
        RemoteError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        RemoteError::network(format!("Connection failed: {e}"))
    } else {
        RemoteError::network(format!("Request failed: {e}"))
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, RemoteError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::network(format!("Failed to read response: {e}")))?;

    if !status.is_success() {
        return Err(RemoteError::status(format!("HTTP {status}: {body}")));
    }

    serde_json::from_str(&body)
        .map_err(|e| RemoteError::decode(format!("Failed to parse response: {e} - body: {body}")))
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        self.get_json("/api/furniture").await
    }

    async fn advance_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationReply, RemoteError> {
        let response: ConversationResponse = self.post_json("/api/conversation", request).await?;
        response.into_reply()
    }

    async fn run_agent(&self, request: &AgentRequest) -> Result<AgentSelection, RemoteError> {
        let response: AgentResponse = self.post_json("/api/run-agent", request).await?;
        response.into_selection()
    }
}

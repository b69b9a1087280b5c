//! Remote service client
//!
//! Two request kinds drive the wizard: advancing the conversation and running
//! the selection agent. The catalog is fetched once per session. Every call
//! returns a normalized success value or a classified `RemoteError`.

mod error;
mod http;
mod types;

pub use error::{RemoteError, RemoteErrorKind};
pub use http::{HttpRemoteService, RemoteConfig};
pub use types::*;

use crate::catalog::CatalogEntry;
use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for the remote conversation/agent service
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Fetch the ordered furniture catalog
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, RemoteError>;

    /// Send one conversation turn
    async fn advance_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationReply, RemoteError>;

    /// Ask the selection agent for recommended catalog identifiers
    async fn run_agent(&self, request: &AgentRequest) -> Result<AgentSelection, RemoteError>;
}

#[async_trait]
impl<T: RemoteService + ?Sized> RemoteService for Arc<T> {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        (**self).fetch_catalog().await
    }

    async fn advance_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationReply, RemoteError> {
        (**self).advance_conversation(request).await
    }

    async fn run_agent(&self, request: &AgentRequest) -> Result<AgentSelection, RemoteError> {
        (**self).run_agent(request).await
    }
}

/// Logging wrapper for remote services
pub struct LoggingService {
    inner: Arc<dyn RemoteService>,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn RemoteService>) -> Self {
        Self { inner }
    }
}

fn log_outcome<T>(
    call: &'static str,
    started: std::time::Instant,
    result: &Result<T, RemoteError>,
) {
    let duration = started.elapsed();
    match result {
        Ok(_) => {
            tracing::info!(
                call,
                duration_ms = %duration.as_millis(),
                "Remote call completed"
            );
        }
        Err(e) => {
            tracing::error!(
                call,
                duration_ms = %duration.as_millis(),
                error = %e.message,
                transport = e.kind.is_transport(),
                "Remote call failed"
            );
        }
    }
}

#[async_trait]
impl RemoteService for LoggingService {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.fetch_catalog().await;
        log_outcome("fetch_catalog", start, &result);
        if let Ok(entries) = &result {
            tracing::debug!(items = entries.len(), "Catalog fetched");
        }
        result
    }

    async fn advance_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationReply, RemoteError> {
        tracing::debug!(
            step = request.current_step,
            history = request.conversation_history.len(),
            "Sending conversation turn"
        );
        let start = std::time::Instant::now();
        let result = self.inner.advance_conversation(request).await;
        log_outcome("advance_conversation", start, &result);
        result
    }

    async fn run_agent(&self, request: &AgentRequest) -> Result<AgentSelection, RemoteError> {
        let start = std::time::Instant::now();
        let result = self.inner.run_agent(request).await;
        log_outcome("run_agent", start, &result);
        if let Ok(selection) = &result {
            tracing::info!(items = ?selection.items, "Agent recommended items");
        }
        result
    }
}

//! Runtime for executing sessions
//!
//! Each session runs as its own task. Clients talk to it through a
//! `SessionHandle`: commands go in over an mpsc channel, updates come out
//! over a broadcast channel, and the latest snapshot is kept in a watch.

mod executor;
mod flight;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;

use crate::remote::RemoteService;
use crate::state_machine::{Event, Message, SessionContext, SessionView, Timing};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session closed: {0}")]
    Closed(String),
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    /// Growing prefix of the message being revealed
    Reveal { text: String },
    /// A message was committed to history
    Message { message: Message },
    StateChange { view: Box<SessionView> },
    /// A command was rejected
    Error { message: String },
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: String,
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    pub view_rx: watch::Receiver<SessionView>,
    pub cancel: CancellationToken,
}

impl SessionHandle {
    pub async fn send(&self, event: Event) -> Result<(), RuntimeError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| RuntimeError::Closed(self.session_id.clone()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    /// Cancel the session's timers, tickers and in-flight requests
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Default time a session may go without a stream subscriber before eviction
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Settings shared by every session
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub timing: Timing,
    pub asset_base: String,
    pub idle_ttl: Duration,
}

struct SessionEntry {
    handle: SessionHandle,
    /// Set when the last stream subscriber was first seen gone
    idle_since: Option<Instant>,
}

/// Manager for all session runtimes
pub struct SessionManager {
    remote: Arc<dyn RemoteService>,
    config: RuntimeConfig,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionManager {
    pub fn new(remote: Arc<dyn RemoteService>, config: RuntimeConfig) -> Self {
        Self {
            remote,
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session: the runtime loads the catalog and requests the
    /// welcome message immediately.
    pub async fn create(&self) -> Result<String, RuntimeError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let context = SessionContext::new(&session_id, self.config.timing.clone());
        let handle = SessionRuntime::start(
            context,
            self.remote.clone(),
            self.config.asset_base.clone(),
        );

        handle.send(Event::SessionStarted).await?;
        self.sessions.write().await.insert(
            session_id.clone(),
            SessionEntry {
                handle,
                idle_since: None,
            },
        );

        tracing::info!(session_id = %session_id, "Session created");
        Ok(session_id)
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionHandle, RuntimeError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| RuntimeError::NotFound(session_id.to_string()))
    }

    pub async fn send_event(&self, session_id: &str, event: Event) -> Result<(), RuntimeError> {
        self.get(session_id).await?.send(event).await
    }

    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(SessionView, broadcast::Receiver<SseEvent>), RuntimeError> {
        let handle = self.get(session_id).await?;
        // Subscribe first so nothing published after the snapshot is missed
        let rx = handle.subscribe();
        Ok((handle.view(), rx))
    }

    pub async fn view(&self, session_id: &str) -> Result<SessionView, RuntimeError> {
        Ok(self.get(session_id).await?.view())
    }

    /// Tear a session down; pending timers and requests never fire
    pub async fn close(&self, session_id: &str) -> Result<(), RuntimeError> {
        let entry = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| RuntimeError::NotFound(session_id.to_string()))?;
        entry.handle.close();
        tracing::info!(session_id = %session_id, "Session closed");
        Ok(())
    }

    /// Close every session that has had no stream subscriber for the idle
    /// TTL as of `now`. Returns the number of sessions evicted.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let ttl = self.config.idle_ttl;
        let mut sessions = self.sessions.write().await;
        let mut expired = Vec::new();

        for (session_id, entry) in &mut *sessions {
            if entry.handle.broadcast_tx.receiver_count() > 0 {
                entry.idle_since = None;
                continue;
            }
            let since = *entry.idle_since.get_or_insert(now);
            if now.saturating_duration_since(since) >= ttl {
                expired.push(session_id.clone());
            }
        }

        for session_id in &expired {
            if let Some(entry) = sessions.remove(session_id) {
                entry.handle.close();
                tracing::info!(session_id = %session_id, "Idle session evicted");
            }
        }
        expired.len()
    }

    /// Poll for idle sessions every `interval` until `cancel` fires
    pub fn spawn_idle_sweeper(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = self.evict_idle(Instant::now()).await;
                        if evicted > 0 {
                            tracing::debug!(evicted, "Idle sweep finished");
                        }
                    }
                }
            }
        });
    }
}

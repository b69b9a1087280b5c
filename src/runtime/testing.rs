//! Mock implementations for testing
//!
//! These mocks enable integration testing of session runtimes without a real
//! remote service.

use crate::catalog::test_support::sample_entries;
use crate::catalog::CatalogEntry;
use crate::remote::{
    AgentRequest, AgentSelection, ConversationReply, ConversationRequest, RemoteError,
    RemoteService,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// Mock Remote Service
// ============================================================================

/// Mock remote service that returns queued results. The catalog defaults to
/// the sixteen-item sample when nothing is queued.
#[derive(Default)]
pub struct MockRemoteService {
    catalogs: Mutex<VecDeque<Result<Vec<CatalogEntry>, RemoteError>>>,
    replies: Mutex<VecDeque<Result<ConversationReply, RemoteError>>>,
    selections: Mutex<VecDeque<Result<AgentSelection, RemoteError>>>,
    /// Record of all conversation requests made
    pub conversation_requests: Mutex<Vec<ConversationRequest>>,
    /// Record of all agent requests made
    pub agent_requests: Mutex<Vec<AgentRequest>>,
}

impl MockRemoteService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_catalog(&self, result: Result<Vec<CatalogEntry>, RemoteError>) {
        self.catalogs.lock().unwrap().push_back(result);
    }

    /// Queue a successful conversation reply
    pub fn queue_reply(&self, text: &str, advance: bool) {
        self.replies.lock().unwrap().push_back(Ok(ConversationReply {
            text: text.to_string(),
            advance,
        }));
    }

    pub fn queue_reply_error(&self, error: RemoteError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    /// Queue a successful agent selection
    pub fn queue_selection(&self, indices: &[usize]) {
        self.selections.lock().unwrap().push_back(Ok(AgentSelection {
            items: indices.iter().copied().map(crate::catalog::ItemId).collect(),
        }));
    }

    pub fn queue_selection_error(&self, error: RemoteError) {
        self.selections.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_conversation_requests(&self) -> Vec<ConversationRequest> {
        self.conversation_requests.lock().unwrap().clone()
    }

    pub fn recorded_agent_requests(&self) -> Vec<AgentRequest> {
        self.agent_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteService for MockRemoteService {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        self.catalogs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(sample_entries()))
    }

    async fn advance_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationReply, RemoteError> {
        self.conversation_requests
            .lock()
            .unwrap()
            .push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::network("No mock reply queued")))
    }

    async fn run_agent(&self, request: &AgentRequest) -> Result<AgentSelection, RemoteError> {
        self.agent_requests.lock().unwrap().push(request.clone());
        self.selections
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RemoteError::network("No mock selection queued")))
    }
}

// ============================================================================
// Delayed Mock Remote Service (for single-flight and teardown testing)
// ============================================================================

/// Mock remote service whose conversation and agent calls take `delay`
pub struct DelayedMockRemoteService {
    pub inner: MockRemoteService,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockRemoteService {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockRemoteService::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl RemoteService for DelayedMockRemoteService {
    async fn fetch_catalog(&self) -> Result<Vec<CatalogEntry>, RemoteError> {
        self.inner.fetch_catalog().await
    }

    async fn advance_conversation(
        &self,
        request: &ConversationRequest,
    ) -> Result<ConversationReply, RemoteError> {
        self.request_started.notify_waiters();
        tokio::time::sleep(self.delay).await;
        self.inner.advance_conversation(request).await
    }

    async fn run_agent(&self, request: &AgentRequest) -> Result<AgentSelection, RemoteError> {
        self.request_started.notify_waiters();
        tokio::time::sleep(self.delay).await;
        self.inner.run_agent(request).await
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

use crate::runtime::{SessionHandle, SessionRuntime, SseEvent};
use crate::state_machine::{Event, SessionContext, SessionView, Timing};
use chrono::Utc;
use tokio::sync::broadcast;

/// A running session wired to a mock remote service
pub struct TestRuntime<M: RemoteService + 'static> {
    pub handle: SessionHandle,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    pub remote: Arc<M>,
}

impl TestRuntime<MockRemoteService> {
    /// Start a session against an instant mock
    pub async fn start(remote: MockRemoteService) -> Self {
        Self::start_with(remote).await
    }
}

impl<M: RemoteService + 'static> TestRuntime<M> {
    /// Start a session with near-zero delays and send `SessionStarted`
    pub async fn start_with(remote: M) -> Self {
        let remote = Arc::new(remote);
        let context = SessionContext::new("test-session", Timing::instant());
        let handle = SessionRuntime::start(context, remote.clone(), "/furniture".to_string());
        let broadcast_rx = handle.subscribe();
        handle
            .send(Event::SessionStarted)
            .await
            .expect("Failed to start session");

        Self {
            handle,
            broadcast_rx,
            remote,
        }
    }

    pub async fn send_message(&self, text: &str) {
        self.handle
            .send(Event::UserMessage {
                text: text.to_string(),
                at: Utc::now(),
            })
            .await
            .expect("Failed to send message");
    }

    pub async fn send(&self, event: Event) {
        self.handle.send(event).await.expect("Failed to send event");
    }

    /// Wait until the published snapshot satisfies `predicate`
    pub async fn wait_for_view(
        &self,
        timeout: Duration,
        predicate: impl FnMut(&SessionView) -> bool,
    ) -> Option<SessionView> {
        let mut rx = self.handle.view_rx.clone();
        let view = tokio::time::timeout(timeout, rx.wait_for(predicate))
            .await
            .ok()?
            .ok()?
            .clone();
        Some(view)
    }

    /// Wait until the session is idle with `count` messages in history
    pub async fn wait_for_history(&self, count: usize) -> Option<SessionView> {
        self.wait_for_view(Duration::from_secs(2), |v| {
            !v.busy && v.history.len() == count
        })
        .await
    }

    /// Wait for a rejection on the stream
    pub async fn wait_for_error(&mut self, timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(SseEvent::Error { message })) => return Some(message),
                _ => continue,
            }
        }
        None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemId;
    use crate::runtime::{RuntimeConfig, RuntimeError, SessionManager, DEFAULT_IDLE_TTL};
    use crate::state_machine::script::{Cue, APOLOGY, WELCOME_TRIGGER};
    use crate::state_machine::state::{Origin, Stage};

    fn history_texts(view: &SessionView) -> Vec<&str> {
        view.history.iter().map(|m| m.text.as_str()).collect()
    }

    fn recommended_ids(view: &SessionView) -> Vec<ItemId> {
        view.items
            .iter()
            .filter(|c| c.recommended)
            .map(|c| c.item.id)
            .collect()
    }

    /// Answer every gathering question; the agent is dispatched afterwards
    async fn answer_all(remote: MockRemoteService) -> TestRuntime<MockRemoteService> {
        remote.queue_reply("Hi!", false);
        for _ in 0..4 {
            remote.queue_reply("Got it.", true);
        }

        let rt = TestRuntime::start(remote).await;
        rt.wait_for_history(1).await.expect("welcome revealed");

        for (i, answer) in ["a loft", "mid-century", "$2500", "two cats"]
            .iter()
            .enumerate()
        {
            rt.send_message(answer).await;
            if i < 3 {
                rt.wait_for_history(3 + 2 * i).await.expect("turn completed");
            }
        }
        rt
    }

    /// Drive a fresh session to Presenting with the given recommendation
    async fn run_to_presenting(picks: &[usize]) -> TestRuntime<MockRemoteService> {
        let remote = MockRemoteService::new();
        remote.queue_selection(picks);
        let rt = answer_all(remote).await;

        rt.wait_for_view(Duration::from_secs(2), |v| {
            v.stage == Stage::Presenting && !v.busy
        })
        .await
        .expect("presenting reached");
        rt
    }

    #[tokio::test]
    async fn test_mock_remote_service() {
        let mock = MockRemoteService::new();
        mock.queue_reply("Hello", true);

        let request = ConversationRequest {
            user_message: "hi".into(),
            conversation_history: vec![],
            current_step: 1,
            conversation_data: Default::default(),
        };
        let reply = mock.advance_conversation(&request).await.unwrap();
        assert_eq!(reply.text, "Hello");
        assert!(reply.advance);
        assert_eq!(mock.recorded_conversation_requests().len(), 1);

        assert!(mock.advance_conversation(&request).await.is_err());
        assert_eq!(mock.fetch_catalog().await.unwrap().len(), 16);
    }

    /// Fresh session: welcome is requested, revealed and committed
    #[tokio::test]
    async fn test_welcome_scenario() {
        let remote = MockRemoteService::new();
        remote.queue_reply("Hi!", false);

        let rt = TestRuntime::start(remote).await;
        let view = rt.wait_for_history(1).await.expect("welcome revealed");

        assert_eq!(history_texts(&view), vec!["Hi!"]);
        assert_eq!(view.history[0].origin, Origin::Agent);
        assert_eq!(view.stage, Stage::Welcome);
        assert!(!view.busy);

        let requests = rt.remote.recorded_conversation_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_message, WELCOME_TRIGGER);
        assert_eq!(requests[0].current_step, 1);
    }

    /// Rapid sends while a turn is outstanding reach the remote only once
    #[tokio::test]
    async fn test_rapid_sends_issue_one_request() {
        let remote = DelayedMockRemoteService::new(Duration::from_millis(100));
        remote.inner.queue_reply("Hi!", false);
        remote.inner.queue_reply("Tell me more", false);

        let mut rt = TestRuntime::start_with(remote).await;
        rt.wait_for_history(1).await.expect("welcome revealed");

        for i in 0..5 {
            rt.send_message(&format!("message {i}")).await;
        }
        assert!(rt.wait_for_error(Duration::from_secs(1)).await.is_some());

        let view = rt.wait_for_history(3).await.expect("turn completed");
        assert_eq!(history_texts(&view), vec!["Hi!", "message 0", "Tell me more"]);
        assert_eq!(rt.remote.inner.recorded_conversation_requests().len(), 2);
    }

    /// Answering the budget stage runs analysis and presents the picks
    #[tokio::test]
    async fn test_gathering_to_presenting() {
        let rt = run_to_presenting(&[1, 3, 5]).await;
        let view = rt.handle.view();

        let picks: Vec<_> = [1, 3, 5].into_iter().map(ItemId).collect();
        let selected: Vec<_> = view
            .items
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.item.id)
            .collect();
        assert_eq!(selected, picks);
        assert_eq!(recommended_ids(&view), picks);

        let texts = history_texts(&view);
        assert!(texts.contains(&Cue::AnalysisStart.text()));
        assert_eq!(texts.last(), Some(&Cue::FurniturePresentation.text()));
        assert_eq!(view.answers.space, "a loft");
        assert_eq!(view.answers.additional, "two cats");

        let agent = rt.remote.recorded_agent_requests();
        assert_eq!(agent.len(), 1);
        assert_eq!(
            agent[0].house_prompt,
            "Space: a loft. Style: mid-century. Budget: $2500. Additional requirements: two cats"
        );
    }

    /// Toggle then confirm runs the video sequence to completion
    #[tokio::test]
    async fn test_toggle_confirm_to_complete() {
        let rt = run_to_presenting(&[1, 3, 5]).await;

        rt.send(Event::ToggleItem { item: ItemId(2) }).await;
        rt.wait_for_view(Duration::from_secs(1), |v| v.selected_count == 4)
            .await
            .expect("toggle applied");

        rt.send(Event::ConfirmSelection { at: Utc::now() }).await;
        let view = rt
            .wait_for_view(Duration::from_secs(2), |v| {
                v.stage == Stage::Complete && !v.busy
            })
            .await
            .expect("complete reached");

        let texts = history_texts(&view);
        assert!(texts.contains(&"I've finalized my furniture selection (4 items chosen)"));
        assert!(texts.contains(&Cue::VideoGeneration.text()));
        assert_eq!(texts.last(), Some(&Cue::VideoComplete.text()));
        assert_eq!(view.step_index, 8);
    }

    /// A failed turn reveals the apology and leaves the stage alone
    #[tokio::test]
    async fn test_failure_reveals_apology() {
        let remote = MockRemoteService::new();
        remote.queue_reply("Hi!", false);
        remote.queue_reply_error(RemoteError::status("HTTP 500"));

        let rt = TestRuntime::start(remote).await;
        rt.wait_for_history(1).await.expect("welcome revealed");

        rt.send_message("my space").await;
        let view = rt.wait_for_history(3).await.expect("apology revealed");
        assert_eq!(history_texts(&view).last(), Some(&APOLOGY));
        assert_eq!(view.stage, Stage::Welcome);
        assert!(view.input_open);
    }

    /// A failed agent run apologizes; advancing again re-dispatches the agent
    #[tokio::test]
    async fn test_agent_failure_then_retry() {
        let remote = MockRemoteService::new();
        remote.queue_selection_error(RemoteError::status("HTTP 502"));
        remote.queue_selection(&[0, 7]);
        let rt = answer_all(remote).await;

        let view = rt
            .wait_for_view(Duration::from_secs(2), |v| {
                !v.busy && v.history.last().is_some_and(|m| m.text == APOLOGY)
            })
            .await
            .expect("apology revealed");
        assert_eq!(view.stage, Stage::Analyzing);
        assert!(view.can_advance);

        rt.send(Event::Advance).await;
        let view = rt
            .wait_for_view(Duration::from_secs(2), |v| {
                v.stage == Stage::Presenting && !v.busy
            })
            .await
            .expect("presenting after retry");
        assert_eq!(recommended_ids(&view), vec![ItemId(0), ItemId(7)]);
        assert_eq!(rt.remote.recorded_agent_requests().len(), 2);
    }

    /// An agent answer that beats the catalog is not applied; the catalog
    /// is fetched again and a retry presents the picks
    #[tokio::test]
    async fn test_agent_before_catalog_refetches() {
        let remote = MockRemoteService::new();
        remote.queue_catalog(Err(RemoteError::network("catalog unreachable")));
        remote.queue_selection(&[1, 3]);
        remote.queue_selection(&[2, 4]);
        let rt = answer_all(remote).await;

        let view = rt
            .wait_for_view(Duration::from_secs(2), |v| {
                v.stage == Stage::Analyzing && !v.busy && v.catalog_loaded
            })
            .await
            .expect("catalog fetched again");
        assert_eq!(history_texts(&view).last(), Some(&APOLOGY));
        assert!(recommended_ids(&view).is_empty());

        rt.send(Event::Advance).await;
        let view = rt
            .wait_for_view(Duration::from_secs(2), |v| {
                v.stage == Stage::Presenting && !v.busy
            })
            .await
            .expect("presenting after retry");
        assert_eq!(recommended_ids(&view), vec![ItemId(2), ItemId(4)]);
    }

    /// Closing a session cancels its in-flight request and stops the loop
    #[tokio::test]
    async fn test_close_cancels_pending_work() {
        let remote = DelayedMockRemoteService::new(Duration::from_secs(30));
        let started = remote.request_started.clone();
        let notified = started.notified();

        let rt = TestRuntime::start_with(remote).await;
        notified.await;
        rt.handle.close();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(
            rt.handle.send(Event::Advance).await,
            Err(RuntimeError::Closed("test-session".to_string()))
        );
        assert!(rt.handle.view().busy, "no outcome is applied after close");
    }

    #[tokio::test]
    async fn test_session_manager_lifecycle() {
        let remote = MockRemoteService::new();
        remote.queue_reply("Welcome!", false);
        let manager = SessionManager::new(
            Arc::new(remote),
            RuntimeConfig {
                timing: Timing::instant(),
                asset_base: "/furniture".to_string(),
                idle_ttl: DEFAULT_IDLE_TTL,
            },
        );

        let id = manager.create().await.unwrap();
        assert!(manager.view(&id).await.is_ok());

        let (view, _rx) = manager.subscribe(&id).await.unwrap();
        assert_eq!(view.session_id, id);

        manager.close(&id).await.unwrap();
        assert_eq!(
            manager.view(&id).await.unwrap_err(),
            RuntimeError::NotFound(id.clone())
        );
        assert!(manager.close(&id).await.is_err());
    }

    /// Sessions without a stream subscriber are closed once the TTL passes
    #[tokio::test]
    async fn test_idle_sessions_are_evicted() {
        let manager = SessionManager::new(
            Arc::new(MockRemoteService::new()),
            RuntimeConfig {
                timing: Timing::instant(),
                asset_base: "/furniture".to_string(),
                idle_ttl: Duration::from_secs(60),
            },
        );
        let watched = manager.create().await.unwrap();
        let abandoned = manager.create().await.unwrap();
        let (_, stream) = manager.subscribe(&watched).await.unwrap();
        let abandoned_handle = manager.get(&abandoned).await.unwrap();

        let t0 = std::time::Instant::now();
        assert_eq!(manager.evict_idle(t0).await, 0);
        assert_eq!(manager.evict_idle(t0 + Duration::from_secs(30)).await, 0);
        assert_eq!(manager.evict_idle(t0 + Duration::from_secs(61)).await, 1);

        assert_eq!(
            manager.view(&abandoned).await.unwrap_err(),
            RuntimeError::NotFound(abandoned.clone())
        );
        assert!(abandoned_handle.cancel.is_cancelled());
        assert!(manager.view(&watched).await.is_ok());

        // The idle clock starts when the last subscriber leaves
        drop(stream);
        let t1 = t0 + Duration::from_secs(120);
        assert_eq!(manager.evict_idle(t1).await, 0);
        let (_, stream) = manager.subscribe(&watched).await.unwrap();
        assert_eq!(manager.evict_idle(t1 + Duration::from_secs(90)).await, 0);
        drop(stream);
        assert_eq!(manager.evict_idle(t1 + Duration::from_secs(100)).await, 0);
        assert_eq!(manager.evict_idle(t1 + Duration::from_secs(161)).await, 1);
        assert!(manager.view(&watched).await.is_err());
    }
}

//! Session runtime executor

use super::flight::FlightTicket;
use super::{SessionHandle, SseEvent};

use crate::remote::RemoteService;
use crate::state_machine::{
    transition, Effect, Event, FlightId, Session, SessionContext, SessionView,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Event loop for one session: applies transitions and executes effects.
/// Remote calls, timers and reveal tickers run as tasks that report back
/// through the event channel.
pub struct SessionRuntime<R: RemoteService + ?Sized + 'static> {
    context: SessionContext,
    session: Session,
    remote: Arc<R>,
    asset_base: String,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    view_tx: watch::Sender<SessionView>,
    /// Cancelled on teardown; every spawned task watches it
    cancel: CancellationToken,
}

impl<R: RemoteService + ?Sized + 'static> SessionRuntime<R> {
    /// Spawn the runtime for a fresh session. Nothing happens until
    /// `Event::SessionStarted` is sent through the returned handle.
    pub fn start(context: SessionContext, remote: Arc<R>, asset_base: String) -> SessionHandle {
        let session = Session::new();
        let (event_tx, event_rx) = mpsc::channel(64);
        let (broadcast_tx, _) = broadcast::channel(256);
        let (view_tx, view_rx) = watch::channel(SessionView::new(
            &context.session_id,
            &session,
            &asset_base,
        ));
        let cancel = CancellationToken::new();

        let handle = SessionHandle {
            session_id: context.session_id.clone(),
            event_tx: event_tx.clone(),
            broadcast_tx: broadcast_tx.clone(),
            view_rx,
            cancel: cancel.clone(),
        };

        let runtime = Self {
            context,
            session,
            remote,
            asset_base,
            event_rx,
            event_tx,
            broadcast_tx,
            view_tx,
            cancel,
        };
        tokio::spawn(runtime.run());

        handle
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => break,

                Some(event) = self.event_rx.recv() => self.process_event(event),

                else => break,
            }
        }

        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    fn process_event(&mut self, event: Event) {
        let name = event.name();
        tracing::debug!(event = name, flight = ?event.flight(), "Processing event");
        match &event {
            Event::CatalogFailed { message } => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    error = %message,
                    "Catalog unavailable"
                );
            }
            Event::RemoteFailed {
                flight,
                kind,
                message,
            } => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    %flight,
                    ?kind,
                    error = %message,
                    "Remote call failed"
                );
            }
            _ => {}
        }

        match transition(&self.session, &self.context, event) {
            Ok(result) => {
                let before = self.session.stage();
                self.session = result.new_session;
                if self.session.stage() != before {
                    tracing::info!(
                        session_id = %self.context.session_id,
                        from = %before,
                        to = %self.session.stage(),
                        "Stage changed"
                    );
                }
                for effect in result.effects {
                    self.execute_effect(effect);
                }
            }
            Err(e) if e.is_stale() => {
                tracing::debug!(event = name, error = %e, "Ignoring stale outcome");
            }
            Err(e) => {
                // Rejections are user-facing (e.g. "request in progress")
                tracing::warn!(
                    session_id = %self.context.session_id,
                    event = name,
                    error = %e,
                    "Event rejected"
                );
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn execute_effect(&mut self, effect: Effect) {
        if let Some(flight) = effect.flight() {
            tracing::trace!(%flight, ?effect, "Executing effect");
        }

        match effect {
            Effect::FetchCatalog => {
                let remote = self.remote.clone();
                let event_tx = self.event_tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    let event = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        result = remote.fetch_catalog() => match result {
                            Ok(entries) => Event::CatalogLoaded { entries },
                            Err(e) => Event::CatalogFailed { message: e.message },
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
            }

            Effect::RequestConversation { flight, request } => {
                let remote = self.remote.clone();
                let ticket = FlightTicket::new(flight, self.event_tx.clone());
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => ticket.disarm(),
                        result = remote.advance_conversation(&request) => {
                            let event = match result {
                                Ok(reply) => Event::ConversationReplied { flight, reply },
                                Err(e) => Event::RemoteFailed {
                                    flight,
                                    kind: e.kind,
                                    message: e.message,
                                },
                            };
                            ticket.resolve(event).await;
                        }
                    }
                });
            }

            Effect::RunAgent { flight, request } => {
                let remote = self.remote.clone();
                let ticket = FlightTicket::new(flight, self.event_tx.clone());
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => ticket.disarm(),
                        result = remote.run_agent(&request) => {
                            let event = match result {
                                Ok(selection) => Event::AgentSelected { flight, selection },
                                Err(e) => Event::RemoteFailed {
                                    flight,
                                    kind: e.kind,
                                    message: e.message,
                                },
                            };
                            ticket.resolve(event).await;
                        }
                    }
                });
            }

            Effect::ScheduleTimer {
                flight,
                pause,
                delay,
            } => {
                let event_tx = self.event_tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let _ = event_tx.send(Event::TimerFired { flight, pause }).await;
                        }
                    }
                });
            }

            Effect::StartReveal {
                flight,
                ticks,
                interval,
            } => {
                let event_tx = self.event_tx.clone();
                let cancel = self.cancel.clone();
                tokio::spawn(run_reveal_ticker(flight, ticks, interval, event_tx, cancel));
            }

            Effect::RevealProgress { text, .. } => {
                let _ = self.broadcast_tx.send(SseEvent::Reveal { text });
            }

            Effect::MessageCommitted { message } => {
                tracing::info!(
                    session_id = %self.context.session_id,
                    message_id = message.id.0,
                    origin = ?message.origin,
                    "Message committed"
                );
                let _ = self.broadcast_tx.send(SseEvent::Message { message });
            }

            Effect::RecommendationTrimmed { dropped } => {
                tracing::warn!(
                    session_id = %self.context.session_id,
                    dropped,
                    "Agent recommended items outside the catalog"
                );
            }

            Effect::PublishState => {
                let view =
                    SessionView::new(&self.context.session_id, &self.session, &self.asset_base);
                self.view_tx.send_replace(view.clone());
                let _ = self.broadcast_tx.send(SseEvent::StateChange {
                    view: Box::new(view),
                });
            }
        }
    }
}

/// Send exactly `ticks` reveal ticks, one per `interval`
async fn run_reveal_ticker(
    flight: FlightId,
    ticks: usize,
    interval: Duration,
    event_tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
) {
    let mut timer = tokio::time::interval(interval.max(Duration::from_millis(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    timer.tick().await;

    for _ in 0..ticks {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            _ = timer.tick() => {}
        }
        let tick = Event::RevealTick {
            flight,
            at: Utc::now(),
        };
        if event_tx.send(tick).await.is_err() {
            return;
        }
    }
}

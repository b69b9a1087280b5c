//! Outcome delivery for remote calls

use crate::remote::RemoteErrorKind;
use crate::state_machine::{Event, FlightId};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Obligation to report exactly one outcome for a flight.
///
/// A ticket dropped without being resolved (the task panicked or returned
/// early) reports a failure, so the flight always ends and the guard is
/// always released. Disarm it on teardown, when nobody is listening.
pub struct FlightTicket {
    flight: FlightId,
    event_tx: mpsc::Sender<Event>,
    armed: bool,
}

impl FlightTicket {
    pub fn new(flight: FlightId, event_tx: mpsc::Sender<Event>) -> Self {
        Self {
            flight,
            event_tx,
            armed: true,
        }
    }

    pub async fn resolve(mut self, event: Event) {
        self.armed = false;
        if self.event_tx.send(event).await.is_err() {
            tracing::debug!(flight = %self.flight, "Session gone, dropping outcome");
        }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FlightTicket {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!(flight = %self.flight, "Remote task ended without an outcome");
        let failure = Event::RemoteFailed {
            flight: self.flight,
            kind: RemoteErrorKind::Network,
            message: "request ended without a result".to_string(),
        };
        match self.event_tx.try_send(failure) {
            Ok(()) => {}
            // A full queue must not swallow the failure, or the guard is never released
            Err(TrySendError::Full(failure)) => {
                let event_tx = self.event_tx.clone();
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(async move {
                            let _ = event_tx.send(failure).await;
                        });
                    }
                    Err(_) => {
                        tracing::error!(flight = %self.flight, "Event queue full, failure lost");
                    }
                }
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(flight = %self.flight, "Session gone, dropping failure");
            }
        }
    }
}

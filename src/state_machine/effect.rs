//! Effects produced by state transitions

use super::guard::FlightId;
use super::state::{Message, Pause};
use crate::remote::{AgentRequest, ConversationRequest};
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch the furniture catalog
    FetchCatalog,

    /// Send a conversation turn on behalf of a flight
    RequestConversation {
        flight: FlightId,
        request: ConversationRequest,
    },

    /// Run the selection agent on behalf of a flight
    RunAgent {
        flight: FlightId,
        request: AgentRequest,
    },

    /// Fire `TimerFired` after `delay`
    ScheduleTimer {
        flight: FlightId,
        pause: Pause,
        delay: Duration,
    },

    /// Fire exactly `ticks` `RevealTick`s, one per `interval`
    StartReveal {
        flight: FlightId,
        ticks: usize,
        interval: Duration,
    },

    /// Notify clients of the currently displayed prefix
    RevealProgress { flight: FlightId, text: String },

    /// Notify clients of a newly committed message
    MessageCommitted { message: Message },

    /// Notify clients of the new session snapshot
    PublishState,

    /// The agent named items outside the catalog; they were left out
    RecommendationTrimmed { dropped: usize },
}

impl Effect {
    pub fn flight(&self) -> Option<FlightId> {
        match self {
            Effect::RequestConversation { flight, .. }
            | Effect::RunAgent { flight, .. }
            | Effect::ScheduleTimer { flight, .. }
            | Effect::StartReveal { flight, .. }
            | Effect::RevealProgress { flight, .. } => Some(*flight),
            _ => None,
        }
    }
}

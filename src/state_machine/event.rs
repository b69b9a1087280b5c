//! Events that can occur in a session

use super::guard::FlightId;
use super::state::Pause;
use crate::catalog::{CatalogEntry, ItemId};
use crate::remote::{AgentSelection, ConversationReply, RemoteErrorKind};
use chrono::{DateTime, Utc};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Lifecycle
    SessionStarted,
    CatalogLoaded {
        entries: Vec<CatalogEntry>,
    },
    CatalogFailed {
        message: String,
    },

    // User commands
    UserMessage {
        text: String,
        at: DateTime<Utc>,
    },
    Advance,
    ToggleItem {
        item: ItemId,
    },
    ConfirmSelection {
        at: DateTime<Utc>,
    },

    // Remote outcomes
    ConversationReplied {
        flight: FlightId,
        reply: ConversationReply,
    },
    AgentSelected {
        flight: FlightId,
        selection: AgentSelection,
    },
    RemoteFailed {
        flight: FlightId,
        kind: RemoteErrorKind,
        message: String,
    },

    // Timers
    TimerFired {
        flight: FlightId,
        pause: Pause,
    },
    RevealTick {
        flight: FlightId,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Flight the event belongs to, for asynchronous outcomes
    pub fn flight(&self) -> Option<FlightId> {
        match self {
            Event::ConversationReplied { flight, .. }
            | Event::AgentSelected { flight, .. }
            | Event::RemoteFailed { flight, .. }
            | Event::TimerFired { flight, .. }
            | Event::RevealTick { flight, .. } => Some(*flight),
            _ => None,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionStarted => "session_started",
            Event::CatalogLoaded { .. } => "catalog_loaded",
            Event::CatalogFailed { .. } => "catalog_failed",
            Event::UserMessage { .. } => "user_message",
            Event::Advance => "advance",
            Event::ToggleItem { .. } => "toggle_item",
            Event::ConfirmSelection { .. } => "confirm_selection",
            Event::ConversationReplied { .. } => "conversation_replied",
            Event::AgentSelected { .. } => "agent_selected",
            Event::RemoteFailed { .. } => "remote_failed",
            Event::TimerFired { .. } => "timer_fired",
            Event::RevealTick { .. } => "reveal_tick",
        }
    }
}

//! Session aggregate and the wizard's stages

use super::guard::{FlightId, SingleFlightGuard};
use super::reveal::Reveal;
use super::script::Cue;
use super::selection::Selection;
use crate::catalog::Catalog;
use crate::remote::{ConversationData, WireMessage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Wizard stage. Each stage has a fixed step number (1..=8).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Welcome,
    GatheringSpace,
    GatheringStyle,
    GatheringBudget,
    Analyzing,
    Presenting,
    GeneratingVideo,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Welcome,
        Stage::GatheringSpace,
        Stage::GatheringStyle,
        Stage::GatheringBudget,
        Stage::Analyzing,
        Stage::Presenting,
        Stage::GeneratingVideo,
        Stage::Complete,
    ];

    pub fn step_index(self) -> u8 {
        match self {
            Stage::Welcome => 1,
            Stage::GatheringSpace => 2,
            Stage::GatheringStyle => 3,
            Stage::GatheringBudget => 4,
            Stage::Analyzing => 5,
            Stage::Presenting => 6,
            Stage::GeneratingVideo => 7,
            Stage::Complete => 8,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Welcome => "Welcome",
            Stage::GatheringSpace => "Space",
            Stage::GatheringStyle => "Style",
            Stage::GatheringBudget => "Budget",
            Stage::Analyzing => "Analysis",
            Stage::Presenting => "Selection",
            Stage::GeneratingVideo => "Video",
            Stage::Complete => "Complete",
        }
    }

    /// Free-text input is open only while preferences are being gathered
    pub fn accepts_input(self) -> bool {
        self.answer_slot().is_some()
    }

    pub fn placeholder(self) -> &'static str {
        match self {
            Stage::Welcome => "Tell me about your project...",
            Stage::GatheringSpace => "Share more details...",
            Stage::GatheringStyle => "What are your preferences...",
            Stage::GatheringBudget => "Any additional requirements...",
            _ => "Type your response...",
        }
    }

    /// Label of the manual advance control, for stages that have one
    pub fn advance_label(self) -> Option<&'static str> {
        match self {
            Stage::Welcome => Some("Talk Space Details →"),
            Stage::GatheringSpace => Some("Discuss Style →"),
            Stage::GatheringStyle => Some("Set Budget →"),
            Stage::GatheringBudget => Some("Start Analysis →"),
            _ => None,
        }
    }

    /// Answer recorded when leaving this stage
    pub fn answer_slot(self) -> Option<AnswerSlot> {
        match self {
            Stage::Welcome => Some(AnswerSlot::Space),
            Stage::GatheringSpace => Some(AnswerSlot::Style),
            Stage::GatheringStyle => Some(AnswerSlot::Budget),
            Stage::GatheringBudget => Some(AnswerSlot::Additional),
            _ => None,
        }
    }

    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(usize::from(self.step_index())).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label(), self.step_index())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSlot {
    Space,
    Style,
    Budget,
    Additional,
}

/// The four free-text answers, one per gathering stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Answers {
    pub space: String,
    pub style: String,
    pub budget: String,
    pub additional: String,
}

impl Answers {
    pub fn record(&mut self, slot: AnswerSlot, text: String) {
        match slot {
            AnswerSlot::Space => self.space = text,
            AnswerSlot::Style => self.style = text,
            AnswerSlot::Budget => self.budget = text,
            AnswerSlot::Additional => self.additional = text,
        }
    }

    /// Prompt handed to the selection agent
    pub fn house_prompt(&self) -> String {
        format!(
            "Space: {}. Style: {}. Budget: {}. Additional requirements: {}",
            self.space, self.style, self.budget, self.additional
        )
    }

    pub fn to_wire(&self) -> ConversationData {
        ConversationData {
            space_type: self.space.clone(),
            style_preferences: self.style.clone(),
            budget_range: self.budget.clone(),
            additional_requirements: self.additional.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Agent,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// A committed history entry. Never mutated after commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub origin: Origin,
    pub text: String,
    pub committed_at: DateTime<Utc>,
}

impl Message {
    pub fn to_wire(&self) -> WireMessage {
        WireMessage {
            id: self.id.0.to_string(),
            kind: match self.origin {
                Origin::Agent => "ai",
                Origin::User => "user",
            }
            .to_string(),
            content: self.text.clone(),
            timestamp: self.committed_at,
        }
    }
}

/// Named delays inside staged sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pause {
    AnalysisSettle,
    AgentDispatch,
    Presentation,
    VideoIntro,
    VideoRender,
}

/// One step of a flight's remaining work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceStep {
    Pause(Pause),
    Cue(Cue),
    DispatchAgent,
    Enter(Stage),
    /// Release the guard, then leave the current gathering stage
    Advance,
}

/// Which remote call a requesting flight is waiting on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RequestKind {
    Welcome,
    Turn { stage: Stage },
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightPhase {
    Waiting { pause: Pause },
    Requesting { request: RequestKind },
    Revealing { reveal: Reveal },
}

/// The one logical interaction in progress while the guard is held
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flight {
    pub id: FlightId,
    pub phase: FlightPhase,
    pub pending: VecDeque<SequenceStep>,
}

/// Root aggregate. All mutation goes through `transition`.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(super) started: bool,
    pub(super) stage: Stage,
    pub(super) answers: Answers,
    pub(super) latest_input: Option<String>,
    pub(super) history: Vec<Message>,
    pub(super) guard: SingleFlightGuard,
    pub(super) flight: Option<Flight>,
    pub(super) catalog: Option<Arc<Catalog>>,
    pub(super) selection: Selection,
    pub(super) next_message_id: u64,
    pub(super) next_flight_id: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn step_index(&self) -> u8 {
        self.stage.step_index()
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    pub fn latest_input(&self) -> Option<&str> {
        self.latest_input.as_deref()
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_held()
    }

    pub fn flight(&self) -> Option<&Flight> {
        self.flight.as_ref()
    }

    pub fn catalog(&self) -> Option<&Arc<Catalog>> {
        self.catalog.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Text of the message currently being revealed, as displayed so far
    pub fn pending_reveal(&self) -> Option<&str> {
        match &self.flight {
            Some(Flight {
                phase: FlightPhase::Revealing { reveal },
                ..
            }) => Some(reveal.displayed()),
            _ => None,
        }
    }

    pub(super) fn allocate_message_id(&mut self) -> MessageId {
        self.next_message_id += 1;
        MessageId(self.next_message_id)
    }

    pub(super) fn allocate_flight_id(&mut self) -> FlightId {
        self.next_flight_id += 1;
        FlightId(self.next_flight_id)
    }

    pub(super) fn commit(&mut self, origin: Origin, text: String, at: DateTime<Utc>) -> Message {
        let message = Message {
            id: self.allocate_message_id(),
            origin,
            text,
            committed_at: at,
        };
        self.history.push(message.clone());
        message
    }
}

/// Delays used by the staged sequences and the reveal ticker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub reveal_tick: Duration,
    pub analysis_settle: Duration,
    pub agent_dispatch: Duration,
    pub presentation: Duration,
    pub video_intro: Duration,
    pub video_render: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            reveal_tick: Duration::from_millis(20),
            analysis_settle: Duration::from_millis(300),
            agent_dispatch: Duration::from_millis(2000),
            presentation: Duration::from_millis(500),
            video_intro: Duration::from_millis(500),
            video_render: Duration::from_millis(3000),
        }
    }
}

impl Timing {
    /// Near-zero delays for tests
    #[cfg(test)]
    pub fn instant() -> Self {
        Self {
            reveal_tick: Duration::from_millis(1),
            analysis_settle: Duration::from_millis(1),
            agent_dispatch: Duration::from_millis(1),
            presentation: Duration::from_millis(1),
            video_intro: Duration::from_millis(1),
            video_render: Duration::from_millis(1),
        }
    }

    pub fn delay(&self, pause: Pause) -> Duration {
        match pause {
            Pause::AnalysisSettle => self.analysis_settle,
            Pause::AgentDispatch => self.agent_dispatch,
            Pause::Presentation => self.presentation,
            Pause::VideoIntro => self.video_intro,
            Pause::VideoRender => self.video_render,
        }
    }
}

/// Immutable context for transitions
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub timing: Timing,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, timing: Timing) -> Self {
        Self {
            session_id: session_id.into(),
            timing,
        }
    }
}

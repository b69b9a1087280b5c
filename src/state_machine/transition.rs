//! Pure state transition function
//!
//! Given the current session and one event, compute the next session and the
//! effects the runtime must execute. No I/O, no clock reads: timestamps come
//! in on events.

use super::guard::FlightId;
use super::reveal::{Reveal, RevealStep};
use super::script::{confirmation_text, Cue, APOLOGY, WELCOME_TRIGGER};
use super::selection::SelectionError;
use super::state::{
    Flight, FlightPhase, Message, Origin, Pause, RequestKind, SequenceStep, Session,
    SessionContext, Stage,
};
use super::{Effect, Event};
use crate::catalog::{Catalog, CatalogError, ItemId};
use crate::remote::{AgentRequest, ConversationData, ConversationRequest};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_session: Session,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            new_session: session,
            effects: vec![],
        }
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition. A failed transition leaves the
/// session untouched.
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("A request is already in progress, wait for it to finish")]
    Busy,
    #[error("Message is empty")]
    EmptyInput,
    #[error("Text input is closed in stage {0}")]
    InputClosed(Stage),
    #[error("Select at least one item before confirming")]
    EmptySelection,
    #[error("Item {0} is not in the catalog")]
    UnknownItem(ItemId),
    #[error("Selection can only change while recommendations are shown")]
    NotPresenting,
    #[error("Nothing to advance in stage {0}")]
    NothingToAdvance(Stage),
    #[error("Outcome for {0} arrived after its flight ended")]
    Stale(FlightId),
    #[error("Invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TransitionError {
    /// Stale outcomes are expected and not worth reporting to clients
    pub fn is_stale(&self) -> bool {
        matches!(self, TransitionError::Stale(_))
    }
}

impl From<SelectionError> for TransitionError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::UnknownItem(id) => TransitionError::UnknownItem(id),
            other @ SelectionError::AlreadyRecommended => {
                TransitionError::InvalidTransition(other.to_string())
            }
        }
    }
}

/// Steps run after leaving the budget stage
fn analysis_sequence() -> [SequenceStep; 4] {
    [
        SequenceStep::Pause(Pause::AnalysisSettle),
        SequenceStep::Cue(Cue::AnalysisStart),
        SequenceStep::Pause(Pause::AgentDispatch),
        SequenceStep::DispatchAgent,
    ]
}

/// Steps run once the agent has recommended items
fn presentation_sequence() -> [SequenceStep; 2] {
    [
        SequenceStep::Pause(Pause::Presentation),
        SequenceStep::Cue(Cue::FurniturePresentation),
    ]
}

/// Steps run after the selection is confirmed
fn video_sequence() -> [SequenceStep; 5] {
    [
        SequenceStep::Pause(Pause::VideoIntro),
        SequenceStep::Cue(Cue::VideoGeneration),
        SequenceStep::Pause(Pause::VideoRender),
        SequenceStep::Enter(Stage::Complete),
        SequenceStep::Cue(Cue::VideoComplete),
    ]
}

/// Pure transition function
#[allow(clippy::too_many_lines)]
pub fn transition(
    session: &Session,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    let mut next = session.clone();
    let mut effects = Vec::new();

    match event {
        Event::SessionStarted => {
            if next.started {
                return Err(TransitionError::InvalidTransition(
                    "session already started".to_string(),
                ));
            }
            next.started = true;
            effects.push(Effect::FetchCatalog);

            let request = ConversationRequest {
                user_message: WELCOME_TRIGGER.to_string(),
                conversation_history: vec![],
                current_step: Stage::Welcome.step_index(),
                conversation_data: ConversationData::default(),
            };
            open_request(&mut next, RequestKind::Welcome, request, &mut effects)?;
            effects.push(Effect::PublishState);
        }

        Event::CatalogLoaded { entries } => {
            if next.catalog.is_some() {
                return Err(TransitionError::InvalidTransition(
                    "catalog already loaded".to_string(),
                ));
            }
            next.catalog = Some(Arc::new(Catalog::from_entries(entries)?));
            effects.push(Effect::PublishState);
        }

        // Nothing to record; the agent outcome handler re-fetches if needed
        Event::CatalogFailed { .. } => {}

        Event::UserMessage { text, at } => {
            let text = text.trim();
            if text.is_empty() {
                return Err(TransitionError::EmptyInput);
            }
            let stage = next.stage;
            if !stage.accepts_input() {
                return Err(TransitionError::InputClosed(stage));
            }
            if next.guard.is_held() {
                return Err(TransitionError::Busy);
            }

            // History sent is what preceded this message
            let request = ConversationRequest {
                user_message: text.to_string(),
                conversation_history: next.history.iter().map(Message::to_wire).collect(),
                current_step: stage.step_index(),
                conversation_data: next.answers.to_wire(),
            };
            let message = next.commit(Origin::User, text.to_string(), at);
            next.latest_input = Some(text.to_string());
            effects.push(Effect::MessageCommitted { message });

            open_request(&mut next, RequestKind::Turn { stage }, request, &mut effects)?;
            effects.push(Effect::PublishState);
        }

        Event::Advance => {
            if next.guard.is_held() {
                return Err(TransitionError::Busy);
            }
            match next.stage {
                stage if stage.accepts_input() => {
                    advance_gathering(&mut next, context, &mut effects)?;
                }
                // A previous agent call failed; try it again
                Stage::Analyzing => {
                    open_sequence(
                        &mut next,
                        context,
                        [SequenceStep::DispatchAgent],
                        &mut effects,
                    )?;
                }
                stage => return Err(TransitionError::NothingToAdvance(stage)),
            }
            effects.push(Effect::PublishState);
        }

        Event::ToggleItem { item } => {
            if next.stage != Stage::Presenting {
                return Err(TransitionError::NotPresenting);
            }
            let catalog = next.catalog.clone().ok_or(TransitionError::UnknownItem(item))?;
            next.selection.toggle(item, &catalog)?;
            effects.push(Effect::PublishState);
        }

        Event::ConfirmSelection { at } => {
            if next.stage != Stage::Presenting {
                return Err(TransitionError::NotPresenting);
            }
            if next.selection.is_empty() {
                return Err(TransitionError::EmptySelection);
            }
            if next.guard.is_held() {
                return Err(TransitionError::Busy);
            }

            let message = next.commit(
                Origin::User,
                confirmation_text(next.selection.len()),
                at,
            );
            effects.push(Effect::MessageCommitted { message });
            next.stage = Stage::GeneratingVideo;
            open_sequence(&mut next, context, video_sequence(), &mut effects)?;
            effects.push(Effect::PublishState);
        }

        Event::ConversationReplied { flight, reply } => {
            let current = take_flight(&mut next, flight)?;
            let request = match current.phase {
                FlightPhase::Requesting {
                    request: request @ (RequestKind::Welcome | RequestKind::Turn { .. }),
                } => request,
                _ => return Err(TransitionError::Stale(flight)),
            };

            // The welcome reply never advances the wizard
            let mut pending = VecDeque::new();
            if reply.advance && matches!(request, RequestKind::Turn { .. }) {
                pending.push_back(SequenceStep::Advance);
            }
            park_reveal(&mut next, context, flight, reply.text, pending, &mut effects);
            effects.push(Effect::PublishState);
        }

        Event::AgentSelected { flight, selection } => {
            let current = take_flight(&mut next, flight)?;
            if !matches!(
                current.phase,
                FlightPhase::Requesting {
                    request: RequestKind::Agent
                }
            ) {
                return Err(TransitionError::Stale(flight));
            }

            match next.catalog.clone() {
                Some(catalog) => {
                    let dropped = next.selection.recommend(selection.items, &catalog)?;
                    if dropped > 0 {
                        effects.push(Effect::RecommendationTrimmed { dropped });
                    }
                    next.stage = Stage::Presenting;
                    resume(
                        &mut next,
                        context,
                        flight,
                        presentation_sequence().into(),
                        &mut effects,
                    )?;
                }
                // Recommendations cannot be validated without the catalog
                None => {
                    park_reveal(
                        &mut next,
                        context,
                        flight,
                        APOLOGY.to_string(),
                        VecDeque::new(),
                        &mut effects,
                    );
                    effects.push(Effect::FetchCatalog);
                }
            }
            effects.push(Effect::PublishState);
        }

        Event::RemoteFailed { flight, .. } => {
            let current = take_flight(&mut next, flight)?;
            if !matches!(current.phase, FlightPhase::Requesting { .. }) {
                return Err(TransitionError::Stale(flight));
            }
            // Remaining steps are dropped; stage and answers stay put
            park_reveal(
                &mut next,
                context,
                flight,
                APOLOGY.to_string(),
                VecDeque::new(),
                &mut effects,
            );
            effects.push(Effect::PublishState);
        }

        Event::TimerFired { flight, pause } => {
            let current = take_flight(&mut next, flight)?;
            if current.phase != (FlightPhase::Waiting { pause }) {
                return Err(TransitionError::Stale(flight));
            }
            resume(&mut next, context, flight, current.pending, &mut effects)?;
            effects.push(Effect::PublishState);
        }

        Event::RevealTick { flight, at } => {
            let mut current = take_flight(&mut next, flight)?;
            let FlightPhase::Revealing { reveal } = &mut current.phase else {
                return Err(TransitionError::Stale(flight));
            };

            let progress = match reveal.tick() {
                RevealStep::Partial(shown) => Some(shown.to_string()),
                RevealStep::Complete => None,
            };

            match progress {
                Some(text) => {
                    effects.push(Effect::RevealProgress { flight, text });
                    next.flight = Some(current);
                }
                None => {
                    let text = reveal.full_text().to_string();
                    let message = next.commit(Origin::Agent, text, at);
                    effects.push(Effect::MessageCommitted { message });
                    resume(&mut next, context, flight, current.pending, &mut effects)?;
                    effects.push(Effect::PublishState);
                }
            }
        }
    }

    Ok(TransitionResult::new(next).with_effects(effects))
}

/// Remove the current flight if it is the one an outcome belongs to.
/// The guard stays held until the flight is resumed or closed.
fn take_flight(session: &mut Session, id: FlightId) -> Result<Flight, TransitionError> {
    session
        .flight
        .take()
        .filter(|f| f.id == id)
        .ok_or(TransitionError::Stale(id))
}

fn close_flight(session: &mut Session) {
    session.flight = None;
    session.guard.release();
}

fn open_request(
    session: &mut Session,
    kind: RequestKind,
    request: ConversationRequest,
    effects: &mut Vec<Effect>,
) -> Result<FlightId, TransitionError> {
    if !session.guard.acquire() {
        return Err(TransitionError::Busy);
    }
    let id = session.allocate_flight_id();
    session.flight = Some(Flight {
        id,
        phase: FlightPhase::Requesting { request: kind },
        pending: VecDeque::new(),
    });
    effects.push(Effect::RequestConversation {
        flight: id,
        request,
    });
    Ok(id)
}

fn open_sequence(
    session: &mut Session,
    context: &SessionContext,
    steps: impl IntoIterator<Item = SequenceStep>,
    effects: &mut Vec<Effect>,
) -> Result<FlightId, TransitionError> {
    if !session.guard.acquire() {
        return Err(TransitionError::Busy);
    }
    let id = session.allocate_flight_id();
    resume(session, context, id, steps.into_iter().collect(), effects)?;
    Ok(id)
}

fn park_reveal(
    session: &mut Session,
    context: &SessionContext,
    id: FlightId,
    text: String,
    pending: VecDeque<SequenceStep>,
    effects: &mut Vec<Effect>,
) {
    let reveal = Reveal::new(text);
    effects.push(Effect::StartReveal {
        flight: id,
        ticks: reveal.ticks_required(),
        interval: context.timing.reveal_tick,
    });
    session.flight = Some(Flight {
        id,
        phase: FlightPhase::Revealing { reveal },
        pending,
    });
}

/// Run steps until one has to wait, then park the flight in that phase.
/// Closes the flight once no steps remain.
fn resume(
    session: &mut Session,
    context: &SessionContext,
    id: FlightId,
    mut pending: VecDeque<SequenceStep>,
    effects: &mut Vec<Effect>,
) -> Result<(), TransitionError> {
    while let Some(step) = pending.pop_front() {
        match step {
            SequenceStep::Pause(pause) => {
                effects.push(Effect::ScheduleTimer {
                    flight: id,
                    pause,
                    delay: context.timing.delay(pause),
                });
                session.flight = Some(Flight {
                    id,
                    phase: FlightPhase::Waiting { pause },
                    pending,
                });
                return Ok(());
            }
            SequenceStep::Cue(cue) => {
                park_reveal(session, context, id, cue.text().to_string(), pending, effects);
                return Ok(());
            }
            SequenceStep::DispatchAgent => {
                effects.push(Effect::RunAgent {
                    flight: id,
                    request: AgentRequest {
                        house_prompt: session.answers.house_prompt(),
                    },
                });
                session.flight = Some(Flight {
                    id,
                    phase: FlightPhase::Requesting {
                        request: RequestKind::Agent,
                    },
                    pending,
                });
                return Ok(());
            }
            SequenceStep::Enter(stage) => {
                session.stage = stage;
            }
            SequenceStep::Advance => {
                close_flight(session);
                return advance_gathering(session, context, effects);
            }
        }
    }

    close_flight(session);
    Ok(())
}

/// Leave the current gathering stage, recording the latest input as its
/// answer. Leaving the budget stage starts the analysis sequence.
fn advance_gathering(
    session: &mut Session,
    context: &SessionContext,
    effects: &mut Vec<Effect>,
) -> Result<(), TransitionError> {
    let leaving = session.stage;
    let (Some(slot), Some(entering)) = (leaving.answer_slot(), leaving.next()) else {
        return Err(TransitionError::NothingToAdvance(leaving));
    };

    let answer = session.latest_input.take().unwrap_or_default();
    session.answers.record(slot, answer);
    session.stage = entering;

    if entering == Stage::Analyzing {
        open_sequence(session, context, analysis_sequence(), effects)?;
    }
    Ok(())
}

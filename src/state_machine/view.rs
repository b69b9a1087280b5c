//! Read-only snapshot of a session for clients

use super::state::{Answers, Message, Session, Stage};
use crate::catalog::{asset_path, CatalogItem};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Done,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub index: u8,
    pub label: &'static str,
    pub status: StepStatus,
}

/// Catalog item as shown on the selection grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogCard {
    #[serde(flatten)]
    pub item: CatalogItem,
    pub image: String,
    pub selected: bool,
    /// Shown as "AI Pick"
    pub recommended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub stage: Stage,
    pub step_index: u8,
    pub steps: Vec<StepView>,
    pub busy: bool,
    pub input_open: bool,
    pub placeholder: &'static str,
    pub can_advance: bool,
    pub advance_label: Option<&'static str>,
    pub history: Vec<Message>,
    pub pending_reveal: Option<String>,
    pub answers: Answers,
    pub catalog_loaded: bool,
    pub items: Vec<CatalogCard>,
    pub selected_count: usize,
    /// Sum of the selected items' prices
    pub selection_total: f64,
    pub can_confirm: bool,
    pub confirm_label: Option<String>,
}

impl SessionView {
    pub fn new(session_id: &str, session: &Session, asset_base: &str) -> Self {
        let stage = session.stage();
        let busy = session.is_busy();
        let selection = session.selection();

        let steps = Stage::ALL
            .iter()
            .map(|s| StepView {
                index: s.step_index(),
                label: s.label(),
                status: match s.cmp(&stage) {
                    std::cmp::Ordering::Less => StepStatus::Done,
                    std::cmp::Ordering::Equal => StepStatus::Current,
                    std::cmp::Ordering::Greater => StepStatus::Upcoming,
                },
            })
            .collect();

        let items = session
            .catalog()
            .map(|catalog| {
                catalog
                    .iter()
                    .map(|item| CatalogCard {
                        item: item.clone(),
                        image: asset_path(asset_base, item.id),
                        selected: selection.is_selected(item.id),
                        recommended: selection.was_recommended(item.id),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let selection_total = session
            .catalog()
            .map_or(0.0, |catalog| {
                catalog.pick(selection.chosen()).iter().map(|i| i.price).sum()
            });

        let presenting = stage == Stage::Presenting;

        Self {
            session_id: session_id.to_string(),
            stage,
            step_index: stage.step_index(),
            steps,
            busy,
            input_open: stage.accepts_input() && !busy,
            placeholder: stage.placeholder(),
            can_advance: !busy && (stage.accepts_input() || stage == Stage::Analyzing),
            advance_label: stage.advance_label(),
            history: session.history().to_vec(),
            pending_reveal: session.pending_reveal().map(str::to_string),
            answers: session.answers().clone(),
            catalog_loaded: session.catalog().is_some(),
            items,
            selected_count: selection.len(),
            selection_total,
            can_confirm: presenting && !busy && !selection.is_empty(),
            confirm_label: presenting
                .then(|| format!("Confirm Selection ({} items)", selection.len())),
        }
    }
}

//! Fixed texts the wizard produces on its own

use serde::Serialize;

/// User message that asks the remote service for its opening message
pub const WELCOME_TRIGGER: &str = "SYSTEM_START:";

/// Shown for every transport or business failure
pub const APOLOGY: &str = "Sorry, I'm having technical difficulties. Please try again!";

/// System transition messages revealed during staged sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    AnalysisStart,
    FurniturePresentation,
    VideoGeneration,
    VideoComplete,
}

impl Cue {
    pub fn text(self) -> &'static str {
        match self {
            Cue::AnalysisStart => "Analyzing your requirements and curating furniture options...",
            Cue::FurniturePresentation => {
                "Here are my curated recommendations! You can adjust your selection."
            }
            Cue::VideoGeneration => "Creating your personalized furniture visualization...",
            Cue::VideoComplete => "Your custom furniture arrangement video is ready!",
        }
    }
}

/// User message logged when the selection is confirmed
pub fn confirmation_text(count: usize) -> String {
    format!("I've finalized my furniture selection ({count} items chosen)")
}

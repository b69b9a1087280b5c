//! Wire types for the remote conversation and agent endpoints

use super::RemoteError;
use crate::catalog::ItemId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answers collected so far, in the shape the conversation endpoint expects
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationData {
    pub space_type: String,
    pub style_preferences: String,
    pub budget_range: String,
    pub additional_requirements: String,
}

/// A committed history message as sent to the conversation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,
    /// `"ai"` or `"user"`
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Body of `POST /api/conversation`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationRequest {
    pub user_message: String,
    pub conversation_history: Vec<WireMessage>,
    pub current_step: u8,
    pub conversation_data: ConversationData,
}

/// Raw response of `POST /api/conversation`
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationResponse {
    pub status: String,
    #[serde(default)]
    pub ai_response: Option<String>,
    #[serde(default)]
    pub advance_step: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Normalized successful conversation turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationReply {
    pub text: String,
    pub advance: bool,
}

impl ConversationResponse {
    pub fn into_reply(self) -> Result<ConversationReply, RemoteError> {
        if self.status != "success" {
            return Err(RemoteError::business(format!(
                "conversation status {}: {}",
                self.status,
                self.message.unwrap_or_default()
            )));
        }
        Ok(ConversationReply {
            text: self.ai_response.unwrap_or_default(),
            advance: self.advance_step.unwrap_or(false),
        })
    }
}

/// Body of `POST /api/run-agent`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRequest {
    pub house_prompt: String,
}

/// Raw response of `POST /api/run-agent`
#[derive(Debug, Clone, Deserialize)]
pub struct AgentResponse {
    pub status: String,
    #[serde(default)]
    pub selected_indices: Vec<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Normalized agent recommendation as returned on the wire. The session
/// keeps it as a set in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSelection {
    pub items: Vec<ItemId>,
}

impl AgentResponse {
    pub fn into_selection(self) -> Result<AgentSelection, RemoteError> {
        if self.status != "complete" {
            return Err(RemoteError::business(format!(
                "agent status {}: {}",
                self.status,
                self.message.unwrap_or_default()
            )));
        }
        let items = self
            .selected_indices
            .into_iter()
            .filter_map(|index| usize::try_from(index).ok().map(ItemId))
            .collect();
        Ok(AgentSelection { items })
    }
}

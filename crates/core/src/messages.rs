//! Inter-surface message protocol
//!
//! Two message kinds travel as JSON tagged by `type`:
//! - `INSERT_PROMPT` - background/popup to the page context
//! - `PROMPTS_UPDATED` - store to every extension surface

use serde::{Deserialize, Serialize};

use crate::{
    broadcast::UpdateEvent,
    errors::Result,
    storage::{InsertMode, Prompt},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeMessage {
    /// Insert `prompt.content` into the page's target field
    InsertPrompt {
        prompt: Prompt,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode:   Option<InsertMode>,
    },
    /// Persisted state changed
    PromptsUpdated(UpdateEvent),
}

impl RuntimeMessage {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Reply from the page context to an `INSERT_PROMPT` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertResponse {
    pub ok:     bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl InsertResponse {
    pub fn inserted() -> Self {
        Self { ok: true, reason: None }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            ok:     false,
            reason: Some(reason.into()),
        }
    }
}

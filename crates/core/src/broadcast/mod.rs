//! Update broadcast protocol
//!
//! After every mutation the store emits an [`UpdateEvent`] to every live
//! surface through the [`Hub`]. Delivery is best-effort and never retried;
//! receivers that cannot interpret an event re-read the full state.

mod hub;
mod mirror;

use std::{fmt, str::FromStr};

pub use hub::{Hub, Subscription, SurfaceId};
pub use mirror::{MirrorAction, SurfaceMirror};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateAction {
    Added,
    Updated,
    Deleted,
    Imported,
    Initialized,
}

impl UpdateAction {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateAction::Added => "added",
            UpdateAction::Updated => "updated",
            UpdateAction::Deleted => "deleted",
            UpdateAction::Imported => "imported",
            UpdateAction::Initialized => "initialized",
        }
    }
}

impl fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(UpdateAction::Added),
            "updated" => Ok(UpdateAction::Updated),
            "deleted" => Ok(UpdateAction::Deleted),
            "imported" => Ok(UpdateAction::Imported),
            "initialized" => Ok(UpdateAction::Initialized),
            other => Err(format!("unknown update action '{}'", other)),
        }
    }
}

/// Payload of a `PROMPTS_UPDATED` message
///
/// The action travels as a raw string so events from newer senders still
/// parse; [`UpdateEvent::kind`] returns `None` for anything unrecognized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id:     Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count:  Option<usize>,
}

impl UpdateEvent {
    pub fn new(action: UpdateAction) -> Self {
        Self {
            action: Some(action.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn kind(&self) -> Option<UpdateAction> {
        self.action.as_deref().and_then(|a| a.parse().ok())
    }
}

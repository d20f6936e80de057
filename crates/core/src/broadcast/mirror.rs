//! Receiver-side cache of the application state
//!
//! A surface keeps its own copy of [`AppState`] and folds broadcasts into it.
//! `deleted` events with an id are patched in place; everything else,
//! including unrecognized or unparseable messages, triggers a full re-read.

use super::{Subscription, UpdateAction, UpdateEvent};
use crate::{
    errors::Result,
    messages::RuntimeMessage,
    storage::{AppState, Store},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorAction {
    Patched,
    Refreshed,
    Ignored,
}

#[derive(Debug, Default)]
pub struct SurfaceMirror {
    state: Option<AppState>,
}

impl SurfaceMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<&AppState> {
        self.state.as_ref()
    }

    pub async fn refresh(&mut self, store: &Store) -> Result<&AppState> {
        Ok(self.state.insert(store.read().await?))
    }

    /// Fold one update event into the mirror
    pub async fn apply(&mut self, store: &Store, event: &UpdateEvent) -> Result<MirrorAction> {
        if let (Some(UpdateAction::Deleted), Some(id), Some(state)) =
            (event.kind(), event.id.as_deref(), self.state.as_mut())
        {
            state.prompts.retain(|p| p.id != id);
            if state.last_used_prompt_id.as_deref() == Some(id) {
                state.last_used_prompt_id = state.prompts.first().map(|p| p.id.clone());
            }
            return Ok(MirrorAction::Patched);
        }

        self.refresh(store).await?;
        Ok(MirrorAction::Refreshed)
    }

    /// Handle a raw runtime message
    ///
    /// Insertion requests are not for surfaces and are ignored.
    pub async fn handle_message(&mut self, store: &Store, raw: &str) -> Result<MirrorAction> {
        match RuntimeMessage::from_json(raw) {
            Ok(RuntimeMessage::PromptsUpdated(event)) => self.apply(store, &event).await,
            Ok(RuntimeMessage::InsertPrompt { .. }) => Ok(MirrorAction::Ignored),
            Err(err) => {
                tracing::debug!("unreadable broadcast, refreshing: {}", err);
                self.refresh(store).await?;
                Ok(MirrorAction::Refreshed)
            },
        }
    }

    /// Process everything queued on a subscription
    pub async fn sync(&mut self, store: &Store, subscription: &Subscription) -> Result<usize> {
        let pending = subscription.drain();
        for raw in &pending {
            self.handle_message(store, raw).await?;
        }
        Ok(pending.len())
    }
}

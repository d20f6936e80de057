//! Page-context message handler
//!
//! Receives `INSERT_PROMPT` requests, resolves the target field and runs the
//! insertion. Every request gets a reply; failures to find a field become a
//! notice on the page and an `ok: false` reply.

use std::{sync::Arc, time::Duration};

use super::{
    insert::{insert, InsertOutcome},
    Locator, LocatorProfile, OverwriteConfirm, Page,
};
use crate::{
    config::Config,
    errors::{PromptError, Result},
    messages::{InsertResponse, RuntimeMessage},
    storage::{InsertMode, Prompt, Store},
};

pub struct PageHandler {
    page:            Arc<dyn Page>,
    store:           Store,
    confirm:         Arc<dyn OverwriteConfirm>,
    profile:         LocatorProfile,
    observe_timeout: Duration,
    notice_duration: Duration,
}

impl PageHandler {
    pub fn new(page: Arc<dyn Page>, store: Store, confirm: Arc<dyn OverwriteConfirm>, config: &Config) -> Self {
        Self {
            page,
            store,
            confirm,
            profile: LocatorProfile::default(),
            observe_timeout: config.observe_timeout,
            notice_duration: config.notice_duration,
        }
    }

    pub fn with_profile(mut self, profile: LocatorProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Returns `None` for messages that are not addressed to the page
    pub async fn handle(&self, msg: RuntimeMessage) -> Result<Option<InsertResponse>> {
        match msg {
            RuntimeMessage::InsertPrompt { prompt, mode } => self.insert_prompt(&prompt, mode).await.map(Some),
            RuntimeMessage::PromptsUpdated(_) => Ok(None),
        }
    }

    pub async fn handle_json(&self, raw: &str) -> Result<Option<InsertResponse>> {
        self.handle(RuntimeMessage::from_json(raw)?).await
    }

    async fn insert_prompt(&self, prompt: &Prompt, mode: Option<InsertMode>) -> Result<InsertResponse> {
        let settings = self.store.settings().await?;
        let mode = mode.unwrap_or(settings.insert_mode);

        let locator = Locator::new(self.page.as_ref(), &self.profile, settings.custom_selector());
        let Some(target) = locator.resolve(self.observe_timeout).await else {
            let err = PromptError::TargetNotFound(format!("no field for prompt {}", prompt.id));
            tracing::warn!("{}", err);
            self.page.show_notice(&err.user_message(), self.notice_duration);
            return Ok(InsertResponse::skipped(err.category()));
        };

        let outcome = insert(
            self.page.as_ref(),
            &self.store,
            self.confirm.as_ref(),
            target.node,
            &prompt.content,
            mode,
        )
        .await?;

        Ok(match outcome {
            InsertOutcome::Inserted => {
                tracing::info!(prompt = %prompt.id, strategy = ?target.strategy, ?mode, "prompt inserted");
                InsertResponse::inserted()
            },
            InsertOutcome::Cancelled => InsertResponse::skipped("cancelled"),
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{
        broadcast::Hub,
        page::{ConfirmOutcome, ElementSpec, MemoryPage},
        storage::{PromptDraft, SettingsPatch},
    };

    struct AlwaysConfirm;

    #[async_trait]
    impl OverwriteConfirm for AlwaysConfirm {
        async fn confirm_overwrite(&self, _prefer_dark: bool) -> ConfirmOutcome {
            ConfirmOutcome::confirmed()
        }
    }

    async fn setup() -> (MemoryPage, Store, PageHandler, Prompt) {
        let page = MemoryPage::new();
        let store = Store::in_memory(Hub::new());
        let (prompt, _) = store.upsert(PromptDraft::new("Tone", "Be brief.")).await.unwrap();
        let config = Config::with_data_dir("unused").with_observe_timeout(Duration::from_millis(200));
        let handler = PageHandler::new(
            Arc::new(page.clone()),
            store.clone(),
            Arc::new(AlwaysConfirm),
            &config,
        );
        (page, store, handler, prompt)
    }

    #[tokio::test]
    async fn test_inserts_with_settings_mode() {
        let (page, store, handler, prompt) = setup().await;
        let field = page.append(
            page.body(),
            ElementSpec::new("textarea")
                .attr("aria-label", "System instructions")
                .text("Hello"),
        );
        store
            .set_settings(SettingsPatch {
                insert_mode: Some(InsertMode::Append),
                ..Default::default()
            })
            .await
            .unwrap();

        let reply = handler
            .handle(RuntimeMessage::InsertPrompt { prompt, mode: None })
            .await
            .unwrap();
        assert_eq!(reply, Some(InsertResponse::inserted()));
        assert_eq!(page.text(field), "Hello\nBe brief.");
    }

    #[tokio::test]
    async fn test_message_mode_overrides_settings() {
        let (page, _store, handler, prompt) = setup().await;
        let field = page.append(page.body(), ElementSpec::new("textarea").text("Hello"));

        let raw = RuntimeMessage::InsertPrompt {
            prompt,
            mode: Some(InsertMode::Prepend),
        }
        .to_json()
        .unwrap();
        let reply = handler.handle_json(&raw).await.unwrap();
        assert_eq!(reply, Some(InsertResponse::inserted()));
        assert_eq!(page.text(field), "Be brief.\nHello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_target_shows_notice() {
        let (page, _store, handler, prompt) = setup().await;

        let reply = handler
            .handle(RuntimeMessage::InsertPrompt { prompt, mode: None })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply, InsertResponse::skipped("target"));
        assert_eq!(
            page.notices(),
            vec!["No suitable text field found on this page.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_messages_are_not_answered() {
        let (_page, _store, handler, _prompt) = setup().await;
        let reply = handler
            .handle_json(r#"{"type":"PROMPTS_UPDATED","action":"added"}"#)
            .await
            .unwrap();
        assert_eq!(reply, None);
    }
}

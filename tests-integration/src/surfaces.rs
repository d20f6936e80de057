//! Surfaces sharing one SQLite file and one broadcast hub

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use promptdock_core::{
    background::{MenuItem, MenuRegistry, PageChannel, SurfaceLauncher, TabId},
    broadcast::{MirrorAction, SurfaceMirror},
    page::{ConfirmOutcome, ElementSpec, MemoryPage, OverwriteConfirm, Page},
    storage::{InsertMode, PromptDraft, SettingsPatch},
    Background, Config, Hub, InsertResponse, PageHandler, PromptError, Result, RuntimeMessage,
    Store,
};

struct NoMenus;

#[async_trait]
impl MenuRegistry for NoMenus {
    async fn remove_all(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, _item: MenuItem) -> Result<()> {
        Ok(())
    }
}

struct NoLauncher;

#[async_trait]
impl SurfaceLauncher for NoLauncher {
    async fn open_palette(&self) -> Result<()> {
        Ok(())
    }

    async fn open_options(&self) -> Result<()> {
        Ok(())
    }
}

struct Decline;

#[async_trait]
impl OverwriteConfirm for Decline {
    async fn confirm_overwrite(&self, _prefer_dark: bool) -> ConfirmOutcome {
        ConfirmOutcome::cancelled()
    }
}

/// Routes insert requests straight into page handlers keyed by tab
#[derive(Default)]
struct Tabs {
    pages: Mutex<Vec<(TabId, Arc<PageHandler>)>>,
}

#[async_trait]
impl PageChannel for Tabs {
    async fn send(&self, tab: TabId, message: RuntimeMessage) -> Result<InsertResponse> {
        let handler = self
            .pages
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == tab)
            .map(|(_, handler)| handler.clone())
            .ok_or_else(|| PromptError::MessagingError(format!("no page in tab {}", tab)))?;
        handler
            .handle(message)
            .await?
            .ok_or_else(|| PromptError::MessagingError("no reply".into()))
    }
}

fn config(dir: &tempfile::TempDir) -> Config {
    Config::with_data_dir(dir.path()).with_observe_timeout(Duration::from_millis(500))
}

#[tokio::test]
async fn test_popup_mirror_follows_options_edits() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Hub::new();
    let options = Store::open(&config(&dir), hub.clone()).unwrap();
    let popup = Store::open(&config(&dir), hub.clone()).unwrap();
    options.initialize().await.unwrap();

    let subscription = hub.connect();
    let mut mirror = SurfaceMirror::new();
    mirror.refresh(&popup).await.unwrap();
    assert_eq!(mirror.state().unwrap().prompts.len(), 1);

    let (added, _) = options.upsert(PromptDraft::new("Reviewer", "diff")).await.unwrap();
    assert_eq!(mirror.sync(&popup, &subscription).await.unwrap(), 1);
    assert_eq!(mirror.state().unwrap().prompts.len(), 2);

    options.delete(&added.id).await.unwrap();
    let raw = subscription.drain();
    assert_eq!(raw.len(), 1);
    let action = mirror.handle_message(&popup, &raw[0]).await.unwrap();
    assert_eq!(action, MirrorAction::Patched);
    assert_eq!(mirror.state().unwrap().prompts.len(), 1);
    assert_eq!(mirror.state().unwrap(), &popup.read().await.unwrap());
}

#[tokio::test]
async fn test_keyboard_insert_reaches_page() {
    let dir = tempfile::tempdir().unwrap();
    let hub = Hub::new();
    let store = Store::open(&config(&dir), hub.clone()).unwrap();
    let (prompt, _) = store.upsert(PromptDraft::new("Tone", "Be brief.")).await.unwrap();

    let page = MemoryPage::new();
    let toggle = page.append(page.body(), ElementSpec::new("button").attr("data-test-si", ""));
    page.on_click(toggle, |page, _| {
        page.append(
            page.body(),
            ElementSpec::new("textarea").attr("aria-label", "System instructions"),
        );
    });

    let tabs = Arc::new(Tabs::default());
    let handler = PageHandler::new(Arc::new(page.clone()), store.clone(), Arc::new(Decline), &config(&dir));
    tabs.pages.lock().unwrap().push((3, Arc::new(handler)));

    let background = Background::new(store.clone(), Arc::new(NoMenus), tabs, Arc::new(NoLauncher));
    background
        .handle_command("insert_last_prompt", Some(3))
        .await
        .unwrap();

    let field = page.query_all("textarea").unwrap()[0];
    assert_eq!(page.text(field), "Be brief.");
    let state = store.read().await.unwrap();
    assert_eq!(state.last_used_prompt_id.as_deref(), Some(prompt.id.as_str()));
}

#[tokio::test]
async fn test_closed_tab_keeps_last_used() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&config(&dir), Hub::new()).unwrap();
    let (a, _) = store.upsert(PromptDraft::new("A", "a")).await.unwrap();
    store.upsert(PromptDraft::new("B", "b")).await.unwrap();
    store.set_last_used(&a.id).await.unwrap();

    let background = Background::new(
        store.clone(),
        Arc::new(NoMenus),
        Arc::new(Tabs::default()),
        Arc::new(NoLauncher),
    );
    assert_eq!(background.insert_last_used(9).await.unwrap(), None);

    let state = store.read().await.unwrap();
    assert_eq!(state.last_used_prompt_id.as_deref(), Some(a.id.as_str()));
}

#[tokio::test]
async fn test_custom_selector_and_declined_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(&config(&dir), Hub::new()).unwrap();
    let (prompt, _) = store.upsert(PromptDraft::new("Tone", "Be brief.")).await.unwrap();
    store
        .set_settings(SettingsPatch {
            custom_selector: Some("textarea#mine".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let page = MemoryPage::new();
    let labelled = page.append(
        page.body(),
        ElementSpec::new("textarea").attr("aria-label", "System instructions"),
    );
    let mine = page.append(
        page.body(),
        ElementSpec::new("textarea").attr("id", "mine").text("existing"),
    );
    let handler = PageHandler::new(Arc::new(page.clone()), store.clone(), Arc::new(Decline), &config(&dir));

    // Custom selector wins, and the user declines to overwrite
    let reply = handler
        .handle(RuntimeMessage::InsertPrompt { prompt: prompt.clone(), mode: None })
        .await
        .unwrap();
    assert_eq!(reply, Some(InsertResponse::skipped("cancelled")));
    assert_eq!(page.text(mine), "existing");
    assert_eq!(page.text(labelled), "");

    // Append needs no confirmation
    let reply = handler
        .handle(RuntimeMessage::InsertPrompt {
            prompt,
            mode: Some(InsertMode::Append),
        })
        .await
        .unwrap();
    assert_eq!(reply, Some(InsertResponse::inserted()));
    assert_eq!(page.text(mine), "existing\nBe brief.");
}

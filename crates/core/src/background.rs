//! Background service
//!
//! Owns the context-menu entries, routes keyboard commands and menu clicks,
//! and delivers insertion requests to page contexts. Platform APIs sit behind
//! the [`MenuRegistry`], [`PageChannel`] and [`SurfaceLauncher`] traits.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::{
    future::{BoxFuture, Shared},
    FutureExt,
};

use crate::{
    errors::Result,
    messages::{InsertResponse, RuntimeMessage},
    storage::{InsertMode, Prompt, Store},
};

pub type TabId = u32;

/// Pages the menu entries are shown on
pub const HOST_URL_PATTERN: &str = "https://aistudio.google.com/*";

pub const MENU_OPEN_PROMPTS: &str = "open_prompts";
pub const MENU_INSERT_LAST: &str = "insert_last_prompt";

pub const COMMAND_OPEN_PALETTE: &str = "open_palette";
pub const COMMAND_INSERT_LAST: &str = "insert_last_prompt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub id:           String,
    pub title:        String,
    pub url_patterns: Vec<String>,
}

impl MenuItem {
    fn on_host(id: &str, title: &str) -> Self {
        Self {
            id:           id.to_string(),
            title:        title.to_string(),
            url_patterns: vec![HOST_URL_PATTERN.to_string()],
        }
    }
}

#[async_trait]
pub trait MenuRegistry: Send + Sync {
    async fn remove_all(&self) -> Result<()>;
    async fn create(&self, item: MenuItem) -> Result<()>;
}

/// Message delivery into a tab's page context
#[async_trait]
pub trait PageChannel: Send + Sync {
    /// Fails when no page context is listening in `tab`
    async fn send(&self, tab: TabId, message: RuntimeMessage) -> Result<InsertResponse>;
}

#[async_trait]
pub trait SurfaceLauncher: Send + Sync {
    async fn open_palette(&self) -> Result<()>;
    async fn open_options(&self) -> Result<()>;
}

type RebuildFuture = Shared<BoxFuture<'static, usize>>;

/// Serializes context-menu rebuilds
///
/// Requests arriving while a rebuild is running join it instead of starting a
/// second one, so entries are never registered twice.
#[derive(Clone)]
pub struct MenuCoordinator {
    store:     Store,
    registry:  Arc<dyn MenuRegistry>,
    in_flight: Arc<Mutex<Option<RebuildFuture>>>,
    shown:     Arc<Mutex<Option<bool>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MenuCoordinator {
    pub fn new(store: Store, registry: Arc<dyn MenuRegistry>) -> Self {
        Self {
            store,
            registry,
            in_flight: Arc::new(Mutex::new(None)),
            shown: Arc::new(Mutex::new(None)),
        }
    }

    /// Rebuild the menu, returning how many entries were created
    ///
    /// Failures are logged, never propagated.
    pub async fn rebuild(&self) -> usize {
        let rebuild = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(running) => running.clone(),
                None => {
                    let this = self.clone();
                    let fut = async move {
                        let created = match this.register().await {
                            Ok(created) => created,
                            Err(err) => {
                                tracing::warn!("context menu setup failed: {}", err);
                                0
                            },
                        };
                        *lock(&this.in_flight) = None;
                        created
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                },
            }
        };
        rebuild.await
    }

    async fn register(&self) -> Result<usize> {
        let settings = self.store.settings().await?;
        self.registry.remove_all().await?;
        *lock(&self.shown) = Some(settings.show_context_menu);
        if !settings.show_context_menu {
            return Ok(0);
        }

        let items = [
            MenuItem::on_host(MENU_OPEN_PROMPTS, "Open Prompts…"),
            MenuItem::on_host(MENU_INSERT_LAST, "Insert last prompt"),
        ];
        let mut created = 0;
        for item in items {
            // Creation errors are per-item and do not stop the others
            match self.registry.create(item).await {
                Ok(()) => created += 1,
                Err(err) => tracing::debug!("menu item not created: {}", err),
            }
        }
        tracing::debug!(created, "rebuilt context menu");
        Ok(created)
    }

    /// Visibility setting the current entries were built from
    pub fn shown(&self) -> Option<bool> {
        *lock(&self.shown)
    }
}

pub struct Background {
    store:    Store,
    menus:    MenuCoordinator,
    channel:  Arc<dyn PageChannel>,
    launcher: Arc<dyn SurfaceLauncher>,
}

impl Background {
    pub fn new(
        store: Store,
        registry: Arc<dyn MenuRegistry>,
        channel: Arc<dyn PageChannel>,
        launcher: Arc<dyn SurfaceLauncher>,
    ) -> Self {
        Self {
            menus: MenuCoordinator::new(store.clone(), registry),
            store,
            channel,
            launcher,
        }
    }

    pub fn menus(&self) -> &MenuCoordinator {
        &self.menus
    }

    /// Install or startup
    pub async fn on_startup(&self) -> usize {
        self.menus.rebuild().await
    }

    /// React to a broadcast; rebuilds the menu when its visibility setting changed
    pub async fn on_broadcast(&self, raw: &str) -> Result<bool> {
        if let Ok(RuntimeMessage::InsertPrompt { .. }) = RuntimeMessage::from_json(raw) {
            return Ok(false);
        }

        let settings = self.store.settings().await?;
        if self.menus.shown() == Some(settings.show_context_menu) {
            return Ok(false);
        }
        self.menus.rebuild().await;
        Ok(true)
    }

    /// Keyboard command for the active tab
    pub async fn handle_command(&self, command: &str, tab: Option<TabId>) -> Result<()> {
        let Some(tab) = tab else {
            return Ok(());
        };
        match command {
            COMMAND_INSERT_LAST => {
                self.insert_last_used(tab).await?;
            },
            COMMAND_OPEN_PALETTE => {
                if let Err(err) = self.launcher.open_palette().await {
                    tracing::warn!("palette failed to open: {}", err);
                    self.launcher.open_options().await?;
                }
            },
            other => tracing::debug!(command = other, "ignoring unknown command"),
        }
        Ok(())
    }

    pub async fn handle_menu_click(&self, item: &str, tab: Option<TabId>) -> Result<()> {
        let Some(tab) = tab else {
            return Ok(());
        };
        match item {
            MENU_INSERT_LAST => {
                self.insert_last_used(tab).await?;
            },
            MENU_OPEN_PROMPTS => {
                if self.launcher.open_palette().await.is_err() {
                    self.launcher.open_options().await?;
                }
            },
            other => tracing::debug!(item = other, "ignoring unknown menu item"),
        }
        Ok(())
    }

    /// Insert the last-used prompt, or the first in display order
    ///
    /// Returns the delivered prompt, or `None` when there was nothing to send
    /// or the tab had no page context.
    pub async fn insert_last_used(&self, tab: TabId) -> Result<Option<InsertResponse>> {
        let state = self.store.read().await?;
        let Some(prompt) = state.last_used().or_else(|| state.prompts.first()).cloned() else {
            tracing::debug!("no prompts to insert");
            return Ok(None);
        };
        self.send_insert(tab, prompt, Some(state.settings.insert_mode)).await
    }

    /// Deliver an insertion request and record the prompt as last used
    ///
    /// The pointer only moves once the page context accepted the message.
    pub async fn send_insert(
        &self,
        tab: TabId,
        prompt: Prompt,
        mode: Option<InsertMode>,
    ) -> Result<Option<InsertResponse>> {
        let id = prompt.id.clone();
        match self.channel.send(tab, RuntimeMessage::InsertPrompt { prompt, mode }).await {
            Ok(reply) => {
                self.store.set_last_used(&id).await?;
                Ok(Some(reply))
            },
            Err(err) => {
                tracing::error!(tab, prompt = %id, "failed to deliver insert request: {}", err);
                Ok(None)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;
    use crate::{
        broadcast::Hub,
        errors::PromptError,
        storage::{PromptDraft, SettingsPatch},
    };

    #[derive(Default)]
    struct FakeMenus {
        removals: AtomicUsize,
        items:    Mutex<Vec<MenuItem>>,
    }

    #[async_trait]
    impl MenuRegistry for FakeMenus {
        async fn remove_all(&self) -> Result<()> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.items.lock().unwrap().clear();
            Ok(())
        }

        async fn create(&self, item: MenuItem) -> Result<()> {
            let mut items = self.items.lock().unwrap();
            if items.iter().any(|i| i.id == item.id) {
                return Err(PromptError::Other(format!("duplicate id {}", item.id)));
            }
            items.push(item);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeChannel {
        offline: AtomicBool,
        sent:    Mutex<Vec<(TabId, RuntimeMessage)>>,
    }

    #[async_trait]
    impl PageChannel for FakeChannel {
        async fn send(&self, tab: TabId, message: RuntimeMessage) -> Result<InsertResponse> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(PromptError::MessagingError("no receiver".into()));
            }
            self.sent.lock().unwrap().push((tab, message));
            Ok(InsertResponse::inserted())
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        palette_broken: bool,
        palettes:       AtomicUsize,
        options:        AtomicUsize,
    }

    #[async_trait]
    impl SurfaceLauncher for FakeLauncher {
        async fn open_palette(&self) -> Result<()> {
            if self.palette_broken {
                return Err(PromptError::Other("no active window".into()));
            }
            self.palettes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn open_options(&self) -> Result<()> {
            self.options.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        store:      Store,
        menus:      Arc<FakeMenus>,
        channel:    Arc<FakeChannel>,
        launcher:   Arc<FakeLauncher>,
        background: Background,
    }

    fn fixture(palette_broken: bool) -> Fixture {
        let store = Store::in_memory(Hub::new());
        let menus = Arc::new(FakeMenus::default());
        let channel = Arc::new(FakeChannel::default());
        let launcher = Arc::new(FakeLauncher {
            palette_broken,
            ..Default::default()
        });
        let background = Background::new(store.clone(), menus.clone(), channel.clone(), launcher.clone());
        Fixture {
            store,
            menus,
            channel,
            launcher,
            background,
        }
    }

    #[tokio::test]
    async fn test_concurrent_rebuilds_collapse() {
        let fx = fixture(false);
        let menus = fx.background.menus();

        let (a, b, c) = tokio::join!(menus.rebuild(), menus.rebuild(), menus.rebuild());
        assert_eq!((a, b, c), (2, 2, 2));
        assert_eq!(fx.menus.removals.load(Ordering::SeqCst), 1);
        assert_eq!(fx.menus.items.lock().unwrap().len(), 2);

        // A later request starts a fresh rebuild
        assert_eq!(menus.rebuild().await, 2);
        assert_eq!(fx.menus.removals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_menu_items_are_scoped_to_host() {
        let fx = fixture(false);
        fx.background.on_startup().await;

        let items = fx.menus.items.lock().unwrap().clone();
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec![MENU_OPEN_PROMPTS, MENU_INSERT_LAST]);
        assert!(items.iter().all(|i| i.url_patterns == vec![HOST_URL_PATTERN.to_string()]));
    }

    #[tokio::test]
    async fn test_hidden_menu_setting_rebuilds_empty() {
        let fx = fixture(false);
        fx.background.on_startup().await;

        fx.store
            .set_settings(SettingsPatch {
                show_context_menu: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();
        let raw = r#"{"type":"PROMPTS_UPDATED","action":"updated"}"#;
        assert!(fx.background.on_broadcast(raw).await.unwrap());
        assert!(fx.menus.items.lock().unwrap().is_empty());

        // Unrelated updates leave the menu alone
        assert!(!fx.background.on_broadcast(raw).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_last_used_records_after_delivery() {
        let fx = fixture(false);
        let (first, _) = fx.store.upsert(PromptDraft::new("A", "a")).await.unwrap();

        let reply = fx.background.insert_last_used(7).await.unwrap();
        assert_eq!(reply, Some(InsertResponse::inserted()));

        let sent = fx.channel.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 7);
        match &sent[0].1 {
            RuntimeMessage::InsertPrompt { prompt, mode } => {
                assert_eq!(prompt.id, first.id);
                assert_eq!(*mode, Some(InsertMode::Replace));
            },
            other => panic!("unexpected message {:?}", other),
        }

        let state = fx.store.read().await.unwrap();
        assert_eq!(state.last_used_prompt_id.as_deref(), Some(first.id.as_str()));
    }

    #[tokio::test]
    async fn test_undelivered_insert_keeps_pointer() {
        let fx = fixture(false);
        let (a, _) = fx.store.upsert(PromptDraft::new("A", "a")).await.unwrap();
        let (b, _) = fx.store.upsert(PromptDraft::new("B", "b")).await.unwrap();
        fx.store.set_last_used(&a.id).await.unwrap();

        fx.channel.offline.store(true, Ordering::SeqCst);
        let reply = fx.background.send_insert(1, b, None).await.unwrap();
        assert_eq!(reply, None);

        let state = fx.store.read().await.unwrap();
        assert_eq!(state.last_used_prompt_id.as_deref(), Some(a.id.as_str()));
    }

    #[tokio::test]
    async fn test_insert_with_no_prompts_sends_nothing() {
        let fx = fixture(false);
        assert_eq!(fx.background.insert_last_used(1).await.unwrap(), None);
        assert!(fx.channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_palette_falls_back_to_options() {
        let fx = fixture(true);
        fx.background
            .handle_command(COMMAND_OPEN_PALETTE, Some(1))
            .await
            .unwrap();
        assert_eq!(fx.launcher.options.load(Ordering::SeqCst), 1);

        let fx = fixture(false);
        fx.background
            .handle_menu_click(MENU_OPEN_PROMPTS, Some(1))
            .await
            .unwrap();
        assert_eq!(fx.launcher.palettes.load(Ordering::SeqCst), 1);
        assert_eq!(fx.launcher.options.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commands_without_tab_are_ignored() {
        let fx = fixture(false);
        fx.store.upsert(PromptDraft::new("A", "a")).await.unwrap();
        fx.background
            .handle_command(COMMAND_INSERT_LAST, None)
            .await
            .unwrap();
        assert!(fx.channel.sent.lock().unwrap().is_empty());
    }
}

use serde_json::Value;
use uuid::Uuid;

use super::{
    as_object,
    model::{mru_order, AppState, Prompt, PromptDraft, Settings, SettingsPatch},
    now_millis,
    schema::{
        is_prompt_key, prompt_key, CURRENT_VERSION, LAST_USED_KEY, SETTINGS_KEY, VERSION_KEY,
    },
    Store,
};
use crate::{
    broadcast::{UpdateAction, UpdateEvent},
    errors::{PromptError, Result},
};

const DEFAULT_PROMPT_NAME: &str = "Concise Helpful Assistant";
const DEFAULT_PROMPT_CONTENT: &str = "You are a helpful, concise assistant.
- Prefer short, clear answers with bullet points.
- Ask one clarifying question if requirements are ambiguous.
- Avoid speculation; state uncertainties explicitly.
- When code is relevant, show minimal, runnable snippets.";

/// Whether an upsert created a prompt or changed an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertKind {
    Added,
    Updated,
}

impl UpsertKind {
    pub fn action(self) -> UpdateAction {
        match self {
            UpsertKind::Added => UpdateAction::Added,
            UpsertKind::Updated => UpdateAction::Updated,
        }
    }
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_prompt(now: i64) -> Prompt {
    Prompt {
        id:           new_id(),
        name:         DEFAULT_PROMPT_NAME.to_string(),
        content:      DEFAULT_PROMPT_CONTENT.to_string(),
        tags:         Default::default(),
        favorite:     false,
        created_at:   now,
        updated_at:   now,
        last_used_at: None,
    }
}

impl Store {
    /// Assemble the application state from both partitions
    ///
    /// Never writes. Unreadable prompt entries are skipped, and a last-used
    /// pointer naming a missing prompt is reported as absent.
    pub async fn read(&self) -> Result<AppState> {
        let synced = self.synced.get_all().await?;
        let local = self.local.get_all().await?;

        let mut prompts = Vec::new();
        for (key, value) in local {
            if !is_prompt_key(&key) {
                continue;
            }
            match serde_json::from_value::<Prompt>(value) {
                Ok(prompt) => prompts.push(prompt),
                Err(err) => tracing::warn!(%key, "skipping unreadable prompt entry: {}", err),
            }
        }
        prompts.sort_by(mru_order);

        let last_used_prompt_id = synced
            .get(LAST_USED_KEY)
            .and_then(Value::as_str)
            .filter(|id| prompts.iter().any(|p| p.id == *id))
            .map(String::from);

        let version = synced
            .get(VERSION_KEY)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(CURRENT_VERSION);

        Ok(AppState {
            prompts,
            last_used_prompt_id,
            settings: Settings::resolve(synced.get(SETTINGS_KEY)),
            version,
        })
    }

    /// Current settings merged onto the defaults
    pub async fn settings(&self) -> Result<Settings> {
        let stored = self.synced.get(SETTINGS_KEY).await?;
        Ok(Settings::resolve(stored.as_ref()))
    }

    /// Seed first-run state
    ///
    /// No-op returning `false` once settings exist. The default prompt is only
    /// written when the local partition holds no prompts at all.
    pub async fn initialize(&self) -> Result<bool> {
        let _guard = self.init_lock.lock().await;

        if self.synced.get(SETTINGS_KEY).await?.is_some() {
            tracing::debug!("store already initialized");
            return Ok(false);
        }

        let has_prompts = self.local.get_all().await?.keys().any(|k| is_prompt_key(k));
        let mut synced = vec![
            (SETTINGS_KEY.to_string(), serde_json::to_value(Settings::default())?),
            (VERSION_KEY.to_string(), Value::from(CURRENT_VERSION)),
        ];

        if !has_prompts {
            let prompt = default_prompt(now_millis());
            self.local
                .set(prompt_key(&prompt.id), serde_json::to_value(&prompt)?)
                .await?;
            synced.push((LAST_USED_KEY.to_string(), Value::String(prompt.id.clone())));
            tracing::info!(id = %prompt.id, "seeded default prompt");
        }

        self.synced.set_many(synced).await?;
        self.notify(UpdateEvent::new(UpdateAction::Initialized));
        Ok(true)
    }

    /// Create or update a prompt
    ///
    /// On update `createdAt`, `lastUsedAt` and any optional field the draft
    /// leaves unset are kept, and `updatedAt` always moves forward.
    pub async fn upsert(&self, draft: PromptDraft) -> Result<(Prompt, UpsertKind)> {
        draft.validate()?;

        let id = draft
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(new_id);
        let key = prompt_key(&id);

        let existing = match self.local.get(&key).await? {
            Some(value) => Some(serde_json::from_value::<Prompt>(value)?),
            None => None,
        };

        let now = now_millis();
        let name = draft.name.trim().to_string();
        let (prompt, kind) = match existing {
            Some(prev) => (
                Prompt {
                    id,
                    name,
                    content: draft.content,
                    tags: draft.tags.unwrap_or(prev.tags),
                    favorite: draft.favorite.unwrap_or(prev.favorite),
                    created_at: prev.created_at,
                    updated_at: now.max(prev.updated_at.saturating_add(1)),
                    last_used_at: prev.last_used_at,
                },
                UpsertKind::Updated,
            ),
            None => (
                Prompt {
                    id,
                    name,
                    content: draft.content,
                    tags: draft.tags.unwrap_or_default(),
                    favorite: draft.favorite.unwrap_or(false),
                    created_at: now,
                    updated_at: now,
                    last_used_at: None,
                },
                UpsertKind::Added,
            ),
        };

        self.local.set(key, serde_json::to_value(&prompt)?).await?;
        tracing::info!(id = %prompt.id, action = %kind.action(), "saved prompt");

        self.notify(UpdateEvent::new(kind.action()).with_id(&prompt.id));
        Ok((prompt, kind))
    }

    /// Delete a prompt, repointing the last-used pointer if it named it
    ///
    /// Returns whether the prompt existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let key = prompt_key(id);
        let existed = self.local.get(&key).await?.is_some();
        self.local.remove(vec![key]).await?;

        let pointer = self.synced.get(LAST_USED_KEY).await?;
        if pointer.as_ref().and_then(Value::as_str) == Some(id) {
            let state = self.read().await?;
            let next = state.prompts.first().map(|p| p.id.clone());
            self.write_last_used_pointer(next.as_deref()).await?;
            tracing::debug!(deleted = %id, next = ?next, "repointed last used prompt");
        }

        tracing::info!(%id, existed, "deleted prompt");
        self.notify(UpdateEvent::new(UpdateAction::Deleted).with_id(id));
        Ok(existed)
    }

    /// Record that a prompt was chosen for insertion
    pub async fn set_last_used(&self, id: &str) -> Result<Prompt> {
        let key = prompt_key(id);
        let Some(value) = self.local.get(&key).await? else {
            return Err(PromptError::ValidationError(format!("Unknown prompt id: {}", id)));
        };

        let mut prompt: Prompt = serde_json::from_value(value)?;
        prompt.last_used_at = Some(now_millis());

        self.local.set(key, serde_json::to_value(&prompt)?).await?;
        self.write_last_used_pointer(Some(id)).await?;

        self.notify(UpdateEvent::new(UpdateAction::Updated).with_id(id));
        Ok(prompt)
    }

    /// Merge a partial update onto the stored settings
    pub async fn set_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        patch.validate()?;

        let mut stored = as_object(self.synced.get(SETTINGS_KEY).await?);
        patch.apply_to(&mut stored)?;

        let stored = Value::Object(stored);
        let settings = Settings::resolve(Some(&stored));
        self.synced.set(SETTINGS_KEY.to_string(), stored).await?;

        tracing::info!("updated settings");
        self.notify(UpdateEvent::new(UpdateAction::Updated));
        Ok(settings)
    }

    pub(crate) async fn write_last_used_pointer(&self, id: Option<&str>) -> Result<()> {
        match id {
            Some(id) => {
                self.synced
                    .set(LAST_USED_KEY.to_string(), Value::String(id.to_string()))
                    .await
            },
            None => self.synced.remove(vec![LAST_USED_KEY.to_string()]).await,
        }
    }
}

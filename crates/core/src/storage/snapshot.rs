//! Export and import of the whole prompt library

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    model::{alphabetical_order, Prompt, Settings},
    now_millis,
    schema::{is_prompt_key, prompt_key, CURRENT_VERSION, LAST_USED_KEY, SETTINGS_KEY, VERSION_KEY},
    Store,
};
use crate::{
    broadcast::{UpdateAction, UpdateEvent},
    errors::{PromptError, Result},
};

/// Latest timestamp an import may carry (end of year 9999, in milliseconds)
const MAX_TIMESTAMP: i64 = 253_402_300_799_999;

/// Export file shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version:  u32,
    /// Stored settings over the defaults, unknown keys included
    pub settings: Value,
    /// Alphabetical by name
    pub prompts:  Vec<Prompt>,
}

fn invalid(reason: impl Into<String>) -> PromptError {
    PromptError::ValidationError(format!("Invalid import file: {}", reason.into()))
}

/// Parse and validate import text without touching storage
fn parse_import(text: &str, force: bool) -> Result<(Vec<Prompt>, Value, u32)> {
    let parsed: Value = serde_json::from_str(text).map_err(|e| invalid(e.to_string()))?;

    let entries = parsed
        .get("prompts")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("`prompts` must be a list"))?;

    if entries.is_empty() && !force {
        return Err(PromptError::ValidationError(
            "Import contains no prompts; importing it would delete every prompt. Use force to \
             proceed."
                .into(),
        ));
    }

    let now = now_millis();
    let mut prompts = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        let id = entry
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if id.is_empty() {
            return Err(invalid(format!("prompt #{} has no id", index + 1)));
        }

        let mut prompt: Prompt = serde_json::from_value(entry.clone())
            .map_err(|e| invalid(format!("prompt '{}': {}", id, e)))?;
        prompt.id = id.to_string();
        for (field, value) in [
            ("createdAt", Some(prompt.created_at)),
            ("updatedAt", Some(prompt.updated_at)),
            ("lastUsedAt", prompt.last_used_at),
        ] {
            if value.is_some_and(|ts| ts > MAX_TIMESTAMP) {
                return Err(invalid(format!("prompt '{}': {} is out of range", id, field)));
            }
        }
        if prompt.created_at <= 0 {
            prompt.created_at = now;
        }
        if prompt.updated_at <= 0 {
            prompt.updated_at = prompt.created_at;
        }
        prompts.push(prompt);
    }
    prompts.sort_by(alphabetical_order);

    let settings = settings_over_defaults(parsed.get("settings"))?;

    let version = parsed
        .get("version")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(CURRENT_VERSION);

    Ok((prompts, settings, version))
}

/// Overlay a settings object onto the defaults, keeping keys this build does not know
fn settings_over_defaults(stored: Option<&Value>) -> Result<Value> {
    let mut settings = match serde_json::to_value(Settings::default())? {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    if let Some(Value::Object(stored)) = stored {
        for (key, value) in stored {
            settings.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(settings))
}

impl Store {
    /// Serialize settings and every prompt, alphabetically, as pretty JSON
    pub async fn export_snapshot(&self) -> Result<String> {
        let state = self.read().await?;
        let mut prompts = state.prompts;
        prompts.sort_by(alphabetical_order);

        let stored = self.synced.get(SETTINGS_KEY).await?;
        let snapshot = Snapshot {
            version: state.version,
            settings: settings_over_defaults(stored.as_ref())?,
            prompts,
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Replace every stored prompt with the contents of an export file
    ///
    /// Validation happens before any write, so a rejected file leaves storage
    /// untouched. An empty prompt list is refused unless `force` is set.
    /// The synced batch goes first and is all-or-nothing; old prompts are only
    /// removed once the new ones are written. Returns the number of prompts
    /// imported.
    pub async fn import_snapshot(&self, text: &str, force: bool) -> Result<usize> {
        let (prompts, settings, version) = parse_import(text, force)?;
        let count = prompts.len();
        let pointer = prompts.first().map(|p| p.id.clone());

        let mut synced = vec![
            (SETTINGS_KEY.to_string(), settings),
            (VERSION_KEY.to_string(), Value::from(version)),
        ];
        if let Some(id) = &pointer {
            synced.push((LAST_USED_KEY.to_string(), Value::String(id.clone())));
        }
        self.synced.set_many(synced).await?;
        if pointer.is_none() {
            self.write_last_used_pointer(None).await?;
        }

        let entries = prompts
            .iter()
            .map(|p| Ok((prompt_key(&p.id), serde_json::to_value(p)?)))
            .collect::<Result<Vec<_>>>()?;
        let fresh: HashSet<String> = entries.iter().map(|(key, _)| key.clone()).collect();
        if !entries.is_empty() {
            self.local.set_many(entries).await?;
        }

        let stale: Vec<String> = self
            .local
            .get_all()
            .await?
            .into_keys()
            .filter(|k| is_prompt_key(k) && !fresh.contains(k))
            .collect();
        if !stale.is_empty() {
            self.local.remove(stale).await?;
        }

        tracing::info!(count, force, "imported prompts");
        self.notify(UpdateEvent::new(UpdateAction::Imported).with_count(count));
        Ok(count)
    }
}

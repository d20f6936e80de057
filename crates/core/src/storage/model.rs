use std::{cmp::Ordering, collections::BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PromptError, Result};

/// A named text snippet inserted verbatim into a target field.
///
/// Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    pub id:           String,
    pub name:         String,
    pub content:      String,
    #[serde(default)]
    pub tags:         BTreeSet<String>,
    #[serde(default)]
    pub favorite:     bool,
    #[serde(default)]
    pub created_at:   i64,
    #[serde(default)]
    pub updated_at:   i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<i64>,
}

/// Input to `Store::upsert`
///
/// `None` optional fields keep their stored value on update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDraft {
    #[serde(default)]
    pub id:       Option<String>,
    pub name:     String,
    pub content:  String,
    #[serde(default)]
    pub tags:     Option<BTreeSet<String>>,
    #[serde(default)]
    pub favorite: Option<bool>,
}

impl PromptDraft {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PromptError::ValidationError("Name is required.".into()));
        }
        if self.content.trim().is_empty() {
            return Err(PromptError::ValidationError("Content is required.".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    #[default]
    Replace,
    Append,
    Prepend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    /// Whether a dark palette should be used given the host's preference
    pub fn prefers_dark(self, host_prefers_dark: bool) -> bool {
        match self {
            Theme::Dark => true,
            Theme::Light => false,
            Theme::Auto => host_prefers_dark,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub insert_mode:              InsertMode,
    pub show_context_menu:        bool,
    pub theme:                    Theme,
    pub confirm_overwrite_system: bool,
    pub confirm_delete_prompt:    bool,
    pub auto_close_panel:         bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_selector:          Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            insert_mode:              InsertMode::Replace,
            show_context_menu:        true,
            theme:                    Theme::Auto,
            confirm_overwrite_system: true,
            confirm_delete_prompt:    true,
            auto_close_panel:         false,
            custom_selector:          None,
        }
    }
}

impl Settings {
    /// Resolve a stored settings record onto the defaults
    ///
    /// Fields that fail to parse keep their default; unknown keys are ignored
    /// here but left untouched in storage.
    pub fn resolve(stored: Option<&Value>) -> Self {
        let Some(Value::Object(stored)) = stored else {
            return Self::default();
        };

        let mut merged = match serde_json::to_value(Self::default()) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        for (key, value) in stored {
            let mut trial = merged.clone();
            trial.insert(key.clone(), value.clone());
            if serde_json::from_value::<Settings>(Value::Object(trial.clone())).is_ok() {
                merged = trial;
            } else {
                tracing::warn!(%key, "ignoring unreadable stored setting");
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or_default()
    }

    /// The user override selector, if one is configured
    pub fn custom_selector(&self) -> Option<&str> {
        self.custom_selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Partial settings update; absent fields are left as stored
///
/// A blank `customSelector` clears the override.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_mode:              Option<InsertMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_context_menu:        Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme:                    Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_overwrite_system: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_delete_prompt:    Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_close_panel:         Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_selector:          Option<String>,
}

impl SettingsPatch {
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(selector) = self.custom_selector.as_deref().map(str::trim) {
            if !selector.is_empty() {
                crate::page::selector::SelectorList::parse(selector).map_err(|e| {
                    PromptError::ValidationError(format!("Invalid custom selector: {}", e))
                })?;
            }
        }
        Ok(())
    }

    /// Merge onto a stored settings record, keeping keys this patch doesn't name
    pub(crate) fn apply_to(&self, stored: &mut Map<String, Value>) -> Result<()> {
        let Value::Object(fields) = serde_json::to_value(self)? else {
            return Ok(());
        };

        for (key, value) in fields {
            stored.insert(key, value);
        }

        if let Some(selector) = &self.custom_selector {
            let selector = selector.trim();
            if selector.is_empty() {
                stored.remove("customSelector");
            } else {
                stored.insert("customSelector".into(), Value::String(selector.to_string()));
            }
        }
        Ok(())
    }
}

/// Materialized view assembled from both partitions on every read
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Most-recently-used first
    pub prompts:             Vec<Prompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_used_prompt_id: Option<String>,
    pub settings:            Settings,
    pub version:             u32,
}

impl AppState {
    pub fn prompt(&self, id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    pub fn last_used(&self) -> Option<&Prompt> {
        self.last_used_prompt_id
            .as_deref()
            .and_then(|id| self.prompt(id))
    }

    /// Case-insensitive substring match on name or content, MRU order kept
    pub fn filter(&self, query: &str) -> Vec<&Prompt> {
        let query = query.trim().to_lowercase();
        self.prompts
            .iter()
            .filter(|p| {
                query.is_empty()
                    || p.name.to_lowercase().contains(&query)
                    || p.content.to_lowercase().contains(&query)
            })
            .collect()
    }
}

/// Name order, ignoring case; id breaks ties so output is deterministic
pub fn alphabetical_order(a: &Prompt, b: &Prompt) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.id.cmp(&b.id))
}

/// Most recently used first; never-used prompts follow, by name
pub fn mru_order(a: &Prompt, b: &Prompt) -> Ordering {
    match (a.last_used_at, b.last_used_at) {
        (Some(x), Some(y)) if x != y => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => alphabetical_order(a, b),
    }
}

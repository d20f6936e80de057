//! Persisted layout: key names and the SQLite table backing both partitions

/// Local partition: one entry per prompt under `prompt_<id>`.
pub const PROMPT_KEY_PREFIX: &str = "prompt_";

/// Synced partition keys
pub const SETTINGS_KEY: &str = "settings";
pub const LAST_USED_KEY: &str = "lastUsedPromptId";
pub const VERSION_KEY: &str = "version";

/// Reserved for future migrations.
pub const CURRENT_VERSION: u32 = 1;

pub const SCHEMA: &str = "
-- Key-value entries, one row per (partition, key)
CREATE TABLE IF NOT EXISTS kv (
    partition TEXT NOT NULL,      -- 'synced' or 'local'
    key TEXT NOT NULL,
    value TEXT NOT NULL,          -- JSON document
    updated_at INTEGER NOT NULL,  -- Unix timestamp (milliseconds)
    PRIMARY KEY (partition, key)
);
";

/// Storage key for a prompt id
pub fn prompt_key(id: &str) -> String {
    format!("{}{}", PROMPT_KEY_PREFIX, id)
}

pub fn is_prompt_key(key: &str) -> bool {
    key.starts_with(PROMPT_KEY_PREFIX)
}

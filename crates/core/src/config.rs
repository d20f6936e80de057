//! Runtime configuration
//!
//! Values come from the process environment, optionally seeded from a `.env`
//! file in the working directory:
//! - `PROMPTDOCK_DATA_DIR` - directory holding the SQLite store
//! - `PROMPTDOCK_OBSERVE_TIMEOUT_MS` - how long the locator observes the page
//! - `PROMPTDOCK_NOTICE_MS` - how long page notices stay visible
//! - `PROMPTDOCK_SYNC_ITEM_QUOTA` - per-item byte quota of the synced partition
//! - `PROMPTDOCK_LOG` - tracing filter directive

use std::{path::PathBuf, time::Duration};

use crate::errors::{PromptError, Result};

pub const DEFAULT_OBSERVE_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_millis(3500);
/// Matches the per-item limit browsers put on their synced storage area.
pub const DEFAULT_SYNC_ITEM_QUOTA: usize = 8192;
pub const DEFAULT_LOG_FILTER: &str = "promptdock_core=info";

const DATABASE_FILE: &str = "promptdock.db";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir:        PathBuf,
    pub observe_timeout: Duration,
    pub notice_duration: Duration,
    pub sync_item_quota: usize,
    pub log_filter:      String,
}

impl Config {
    /// Load configuration from `.env` (if present) and the environment
    pub fn from_env() -> Result<Self> {
        // A missing .env file is the normal case.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup("PROMPTDOCK_DATA_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => default_data_dir()?,
        };

        let observe_timeout = parse_millis(&lookup, "PROMPTDOCK_OBSERVE_TIMEOUT_MS")?
            .unwrap_or(DEFAULT_OBSERVE_TIMEOUT);
        let notice_duration =
            parse_millis(&lookup, "PROMPTDOCK_NOTICE_MS")?.unwrap_or(DEFAULT_NOTICE_DURATION);

        let sync_item_quota = match lookup("PROMPTDOCK_SYNC_ITEM_QUOTA") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| {
                PromptError::ConfigError(format!("PROMPTDOCK_SYNC_ITEM_QUOTA='{}': {}", raw, e))
            })?,
            None => DEFAULT_SYNC_ITEM_QUOTA,
        };

        let log_filter = lookup("PROMPTDOCK_LOG")
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            data_dir,
            observe_timeout,
            notice_duration,
            sync_item_quota,
            log_filter,
        })
    }

    /// Config rooted at an explicit directory with default tunables
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir:        data_dir.into(),
            observe_timeout: DEFAULT_OBSERVE_TIMEOUT,
            notice_duration: DEFAULT_NOTICE_DURATION,
            sync_item_quota: DEFAULT_SYNC_ITEM_QUOTA,
            log_filter:      DEFAULT_LOG_FILTER.to_string(),
        }
    }

    pub fn with_observe_timeout(mut self, timeout: Duration) -> Self {
        self.observe_timeout = timeout;
        self
    }

    /// Path of the SQLite file holding both storage partitions
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| PromptError::ConfigError("Could not determine data directory".into()))?;
    Ok(base.join("promptdock"))
}

fn parse_millis<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| PromptError::ConfigError(format!("{}='{}': {}", key, raw, e)))?;
            Ok(Some(Duration::from_millis(millis)))
        },
        None => Ok(None),
    }
}

//! JSON boundary for host surfaces
//!
//! The popup and options surfaces are driven by a host that speaks JSON
//! strings. This module handles:
//! - Command dispatch
//! - Quick-insert suggestions
//! - Error conversion to surface-friendly objects

use serde_json::{json, Value};

use crate::{
    broadcast::Hub,
    commands::{self, Context},
    config::Config,
    errors::{PromptError, Result},
    logging, runtime,
    storage::Store,
};

pub struct Bridge {
    ctx: Context,
}

impl Bridge {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Install logging, open the configured store and seed first-run state
    ///
    /// Blocks on the shared runtime; call it from synchronous host code.
    pub fn setup(config: &Config, hub: Hub) -> Result<Self> {
        logging::init(config)?;
        let store = Store::open(config, hub)?;
        let seeded = runtime::block_on(store.initialize())?;
        tracing::info!(seeded, "bridge ready");
        Ok(Self::new(Context::new(store)))
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Main entry point for command execution
    ///
    /// # Arguments
    /// * `command` - Command name in format "category.action" (e.g., "prompts.list")
    /// * `args` - Command arguments as a JSON string; empty means no arguments
    ///
    /// # Returns
    /// Result as a JSON string, or an error object (see [`error_object`])
    pub fn call(&self, command: &str, args: &str) -> String {
        let result = parse_args(args)
            .and_then(|args| runtime::block_on(commands::dispatch(&self.ctx, command, args)));

        let value = match result {
            Ok(value) => value,
            Err(err) if err.is_invalid_input() => {
                tracing::debug!(command, category = err.category(), "command rejected: {}", err);
                error_object(&err)
            },
            Err(err) => {
                tracing::warn!(command, category = err.category(), "command failed: {}", err);
                error_object(&err)
            },
        };
        value.to_string()
    }

    /// Names of prompts matching `query`, in display order
    ///
    /// Never fails visibly; storage errors yield an empty list.
    pub fn autocomplete(&self, query: &str) -> Vec<String> {
        match runtime::block_on(self.ctx.store.read()) {
            Ok(state) => state.filter(query).into_iter().map(|p| p.name.clone()).collect(),
            Err(err) => {
                tracing::warn!("autocomplete error: {}", err);
                vec![]
            },
        }
    }
}

fn parse_args(args: &str) -> Result<Value> {
    if args.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(args)?)
}

/// Create a structured error object for a surface
///
/// Fields:
/// - `error`: true (marker that this is an error response)
/// - `message`: user-friendly error message
/// - `category`: error category for logging/handling
/// - `invalidInput`: true when the user can fix it by changing what they entered
pub fn error_object(err: &PromptError) -> Value {
    json!({
        "error": true,
        "message": err.user_message(),
        "category": err.category(),
        "invalidInput": err.is_invalid_input(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PromptDraft;

    fn bridge() -> Bridge {
        Bridge::new(Context::new(Store::in_memory(Hub::new())))
    }

    fn call(bridge: &Bridge, command: &str, args: &str) -> Value {
        serde_json::from_str(&bridge.call(command, args)).unwrap()
    }

    #[test]
    fn test_call_unknown_command_returns_error_object() {
        let value = call(&bridge(), "unknown.command", "{}");

        assert_eq!(value["error"], json!(true));
        assert!(value["message"].as_str().unwrap().contains("unknown.command"));
        assert_eq!(value["category"], json!("command"));
        assert_eq!(value["invalidInput"], json!(false));
    }

    #[test]
    fn test_call_with_empty_args() {
        let value = call(&bridge(), "ping", "");
        assert_eq!(value, json!({"pong": true}));
    }

    #[test]
    fn test_call_with_malformed_args() {
        let value = call(&bridge(), "ping", "{oops");
        assert_eq!(value["category"], json!("serialization"));
    }

    #[test]
    fn test_validation_message_reaches_surface() {
        let value = call(&bridge(), "prompts.upsert", r#"{"name":"","content":"x"}"#);
        assert_eq!(value["category"], json!("validation"));
        assert_eq!(value["message"], json!("Name is required."));
        assert_eq!(value["invalidInput"], json!(true));
    }

    #[test]
    fn test_storage_failure_is_not_invalid_input() {
        let value = error_object(&PromptError::StorageError("quota".into()));
        assert_eq!(value["category"], json!("storage"));
        assert_eq!(value["invalidInput"], json!(false));
    }

    #[test]
    fn test_autocomplete_filters_names() {
        let bridge = bridge();
        runtime::block_on(async {
            bridge.context().store.upsert(PromptDraft::new("Reviewer", "diff")).await?;
            bridge.context().store.upsert(PromptDraft::new("Poet", "rhyme")).await
        })
        .unwrap();

        assert_eq!(bridge.autocomplete("rev"), vec!["Reviewer".to_string()]);
        assert_eq!(bridge.autocomplete("RHY"), vec!["Poet".to_string()]);
        assert_eq!(bridge.autocomplete("").len(), 2);
    }

    #[test]
    fn test_setup_seeds_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_data_dir(dir.path());

        let bridge = Bridge::setup(&config, Hub::new()).unwrap();
        assert!(config.database_path().exists());
        assert_eq!(bridge.autocomplete("").len(), 1);
    }
}

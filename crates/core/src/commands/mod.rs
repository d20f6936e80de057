//! Command registry and dispatch system
//!
//! The popup and options surfaces talk to the core through a static registry
//! of commands named "category.action" (e.g., "prompts.list", "settings.set").
//! Each handler receives a [`Context`] and JSON arguments and resolves to a
//! JSON result.
//!
//! ## Adding a new command
//!
//! 1. Create handler function: `pub fn my_command(ctx: Context, args: Value) -> CommandFuture`
//! 2. Register in `REGISTRY`: `("category.action", my_command as CommandHandler)`
//! 3. Add tests for the command

use std::collections::HashMap;

use futures_util::{future::BoxFuture, FutureExt};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    errors::{PromptError, Result},
    runtime,
    storage::Store,
};

pub mod prompts;
pub mod settings;
pub mod snapshot;
pub mod state;

/// Future returned by every command handler
pub type CommandFuture = BoxFuture<'static, Result<Value>>;

/// Type alias for command handler functions
pub type CommandHandler = fn(Context, Value) -> CommandFuture;

/// Everything a command may touch
#[derive(Clone)]
pub struct Context {
    pub store: Store,
}

impl Context {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

/// Static command registry
///
/// Maps command names to handler functions. Initialized lazily on first access.
static REGISTRY: Lazy<HashMap<&'static str, CommandHandler>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Test command
    map.insert("ping", ping as CommandHandler);

    map.insert("state.read", state::read as CommandHandler);
    map.insert("state.initialize", state::initialize as CommandHandler);

    map.insert("prompts.list", prompts::list as CommandHandler);
    map.insert("prompts.upsert", prompts::upsert as CommandHandler);
    map.insert("prompts.delete", prompts::delete as CommandHandler);
    map.insert("prompts.use", prompts::use_prompt as CommandHandler);

    map.insert("settings.get", settings::get as CommandHandler);
    map.insert("settings.set", settings::set as CommandHandler);

    map.insert("snapshot.export", snapshot::export as CommandHandler);
    map.insert("snapshot.import", snapshot::import as CommandHandler);

    map
});

/// Dispatch a command by name
///
/// # Returns
/// Command result as JSON Value, or `CommandNotFound` for unknown names
pub async fn dispatch(ctx: &Context, command: &str, args: Value) -> Result<Value> {
    match REGISTRY.get(command) {
        Some(handler) => {
            tracing::debug!(command, "dispatching command");
            handler(ctx.clone(), args).await
        },
        None => Err(PromptError::CommandNotFound(command.to_string())),
    }
}

/// Dispatch from synchronous code on the shared runtime
pub fn dispatch_blocking(ctx: &Context, command: &str, args: Value) -> Result<Value> {
    runtime::block_on(dispatch(ctx, command, args))
}

/// List all available commands
///
/// Returns a sorted list of all registered command names.
pub fn list_commands() -> Vec<String> {
    let mut commands: Vec<String> = REGISTRY.keys().map(|&k| k.to_string()).collect();
    commands.sort();
    commands
}

/// Deserialize command arguments, reporting failures as `InvalidArgs`
pub(crate) fn parse_args<T: DeserializeOwned>(command: &str, args: Value) -> Result<T> {
    let args = if args.is_null() { Value::Object(Default::default()) } else { args };
    serde_json::from_value(args).map_err(|e| PromptError::InvalidArgs {
        command: command.to_string(),
        reason:  e.to_string(),
    })
}

// ============================================================================
// Test Commands
// ============================================================================

/// Ping command - simple test to verify command dispatch works
///
/// Returns the input arguments with an added "pong" field.
///
/// # Example
/// ```json
/// // Input:  {"message": "hello"}
/// // Output: {"message": "hello", "pong": true}
/// ```
fn ping(_ctx: Context, args: Value) -> CommandFuture {
    async move {
        let mut result = match args {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        result.insert("pong".to_string(), Value::Bool(true));
        Ok(Value::Object(result))
    }
    .boxed()
}

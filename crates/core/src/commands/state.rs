//! Whole-state commands used when a surface opens

use futures_util::FutureExt;
use serde_json::{json, Value};

use super::{CommandFuture, Context};

/// Unified state snapshot; never seeds defaults
pub fn read(ctx: Context, _args: Value) -> CommandFuture {
    async move {
        let state = ctx.store.read().await?;
        Ok(serde_json::to_value(state)?)
    }
    .boxed()
}

/// First-run seeding; a no-op once settings exist
pub fn initialize(ctx: Context, _args: Value) -> CommandFuture {
    async move {
        let seeded = ctx.store.initialize().await?;
        Ok(json!({ "initialized": seeded }))
    }
    .boxed()
}

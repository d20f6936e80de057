use futures_util::FutureExt;
use serde_json::Value;

use super::{parse_args, CommandFuture, Context};
use crate::storage::SettingsPatch;

pub fn get(ctx: Context, _args: Value) -> CommandFuture {
    async move { Ok(serde_json::to_value(ctx.store.settings().await?)?) }.boxed()
}

/// Merge the given fields onto the stored settings
pub fn set(ctx: Context, args: Value) -> CommandFuture {
    async move {
        let patch: SettingsPatch = parse_args("settings.set", args)?;
        let settings = ctx.store.set_settings(patch).await?;
        Ok(serde_json::to_value(settings)?)
    }
    .boxed()
}

use futures_util::FutureExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, CommandFuture, Context};

#[derive(Debug, Deserialize)]
struct ImportArgs {
    text:  String,
    /// Required to accept a file with no prompts
    #[serde(default)]
    force: bool,
}

pub fn export(ctx: Context, _args: Value) -> CommandFuture {
    async move {
        let text = ctx.store.export_snapshot().await?;
        Ok(json!({ "text": text }))
    }
    .boxed()
}

/// Replace all prompts and settings with the contents of an export file
pub fn import(ctx: Context, args: Value) -> CommandFuture {
    async move {
        let ImportArgs { text, force } = parse_args("snapshot.import", args)?;
        let count = ctx.store.import_snapshot(&text, force).await?;
        Ok(json!({ "count": count }))
    }
    .boxed()
}

use futures_util::FutureExt;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, CommandFuture, Context};
use crate::storage::PromptDraft;

#[derive(Debug, Default, Deserialize)]
struct ListArgs {
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdArgs {
    id: String,
}

/// Prompts in most-recently-used order, optionally filtered
pub fn list(ctx: Context, args: Value) -> CommandFuture {
    async move {
        let args: ListArgs = parse_args("prompts.list", args)?;
        let state = ctx.store.read().await?;
        let prompts = match args.query.as_deref() {
            Some(query) => state.filter(query),
            None => state.prompts.iter().collect(),
        };
        Ok(json!({
            "prompts": prompts,
            "lastUsedPromptId": state.last_used_prompt_id,
        }))
    }
    .boxed()
}

pub fn upsert(ctx: Context, args: Value) -> CommandFuture {
    async move {
        let draft: PromptDraft = parse_args("prompts.upsert", args)?;
        let (prompt, kind) = ctx.store.upsert(draft).await?;
        Ok(json!({ "prompt": prompt, "action": kind.action().as_str() }))
    }
    .boxed()
}

pub fn delete(ctx: Context, args: Value) -> CommandFuture {
    async move {
        let IdArgs { id } = parse_args("prompts.delete", args)?;
        let deleted = ctx.store.delete(&id).await?;
        Ok(json!({ "deleted": deleted }))
    }
    .boxed()
}

/// Mark a prompt as last used
pub fn use_prompt(ctx: Context, args: Value) -> CommandFuture {
    async move {
        let IdArgs { id } = parse_args("prompts.use", args)?;
        let prompt = ctx.store.set_last_used(&id).await?;
        Ok(json!(prompt))
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        broadcast::Hub,
        commands::dispatch,
        errors::PromptError,
        storage::Store,
    };

    fn ctx() -> Context {
        Context::new(Store::in_memory(Hub::new()))
    }

    #[tokio::test]
    async fn test_upsert_then_list() {
        let ctx = ctx();
        let added = dispatch(&ctx, "prompts.upsert", json!({"name": "Tone", "content": "Be brief."}))
            .await
            .unwrap();
        assert_eq!(added["action"], json!("added"));
        let id = added["prompt"]["id"].as_str().unwrap().to_string();

        let updated = dispatch(
            &ctx,
            "prompts.upsert",
            json!({"id": id, "name": "Tone", "content": "Be very brief."}),
        )
        .await
        .unwrap();
        assert_eq!(updated["action"], json!("updated"));

        let listed = dispatch(&ctx, "prompts.list", json!(null)).await.unwrap();
        let prompts = listed["prompts"].as_array().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0]["content"], json!("Be very brief."));
    }

    #[tokio::test]
    async fn test_list_query_filters_case_insensitively() {
        let ctx = ctx();
        for (name, content) in [("Reviewer", "Check the diff"), ("Poet", "Rhyme everything")] {
            dispatch(&ctx, "prompts.upsert", json!({"name": name, "content": content}))
                .await
                .unwrap();
        }

        let listed = dispatch(&ctx, "prompts.list", json!({"query": "DIFF"})).await.unwrap();
        let prompts = listed["prompts"].as_array().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0]["name"], json!("Reviewer"));
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let ctx = ctx();
        let result = dispatch(&ctx, "prompts.upsert", json!({"name": "  ", "content": "x"})).await;
        assert!(matches!(result, Err(PromptError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_use_and_delete() {
        let ctx = ctx();
        let added = dispatch(&ctx, "prompts.upsert", json!({"name": "A", "content": "a"}))
            .await
            .unwrap();
        let id = added["prompt"]["id"].clone();

        let used = dispatch(&ctx, "prompts.use", json!({"id": id})).await.unwrap();
        assert!(used["lastUsedAt"].is_i64());

        let listed = dispatch(&ctx, "prompts.list", json!({})).await.unwrap();
        assert_eq!(listed["lastUsedPromptId"], id);

        let deleted = dispatch(&ctx, "prompts.delete", json!({"id": id})).await.unwrap();
        assert_eq!(deleted["deleted"], json!(true));
        let again = dispatch(&ctx, "prompts.delete", json!({"id": id})).await.unwrap();
        assert_eq!(again["deleted"], json!(false));
    }

    #[tokio::test]
    async fn test_missing_id_is_invalid_args() {
        let result = dispatch(&ctx(), "prompts.use", json!({})).await;
        assert!(matches!(result, Err(PromptError::InvalidArgs { .. })));
    }
}

//! Writing prompt text into a located field

use super::{EventKind, NodeId, OverwriteConfirm, Page};
use crate::{
    errors::Result,
    storage::{InsertMode, SettingsPatch, Store},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The user declined to overwrite existing content
    Cancelled,
}

/// Combine the field's current content with `text` under `mode`
pub fn compose(existing: &str, text: &str, mode: InsertMode) -> String {
    if existing.is_empty() {
        return text.to_string();
    }
    match mode {
        InsertMode::Replace => text.to_string(),
        InsertMode::Append => {
            let sep = if existing.ends_with('\n') { "" } else { "\n" };
            format!("{existing}{sep}{text}")
        },
        InsertMode::Prepend => {
            let sep = if text.ends_with('\n') { "" } else { "\n" };
            format!("{text}{sep}{existing}")
        },
    }
}

fn is_form_control(page: &dyn Page, node: NodeId) -> bool {
    matches!(page.tag_name(node).as_deref(), Some("textarea" | "input"))
}

/// Write without confirmation, then notify the page's listeners
pub fn apply(page: &dyn Page, node: NodeId, text: &str, mode: InsertMode) -> String {
    let next = compose(&page.text(node), text, mode);
    let form_control = is_form_control(page, node);

    page.focus(node);
    page.set_text(node, &next);
    if form_control {
        page.move_caret_to_end(node);
    }
    page.dispatch(node, EventKind::Input);
    if form_control {
        page.dispatch(node, EventKind::Change);
    }
    next
}

/// Insert `text` into `node`, asking first when a replace would discard content
pub async fn insert(
    page: &dyn Page,
    store: &Store,
    confirm: &dyn OverwriteConfirm,
    node: NodeId,
    text: &str,
    mode: InsertMode,
) -> Result<InsertOutcome> {
    if mode == InsertMode::Replace && !page.text(node).trim().is_empty() {
        let settings = store.settings().await?;
        if settings.confirm_overwrite_system {
            let prefer_dark = settings.theme.prefers_dark(page.prefers_dark());
            let outcome = confirm.confirm_overwrite(prefer_dark).await;
            if !outcome.confirmed {
                tracing::debug!(node, "overwrite cancelled");
                return Ok(InsertOutcome::Cancelled);
            }
            if outcome.dont_ask_again {
                store
                    .set_settings(SettingsPatch {
                        confirm_overwrite_system: Some(false),
                        ..Default::default()
                    })
                    .await?;
            }
        }
    }

    apply(page, node, text, mode);
    Ok(InsertOutcome::Inserted)
}

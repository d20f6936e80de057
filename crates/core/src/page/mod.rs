//! Page-side logic: finding the target field and inserting into it
//!
//! The host page is reached through the [`Page`] trait so the locator and the
//! insertion engine never depend on a particular DOM binding. [`MemoryPage`]
//! is the in-process implementation used by tests and headless replays.

pub mod handler;
pub mod insert;
pub mod locator;
pub mod memory;
pub mod selector;

use std::time::Duration;

use async_trait::async_trait;
pub use handler::PageHandler;
pub use insert::{compose, InsertOutcome};
pub use locator::{Located, Locator, LocatorProfile, Strategy};
pub use memory::{ElementSpec, MemoryPage};
pub use selector::{SelectorError, SelectorList};
use tokio::sync::broadcast;

/// Opaque element handle
pub type NodeId = usize;

/// Layout and style facts that decide whether an element is visible
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Visibility {
    pub hidden:            bool,
    pub display_none:      bool,
    pub visibility_hidden: bool,
    pub opacity:           f32,
    pub client_rects:      usize,
}

impl Visibility {
    pub fn shown() -> Self {
        Self {
            hidden:            false,
            display_none:      false,
            visibility_hidden: false,
            opacity:           1.0,
            client_rects:      1,
        }
    }

    /// Laid out but `display: none`
    pub fn collapsed() -> Self {
        Self {
            display_none: true,
            client_rects: 0,
            ..Self::shown()
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.hidden
            && !self.display_none
            && !self.visibility_hidden
            && self.opacity > 0.0
            && self.client_rects > 0
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::shown()
    }
}

/// Synthetic events dispatched after a programmatic write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Input,
    Change,
}

/// Access to the host page's DOM
pub trait Page: Send + Sync {
    /// All elements matching `selector`, in document order
    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError>;

    /// Nearest inclusive ancestor matching `selector`
    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError>;

    fn tag_name(&self, node: NodeId) -> Option<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn is_content_editable(&self, node: NodeId) -> bool;

    fn visibility(&self, node: NodeId) -> Visibility;

    fn active_element(&self) -> Option<NodeId>;

    fn click(&self, node: NodeId);

    fn focus(&self, node: NodeId);

    /// `value` for form controls, rendered text otherwise
    fn text(&self, node: NodeId) -> String;

    fn set_text(&self, node: NodeId, text: &str);

    fn move_caret_to_end(&self, node: NodeId);

    fn dispatch(&self, node: NodeId, event: EventKind);

    /// Fires once per subtree mutation
    fn subscribe_mutations(&self) -> broadcast::Receiver<()>;

    fn prefers_dark(&self) -> bool;

    /// Non-blocking, auto-dismissing notice
    fn show_notice(&self, message: &str, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfirmOutcome {
    pub confirmed:      bool,
    pub dont_ask_again: bool,
}

impl ConfirmOutcome {
    pub fn confirmed() -> Self {
        Self {
            confirmed:      true,
            dont_ask_again: false,
        }
    }

    pub fn cancelled() -> Self {
        Self::default()
    }
}

/// The isolated overwrite-confirmation modal
#[async_trait]
pub trait OverwriteConfirm: Send + Sync {
    async fn confirm_overwrite(&self, prefer_dark: bool) -> ConfirmOutcome;
}

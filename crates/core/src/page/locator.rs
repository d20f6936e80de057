//! Target field locator
//!
//! Runs an ordered list of selector strategies against the current page
//! ("searching"). When nothing matches and the panel is collapsed, clicks the
//! reveal toggle and watches page mutations until a match appears or the
//! timeout fires ("observing").

use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;

use super::{NodeId, Page};

/// Selectors describing the host page's target field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorProfile {
    /// Expected tag of the target field
    pub tag:             String,
    pub label:           String,
    pub placeholder:     String,
    pub class_hint:      String,
    /// Region holding the unrelated main input; never a valid target
    pub excluded_region: String,
    /// Control that reveals the collapsed panel
    pub toggle:          String,
}

impl Default for LocatorProfile {
    fn default() -> Self {
        Self {
            tag:             "textarea".into(),
            label:           r#"textarea[aria-label="System instructions"]"#.into(),
            placeholder:     r#"textarea[placeholder="Optional tone and style instructions for the model"]"#
                .into(),
            class_hint:      "textarea.cdk-textarea-autosize.textarea.toolbar-expand-textarea".into(),
            excluded_region: ".prompt-input-wrapper-container".into(),
            toggle:          r#"button[aria-label="System instructions"], button[data-test-si]"#.into(),
        }
    }
}

/// Which rule produced the match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Custom,
    AccessibleLabel,
    Placeholder,
    ClassHint,
    AnyCandidate,
    Focused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub node:     NodeId,
    pub strategy: Strategy,
}

pub struct Locator<'a> {
    page:    &'a dyn Page,
    profile: &'a LocatorProfile,
    custom:  Option<&'a str>,
}

impl<'a> Locator<'a> {
    pub fn new(page: &'a dyn Page, profile: &'a LocatorProfile, custom: Option<&'a str>) -> Self {
        Self {
            page,
            profile,
            custom: custom.map(str::trim).filter(|s| !s.is_empty()),
        }
    }

    pub fn is_visible(&self, node: NodeId) -> bool {
        self.page.visibility(node).is_visible()
    }

    pub fn is_excluded(&self, node: NodeId) -> bool {
        matches!(self.page.closest(node, &self.profile.excluded_region), Ok(Some(_)))
    }

    pub fn is_editable(&self, node: NodeId) -> bool {
        match self.page.tag_name(node).as_deref() {
            Some("textarea") => return true,
            Some("input") => {
                let kind = self.page.attribute(node, "type");
                if kind.as_deref().map_or(true, |t| t.eq_ignore_ascii_case("text")) {
                    return true;
                }
            },
            _ => {},
        }
        self.page.is_content_editable(node) || self.page.attribute(node, "role").as_deref() == Some("textbox")
    }

    fn first_match(&self, selector: &str) -> Option<NodeId> {
        match self.page.query_all(selector) {
            Ok(nodes) => nodes
                .into_iter()
                .find(|&node| self.is_visible(node) && !self.is_excluded(node)),
            Err(err) => {
                tracing::debug!("skipping selector {:?}: {}", selector, err);
                None
            },
        }
    }

    /// One synchronous pass over the current page
    pub fn search(&self) -> Option<Located> {
        let mut strategies: Vec<(Strategy, &str)> = Vec::with_capacity(5);
        if let Some(custom) = self.custom {
            strategies.push((Strategy::Custom, custom));
        }
        strategies.extend([
            (Strategy::AccessibleLabel, self.profile.label.as_str()),
            (Strategy::Placeholder, self.profile.placeholder.as_str()),
            (Strategy::ClassHint, self.profile.class_hint.as_str()),
            (Strategy::AnyCandidate, self.profile.tag.as_str()),
        ]);

        strategies.into_iter().find_map(|(strategy, selector)| {
            self.first_match(selector).map(|node| {
                tracing::debug!(?strategy, node, "target located");
                Located { node, strategy }
            })
        })
    }

    pub fn toggle(&self) -> Option<NodeId> {
        self.page
            .query_all(&self.profile.toggle)
            .ok()
            .and_then(|nodes| nodes.into_iter().next())
    }

    /// The focused element, when it is a reasonable place to insert
    pub fn focused_fallback(&self) -> Option<Located> {
        let node = self.page.active_element()?;
        (self.is_editable(node) && !self.is_excluded(node)).then_some(Located {
            node,
            strategy: Strategy::Focused,
        })
    }

    /// Search now, then again after every page mutation until `timeout`
    pub async fn wait_for(&self, timeout: Duration) -> Option<Located> {
        // Subscribe before searching so nothing slips between the two
        let mut mutations = self.page.subscribe_mutations();
        if let Some(found) = self.search() {
            return Some(found);
        }

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return self.search(),
                changed = mutations.recv() => match changed {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        if let Some(found) = self.search() {
                            return Some(found);
                        }
                    },
                    Err(RecvError::Closed) => {
                        (&mut deadline).await;
                        return self.search();
                    },
                },
            }
        }
    }

    /// Full resolution: search, reveal and observe, then fall back to focus
    pub async fn resolve(&self, timeout: Duration) -> Option<Located> {
        let found = match self.search() {
            Some(found) => Some(found),
            None => match self.toggle() {
                Some(toggle) => {
                    tracing::debug!(toggle, "revealing collapsed panel");
                    self.page.click(toggle);
                    self.wait_for(timeout).await
                },
                None => None,
            },
        };

        match found {
            Some(found) if self.is_editable(found.node) => Some(found),
            Some(found) => self.focused_fallback().or(Some(found)),
            None => self.focused_fallback(),
        }
    }
}

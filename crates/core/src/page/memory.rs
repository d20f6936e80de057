//! In-process page model
//!
//! A small element tree with just enough behaviour for the locator and the
//! insertion engine: attributes, visibility, focus, text values, click
//! handlers, and a mutation feed. Every structural or style change fires the
//! mutation feed the way a `MutationObserver` would.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::sync::broadcast;

use super::{
    selector::{SelectorError, SelectorList, SelectorTarget},
    EventKind, NodeId, Page, Visibility,
};

const MUTATION_BUFFER: usize = 64;

type ClickHandler = Arc<dyn Fn(&MemoryPage, NodeId) + Send + Sync>;

/// Description of an element to append
#[derive(Debug, Clone)]
pub struct ElementSpec {
    tag:              String,
    attributes:       BTreeMap<String, String>,
    visibility:       Visibility,
    text:             String,
    content_editable: bool,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag:              tag.to_ascii_lowercase(),
            attributes:       BTreeMap::new(),
            visibility:       Visibility::shown(),
            text:             String::new(),
            content_editable: false,
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        let classes = self.attributes.entry("class".into()).or_default();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(class);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn collapsed(self) -> Self {
        self.visibility(Visibility::collapsed())
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn content_editable(mut self) -> Self {
        self.content_editable = true;
        self
    }
}

struct Node {
    spec:     ElementSpec,
    parent:   Option<NodeId>,
    children: Vec<NodeId>,
    caret:    Option<usize>,
}

#[derive(Default)]
struct Tree {
    nodes:          Vec<Node>,
    active:         Option<NodeId>,
    prefers_dark:   bool,
    events:         Vec<(NodeId, EventKind)>,
    notices:        Vec<(String, Duration)>,
    clicks:         Vec<NodeId>,
    click_handlers: HashMap<NodeId, ClickHandler>,
}

impl Tree {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn document_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0];
        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }
}

impl SelectorTarget for Tree {
    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.node(node).map(|n| n.spec.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.node(node)?
            .spec
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent
    }
}

#[derive(Clone)]
pub struct MemoryPage {
    tree:      Arc<Mutex<Tree>>,
    mutations: broadcast::Sender<()>,
}

impl MemoryPage {
    /// A document with `<html>` (node 0) and `<body>` (node 1)
    pub fn new() -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_BUFFER);
        let page = Self {
            tree: Arc::new(Mutex::new(Tree::default())),
            mutations,
        };

        {
            let mut tree = page.tree();
            tree.nodes.push(Node {
                spec:     ElementSpec::new("html"),
                parent:   None,
                children: Vec::new(),
                caret:    None,
            });
        }
        page.append(0, ElementSpec::new("body"));
        page
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutated(&self) {
        // No observers is fine
        let _ = self.mutations.send(());
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn body(&self) -> NodeId {
        1
    }

    pub fn append(&self, parent: NodeId, spec: ElementSpec) -> NodeId {
        let id = {
            let mut tree = self.tree();
            let id = tree.nodes.len();
            tree.nodes.push(Node {
                spec,
                parent: Some(parent),
                children: Vec::new(),
                caret: None,
            });
            if let Some(p) = tree.nodes.get_mut(parent) {
                p.children.push(id);
            }
            id
        };
        self.mutated();
        id
    }

    pub fn set_visibility(&self, node: NodeId, visibility: Visibility) {
        if let Some(n) = self.tree().nodes.get_mut(node) {
            n.spec.visibility = visibility;
        }
        self.mutated();
    }

    pub fn set_prefers_dark(&self, prefers_dark: bool) {
        self.tree().prefers_dark = prefers_dark;
    }

    /// Run `handler` whenever `node` is clicked
    pub fn on_click<F>(&self, node: NodeId, handler: F)
    where
        F: Fn(&MemoryPage, NodeId) + Send + Sync + 'static,
    {
        self.tree().click_handlers.insert(node, Arc::new(handler));
    }

    pub fn events(&self) -> Vec<(NodeId, EventKind)> {
        self.tree().events.clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.tree().notices.iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn clicks(&self) -> Vec<NodeId> {
        self.tree().clicks.clone()
    }

    pub fn caret(&self, node: NodeId) -> Option<usize> {
        self.tree().node(node)?.caret
    }
}

impl Default for MemoryPage {
    fn default() -> Self {
        Self::new()
    }
}

impl Page for MemoryPage {
    fn query_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector = SelectorList::parse(selector)?;
        let tree = self.tree();
        Ok(tree
            .document_order()
            .into_iter()
            .filter(|&id| selector.matches(&*tree, id))
            .collect())
    }

    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        let selector = SelectorList::parse(selector)?;
        let tree = self.tree();
        let mut current = tree.node(node).map(|_| node);
        while let Some(id) = current {
            if selector.matches(&*tree, id) {
                return Ok(Some(id));
            }
            current = tree.parent(id);
        }
        Ok(None)
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        SelectorTarget::tag_name(&*self.tree(), node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        SelectorTarget::attribute(&*self.tree(), node, name)
    }

    fn is_content_editable(&self, node: NodeId) -> bool {
        self.tree()
            .node(node)
            .is_some_and(|n| n.spec.content_editable)
    }

    fn visibility(&self, node: NodeId) -> Visibility {
        self.tree()
            .node(node)
            .map(|n| n.spec.visibility)
            .unwrap_or(Visibility {
                client_rects: 0,
                ..Visibility::shown()
            })
    }

    fn active_element(&self) -> Option<NodeId> {
        self.tree().active
    }

    fn click(&self, node: NodeId) {
        let handler = {
            let mut tree = self.tree();
            tree.clicks.push(node);
            tree.click_handlers.get(&node).cloned()
        };
        if let Some(handler) = handler {
            handler(self, node);
        }
    }

    fn focus(&self, node: NodeId) {
        let mut tree = self.tree();
        if tree.node(node).is_some() {
            tree.active = Some(node);
        }
    }

    fn text(&self, node: NodeId) -> String {
        self.tree()
            .node(node)
            .map(|n| n.spec.text.clone())
            .unwrap_or_default()
    }

    fn set_text(&self, node: NodeId, text: &str) {
        if let Some(n) = self.tree().nodes.get_mut(node) {
            n.spec.text = text.to_string();
        }
    }

    fn move_caret_to_end(&self, node: NodeId) {
        if let Some(n) = self.tree().nodes.get_mut(node) {
            n.caret = Some(n.spec.text.chars().count());
        }
    }

    fn dispatch(&self, node: NodeId, event: EventKind) {
        self.tree().events.push((node, event));
    }

    fn subscribe_mutations(&self) -> broadcast::Receiver<()> {
        self.mutations.subscribe()
    }

    fn prefers_dark(&self) -> bool {
        self.tree().prefers_dark
    }

    fn show_notice(&self, message: &str, duration: Duration) {
        tracing::info!(%message, ?duration, "page notice");
        self.tree().notices.push((message.to_string(), duration));
    }
}

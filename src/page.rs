//! The rendered page the controllers operate on.
//!
//! A page arrives as a [`PageSnapshot`]: a flat list of nodes (with parent
//! references, role classes, data attributes, visibility and text) plus the
//! page-scoped session values. The controllers never create page structure;
//! they only flip visibility, replace text and attributes, and manage the three kinds of
//! transient widgets a page can carry: preview popovers, tooltips and the toast.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// One element as produced by the templating layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default = "visible_by_default")]
    pub visible: bool,
    #[serde(default)]
    pub text: String,
}

fn visible_by_default() -> bool {
    true
}

/// A rendered page as handed over by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Whether the viewer is logged in
    #[serde(default)]
    pub authenticated: bool,
    /// Anti-forgery token for mutating requests
    #[serde(default)]
    pub csrf_token: String,
    pub nodes: Vec<NodeSpec>,
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("duplicate node id {0:?}")]
    DuplicateId(String),
    #[error("node {node:?} references unknown parent {parent:?}")]
    UnknownParent { node: String, parent: String },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub classes: Vec<String>,
    pub data: BTreeMap<String, String>,
    pub visible: bool,
    pub text: String,
    pub tooltip: Option<String>,
}

/// Popover anchored to a trigger node, holding the fetched preview markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewWidget {
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// The single message area of the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Toast {
    pub text: String,
    pub severity: Severity,
    pub visible: bool,
}

/// Places the pointer can be in, as far as the controllers care.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hotspot {
    Node(NodeId),
    /// The preview widget anchored to the given node
    Preview(NodeId),
}

#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    by_name: HashMap<String, NodeId>,
    previews: HashMap<NodeId, PreviewWidget>,
    toast: Toast,
    pointer: HashSet<Hotspot>,
}

impl Document {
    pub fn from_nodes(specs: Vec<NodeSpec>) -> Result<Self, PageError> {
        let mut by_name = HashMap::with_capacity(specs.len());
        for (idx, spec) in specs.iter().enumerate() {
            if by_name.insert(spec.id.clone(), NodeId(idx)).is_some() {
                return Err(PageError::DuplicateId(spec.id.clone()));
            }
        }

        let nodes = specs
            .into_iter()
            .map(|spec| {
                let parent = match spec.parent {
                    Some(parent) => match by_name.get(&parent) {
                        Some(id) => Some(*id),
                        None => return Err(PageError::UnknownParent { node: spec.id, parent }),
                    },
                    None => None,
                };
                Ok(Node {
                    name: spec.id,
                    parent,
                    classes: spec.classes,
                    data: spec.data,
                    visible: spec.visible,
                    text: spec.text,
                    tooltip: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            nodes,
            by_name,
            previews: HashMap::new(),
            toast: Toast::default(),
            pointer: HashSet::new(),
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.nodes[id.0].classes.iter().any(|c| c == class)
    }

    pub fn data(&self, id: NodeId, key: &str) -> Option<&str> {
        self.nodes[id.0].data.get(key).map(String::as_str)
    }

    pub fn set_data(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        self.nodes[id.0].data.insert(key.to_string(), value.into());
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Walks from `id` up to the root and returns the first node matching `pred`.
    pub fn closest(&self, id: NodeId, mut pred: impl FnMut(&Self, NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if pred(self, node) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Other nodes sharing the parent of `id`.
    pub fn siblings(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let parent = self.parent(id);
        self.ids().filter(move |&other| other != id && self.parent(other) == parent)
    }

    pub fn is_visible(&self, id: NodeId) -> bool {
        self.nodes[id.0].visible
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        self.nodes[id.0].visible = visible;
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.0].text
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.nodes[id.0].text = text.into();
    }

    pub fn tooltip(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].tooltip.as_deref()
    }

    pub fn set_tooltip(&mut self, id: NodeId, title: impl Into<String>) {
        self.nodes[id.0].tooltip = Some(title.into());
    }

    pub fn preview(&self, anchor: NodeId) -> Option<&PreviewWidget> {
        self.previews.get(&anchor)
    }

    /// Creates the preview widget for `anchor`, or reuses the existing one with new content.
    pub fn show_preview(&mut self, anchor: NodeId, content: impl Into<String>) {
        let content = content.into();
        self.previews
            .entry(anchor)
            .and_modify(|w| w.content = content.clone())
            .or_insert(PreviewWidget { content });
    }

    /// Destroys the preview widget. Returns whether one existed.
    pub fn remove_preview(&mut self, anchor: NodeId) -> bool {
        self.pointer.remove(&Hotspot::Preview(anchor));
        self.previews.remove(&anchor).is_some()
    }

    pub fn toast(&self) -> &Toast {
        &self.toast
    }

    pub fn show_toast(&mut self, text: impl Into<String>, severity: Severity) {
        self.toast = Toast {
            text: text.into(),
            severity,
            visible: true,
        };
    }

    pub fn hide_toast(&mut self) {
        self.toast.visible = false;
    }

    pub fn pointer_enter(&mut self, spot: Hotspot) {
        self.pointer.insert(spot);
    }

    pub fn pointer_leave(&mut self, spot: Hotspot) {
        self.pointer.remove(&spot);
    }

    pub fn pointer_inside(&self, spot: Hotspot) -> bool {
        self.pointer.contains(&spot)
    }

    /// Serializable view of everything the controllers may have changed.
    pub fn state(&self) -> PageState {
        PageState {
            nodes: self
                .nodes
                .iter()
                .map(|n| NodeState {
                    id: n.name.clone(),
                    visible: n.visible,
                    text: n.text.clone(),
                    tooltip: n.tooltip.clone(),
                    action: n.data.get("action").cloned(),
                })
                .collect(),
            previews: self
                .previews
                .iter()
                .map(|(anchor, widget)| (self.name(*anchor).to_string(), widget.content.clone()))
                .collect(),
            toast: self.toast.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeState {
    pub id: String,
    pub visible: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    /// Submission target of a form node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageState {
    pub nodes: Vec<NodeState>,
    pub previews: BTreeMap<String, String>,
    pub toast: Toast,
}

/// Shared handle to the page, cloned into every controller and timer task.
///
/// The lock is only ever held for synchronous DOM-like mutations, never across
/// an await point.
#[derive(Debug, Clone)]
pub struct Page(Arc<Mutex<Document>>);

impl Page {
    pub fn new(document: Document) -> Self {
        Self(Arc::new(Mutex::new(document)))
    }

    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        f(&mut self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

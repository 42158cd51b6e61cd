//! Trigger bindings read from the rendered markup.
//!
//! Role markers are CSS classes. A trigger's attached data lives in its data
//! attributes:
//!
//! | attribute | meaning                                                    |
//! |-----------|------------------------------------------------------------|
//! | `href`    | endpoint the trigger talks to (POST action or GET preview) |
//! | `id`      | target entity id                                           |
//! | `pair`    | node id of the complementary trigger (toggles only)       |
//! | `counter` | node id of the counter to refresh (toggles only)          |
//!
//! Page-local roles (`panel-switch`, `delete-btn`) are classified like the
//! others but get no binding; their handlers read the markup directly.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, warn};

use crate::page::{Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Follow,
    Unfollow,
    Collect,
    Uncollect,
    HoverPreview,
    /// Swaps a display block with its edit form
    PanelSwitch,
    /// Opens the delete confirmation for the resource in its `data-href`
    ConfirmDelete,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Follow,
        Role::Unfollow,
        Role::Collect,
        Role::Uncollect,
        Role::HoverPreview,
        Role::PanelSwitch,
        Role::ConfirmDelete,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            Role::Follow => "follow-btn",
            Role::Unfollow => "unfollow-btn",
            Role::Collect => "collect-btn",
            Role::Uncollect => "uncollect-btn",
            Role::HoverPreview => "profile-popover",
            Role::PanelSwitch => "panel-switch",
            Role::ConfirmDelete => "delete-btn",
        }
    }

    /// The role marker carried by `id`, if any.
    pub fn of(doc: &Document, id: NodeId) -> Option<Role> {
        Role::ALL.into_iter().find(|role| doc.has_class(id, role.marker()))
    }

    /// Nearest node at or above `id` carrying a role marker.
    pub fn closest(doc: &Document, id: NodeId) -> Option<(NodeId, Role)> {
        let node = doc.closest(id, |doc, n| Role::of(doc, n).is_some())?;
        Role::of(doc, node).map(|role| (node, role))
    }

    pub fn action(self) -> Option<ActionKind> {
        match self {
            Role::Follow | Role::Unfollow => Some(ActionKind::Follow),
            Role::Collect | Role::Uncollect => Some(ActionKind::Collect),
            Role::HoverPreview | Role::PanelSwitch | Role::ConfirmDelete => None,
        }
    }

    pub fn complement(self) -> Option<Role> {
        match self {
            Role::Follow => Some(Role::Unfollow),
            Role::Unfollow => Some(Role::Follow),
            Role::Collect => Some(Role::Uncollect),
            Role::Uncollect => Some(Role::Collect),
            Role::HoverPreview | Role::PanelSwitch | Role::ConfirmDelete => None,
        }
    }

    /// Whether a successful activation establishes the relationship (`follow`, `collect`)
    /// rather than removing it.
    pub fn establishes(self) -> bool {
        matches!(self, Role::Follow | Role::Collect)
    }

    /// Whether triggers of this role issue requests and so get a [`TriggerBinding`].
    pub fn talks_to_server(self) -> bool {
        !matches!(self, Role::PanelSwitch | Role::ConfirmDelete)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// The relationship a toggle pair represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Follow,
    Collect,
}

impl ActionKind {
    pub fn counter(self) -> CounterKind {
        match self {
            ActionKind::Follow => CounterKind::Followers,
            ActionKind::Collect => CounterKind::Collectors,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Followers,
    Collectors,
}

impl CounterKind {
    pub fn slug(self) -> &'static str {
        match self {
            CounterKind::Followers => "followers",
            CounterKind::Collectors => "collectors",
        }
    }

    /// Conventional id of the node displaying this count, e.g. `followers-count-42`.
    pub fn node_name(self, entity_id: &str) -> String {
        format!("{}-count-{}", self.slug(), entity_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerBinding {
    pub node: NodeId,
    pub role: Role,
    pub endpoint: String,
    pub target: Option<String>,
    pub pair: Option<NodeId>,
    pub counter: Option<NodeId>,
}

/// All triggers on the page, fixed after the page-load scan.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    triggers: BTreeMap<NodeId, TriggerBinding>,
}

impl Bindings {
    pub fn scan(doc: &Document) -> Self {
        let mut triggers = BTreeMap::new();

        for node in doc.ids() {
            let Some(role) = Role::of(doc, node).filter(|role| role.talks_to_server()) else {
                continue;
            };

            let Some(endpoint) = doc.data(node, "href") else {
                warn!(node = doc.name(node), %role, "trigger without endpoint, skipping");
                continue;
            };

            let target = doc.data(node, "id").map(str::to_string);
            let (pair, counter) = match role.action() {
                Some(action) => (
                    resolve_pair(doc, node, role, target.as_deref()),
                    resolve_counter(doc, node, action, target.as_deref()),
                ),
                None => (None, None),
            };

            triggers.insert(
                node,
                TriggerBinding {
                    node,
                    role,
                    endpoint: endpoint.to_string(),
                    target,
                    pair,
                    counter,
                },
            );
        }

        debug!(count = triggers.len(), "scanned trigger bindings");
        Self { triggers }
    }

    pub fn get(&self, node: NodeId) -> Option<&TriggerBinding> {
        self.triggers.get(&node)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TriggerBinding> {
        self.triggers.values()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

/// Explicit `data-pair` reference first, then a sibling with the complementary
/// role and the same target.
fn resolve_pair(doc: &Document, node: NodeId, role: Role, target: Option<&str>) -> Option<NodeId> {
    let complement = role.complement()?;

    if let Some(name) = doc.data(node, "pair") {
        match doc.find(name) {
            Some(pair) if Role::of(doc, pair) == Some(complement) => return Some(pair),
            _ => warn!(node = doc.name(node), pair = name, "pair reference does not name a {} trigger", complement),
        }
    }

    doc.siblings(node)
        .find(|&sibling| Role::of(doc, sibling) == Some(complement) && doc.data(sibling, "id") == target)
}

fn resolve_counter(doc: &Document, node: NodeId, action: ActionKind, target: Option<&str>) -> Option<NodeId> {
    if let Some(name) = doc.data(node, "counter") {
        return doc.find(name);
    }
    target.and_then(|id| doc.find(&action.counter().node_name(id)))
}

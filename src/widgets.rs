//! Page-local widgets that never talk to the server: display blocks that swap
//! with their edit forms, the delete confirmation form, and plain tooltips.

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::dispatch::{EventKind, Handler};
use crate::page::{Document, NodeId, Page};

/// Marker class of the form a delete confirmation submits.
pub const DELETE_FORM_MARKER: &str = "delete-form";

/// `data-toggle` value asking for a tooltip built from `data-title`.
pub const TOOLTIP_TOGGLE: &str = "tooltip";

/// Shows the node named by the trigger's `data-show` and hides the one named by
/// `data-hide`, e.g. the tag list and its edit form.
#[derive(Clone)]
pub struct PanelSwitcher {
    page: Page,
}

impl PanelSwitcher {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Returns whether the trigger named anything to switch.
    pub fn switch(&self, trigger: NodeId) -> bool {
        self.page.update(|doc| {
            let show = named(doc, trigger, "show");
            let hide = named(doc, trigger, "hide");
            if show.is_none() && hide.is_none() {
                warn!(trigger = doc.name(trigger), "panel switch has nothing to switch");
                return false;
            }

            if let Some(hide) = hide {
                doc.set_visible(hide, false);
            }
            if let Some(show) = show {
                doc.set_visible(show, true);
            }
            debug!(trigger = doc.name(trigger), "panels switched");
            true
        })
    }
}

fn named(doc: &Document, trigger: NodeId, key: &str) -> Option<NodeId> {
    let name = doc.data(trigger, key)?;
    let node = doc.find(name);
    if node.is_none() {
        warn!(trigger = doc.name(trigger), key, name, "panel switch names an unknown node");
    }
    node
}

impl Handler for PanelSwitcher {
    fn handle(&self, kind: EventKind, trigger: NodeId) -> Option<JoinHandle<()>> {
        if kind == EventKind::Click {
            self.switch(trigger);
        }
        None
    }
}

/// Points the delete confirmation form at the resource its opener deletes.
///
/// The form is the one named by the opener's `data-form`, else the page's
/// `delete-form`. Submitting it is left to the page.
#[derive(Clone)]
pub struct DeleteConfirmation {
    page: Page,
}

impl DeleteConfirmation {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// Returns the form that now targets the opener's `data-href`.
    pub fn open(&self, opener: NodeId) -> Option<NodeId> {
        self.page.update(|doc| {
            let Some(action) = doc.data(opener, "href").map(str::to_string) else {
                warn!(opener = doc.name(opener), "delete opener without target");
                return None;
            };
            let form = doc
                .data(opener, "form")
                .and_then(|name| doc.find(name))
                .or_else(|| doc.ids().find(|&n| doc.has_class(n, DELETE_FORM_MARKER)));
            let Some(form) = form else {
                warn!(opener = doc.name(opener), "no delete form on this page");
                return None;
            };

            debug!(form = doc.name(form), %action, "delete form bound");
            doc.set_data(form, "action", action);
            Some(form)
        })
    }
}

impl Handler for DeleteConfirmation {
    fn handle(&self, kind: EventKind, trigger: NodeId) -> Option<JoinHandle<()>> {
        if kind == EventKind::Click {
            self.open(trigger);
        }
        None
    }
}

/// Attaches a tooltip to every `data-toggle="tooltip"` node with a `data-title`.
///
/// Nodes that already carry a tooltip keep it. Returns how many were attached.
pub fn attach_tooltips(page: &Page) -> usize {
    page.update(|doc| {
        let nodes: Vec<NodeId> = doc
            .ids()
            .filter(|&n| doc.data(n, "toggle") == Some(TOOLTIP_TOGGLE) && doc.tooltip(n).is_none())
            .collect();

        let mut attached = 0;
        for node in nodes {
            let Some(title) = doc.data(node, "title").map(str::to_string) else {
                debug!(node = doc.name(node), "tooltip toggle without title");
                continue;
            };
            doc.set_tooltip(node, title);
            attached += 1;
        }
        attached
    })
}

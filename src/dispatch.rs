//! Delegated event dispatch.
//!
//! Every gesture on the page goes through one [`Dispatcher`]. It classifies the
//! event target by the nearest role marker and hands it to the handler that was
//! registered for that role at initialization.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::binding::Role;
use crate::page::{NodeId, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Click,
    /// Pointer entered the target node
    PointerEnter,
    /// Pointer left the target node
    PointerLeave,
    /// Pointer entered the preview widget anchored to the target node
    PreviewEnter,
    /// Pointer left the preview widget anchored to the target node
    PreviewLeave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEvent {
    pub kind: EventKind,
    pub target: NodeId,
}

impl PageEvent {
    pub fn new(kind: EventKind, target: NodeId) -> Self {
        Self { kind, target }
    }
}

pub trait Handler: Send + Sync {
    /// Reacts to `kind` on `trigger`, the node carrying the role marker.
    ///
    /// Returns the spawned task when the reaction involves a network round trip,
    /// so callers can wait for it to settle.
    fn handle(&self, kind: EventKind, trigger: NodeId) -> Option<JoinHandle<()>>;
}

pub struct Dispatcher {
    page: Page,
    table: HashMap<Role, Arc<dyn Handler>>,
}

impl Dispatcher {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            table: HashMap::new(),
        }
    }

    pub fn register(&mut self, role: Role, handler: Arc<dyn Handler>) {
        self.table.insert(role, handler);
    }

    pub fn dispatch(&self, event: PageEvent) -> Option<JoinHandle<()>> {
        let Some((trigger, role)) = self.page.read(|doc| Role::closest(doc, event.target)) else {
            trace!(?event, "event outside any trigger");
            return None;
        };

        match self.table.get(&role) {
            Some(handler) => handler.handle(event.kind, trigger),
            None => {
                trace!(%role, "no handler registered");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::page::tests::spec;
    use crate::page::Document;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(EventKind, NodeId)>>);

    impl Handler for Recorder {
        fn handle(&self, kind: EventKind, trigger: NodeId) -> Option<JoinHandle<()>> {
            self.0.lock().unwrap().push((kind, trigger));
            None
        }
    }

    #[test]
    fn routes_by_nearest_role() {
        let page = Page::new(
            Document::from_nodes(vec![
                spec("body", None, &[], &[]),
                spec("follow", Some("body"), &["follow-btn"], &[("href", "/f")]),
                spec("label", Some("follow"), &[], &[]),
                spec("avatar", Some("body"), &["profile-popover"], &[("href", "/p")]),
            ])
            .unwrap(),
        );
        let (body, follow, label, avatar) = page.read(|d| {
            (
                d.find("body").unwrap(),
                d.find("follow").unwrap(),
                d.find("label").unwrap(),
                d.find("avatar").unwrap(),
            )
        });

        let toggles = Arc::new(Recorder::default());
        let mut dispatcher = Dispatcher::new(page);
        dispatcher.register(Role::Follow, toggles.clone());

        dispatcher.dispatch(PageEvent::new(EventKind::Click, label));
        dispatcher.dispatch(PageEvent::new(EventKind::Click, body));
        dispatcher.dispatch(PageEvent::new(EventKind::PointerEnter, avatar));

        assert_eq!(*toggles.0.lock().unwrap(), vec![(EventKind::Click, follow)]);
    }
}

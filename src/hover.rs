//! Hover-triggered profile previews.
//!
//! Resting on a trigger for the debounce delay fetches the preview and shows it
//! in a widget anchored to the trigger. Leaving the trigger or the widget arms
//! a short linger timer; the widget is only destroyed if, when it fires, the
//! pointer is in neither.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::binding::{Bindings, Role};
use crate::config::Settings;
use crate::dispatch::{EventKind, Handler};
use crate::notifier::Notifier;
use crate::page::{Hotspot, NodeId, Page, Severity};
use crate::timer::TimerSlot;
use crate::transport::Client;

/// Interaction state of one anchor.
///
/// Holds at most one debounce timer and one linger timer; the preview widget
/// itself lives on the page, at most one per anchor.
#[derive(Debug, Default)]
struct HoverSession {
    /// Bumped whenever a debounce timer is armed, so a stale timer can tell it lost
    generation: u64,
    pending: TimerSlot,
    linger: TimerSlot,
    in_flight: bool,
}

#[derive(Clone)]
pub struct HoverPreviewController {
    page: Page,
    client: Client,
    notifier: Notifier,
    settings: Arc<Settings>,
    bindings: Arc<Bindings>,
    sessions: Arc<Mutex<HashMap<NodeId, HoverSession>>>,
}

impl HoverPreviewController {
    pub fn new(page: Page, client: Client, notifier: Notifier, settings: Arc<Settings>, bindings: Arc<Bindings>) -> Self {
        Self {
            page,
            client,
            notifier,
            settings,
            bindings,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<NodeId, HoverSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn endpoint(&self, anchor: NodeId) -> Option<&str> {
        self.bindings
            .get(anchor)
            .filter(|b| b.role == Role::HoverPreview)
            .map(|b| b.endpoint.as_str())
    }

    pub fn enter(&self, anchor: NodeId) {
        if self.endpoint(anchor).is_none() {
            return;
        }
        self.page.update(|doc| doc.pointer_enter(Hotspot::Node(anchor)));

        let mut sessions = self.sessions();
        let session = sessions.entry(anchor).or_default();
        session.linger.clear();

        let showing = self.page.read(|doc| doc.preview(anchor).is_some());
        if session.pending.is_armed() || session.in_flight || showing {
            return;
        }

        session.generation += 1;
        let generation = session.generation;
        let delay = self.settings.hover_delay();
        let this = self.clone();
        session.pending.spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire(anchor, generation).await;
        });
        debug!(?anchor, generation, "hover debounce armed");
    }

    pub fn exit(&self, anchor: NodeId) {
        self.page.update(|doc| doc.pointer_leave(Hotspot::Node(anchor)));

        if let Some(session) = self.sessions().get_mut(&anchor) {
            self.end_hover(session, anchor);
        }
    }

    /// Cancels a debounce that has not reached its request yet, or starts the
    /// linger countdown for a preview that is (or is about to be) shown.
    fn end_hover(&self, session: &mut HoverSession, anchor: NodeId) {
        if session.pending.clear() {
            // a timer that already woke up may still be waiting for the lock
            session.generation += 1;
            debug!(?anchor, "hover ended before debounce, no request");
            return;
        }
        self.arm_linger(session, anchor);
    }

    pub fn enter_preview(&self, anchor: NodeId) {
        self.page.update(|doc| doc.pointer_enter(Hotspot::Preview(anchor)));
        if let Some(session) = self.sessions().get_mut(&anchor) {
            session.linger.clear();
        }
    }

    pub fn exit_preview(&self, anchor: NodeId) {
        self.page.update(|doc| doc.pointer_leave(Hotspot::Preview(anchor)));
        if let Some(session) = self.sessions().get_mut(&anchor) {
            self.arm_linger(session, anchor);
        }
    }

    fn arm_linger(&self, session: &mut HoverSession, anchor: NodeId) {
        let page = self.page.clone();
        session.linger.arm(self.settings.linger(), move || {
            page.update(|doc| {
                let inside = doc.pointer_inside(Hotspot::Node(anchor)) || doc.pointer_inside(Hotspot::Preview(anchor));
                if !inside && doc.remove_preview(anchor) {
                    debug!(?anchor, "preview hidden");
                }
            });
        });
    }

    #[instrument(skip(self))]
    async fn fire(&self, anchor: NodeId, generation: u64) {
        let Some(url) = self.endpoint(anchor).map(str::to_string) else {
            return;
        };

        {
            let mut sessions = self.sessions();
            let Some(session) = sessions.get_mut(&anchor) else {
                return;
            };
            if session.generation != generation || session.in_flight {
                return;
            }
            // from here on a hover-exit must not cancel us
            session.pending.release();
            session.in_flight = true;
        }
        let in_flight = InFlight {
            controller: self,
            anchor,
            settled: false,
        };

        let result = self.client.fetch_html(&url).await;

        let mut sessions = self.sessions();
        let Some(session) = sessions.get_mut(&anchor) else {
            return;
        };
        in_flight.settle(session);

        match result {
            Ok(content) => {
                let outside = self.page.update(|doc| {
                    doc.show_preview(anchor, content);
                    !doc.pointer_inside(Hotspot::Node(anchor)) && !doc.pointer_inside(Hotspot::Preview(anchor))
                });
                debug!(?anchor, "preview shown");
                // pointer left while we were fetching
                if outside {
                    self.arm_linger(session, anchor);
                }
            }
            Err(e) => {
                warn!(%e, "preview fetch failed");
                self.notifier.notify(e.user_message(&self.settings.generic_error), Severity::Error);
            }
        }
    }
}

/// Marks the anchor's fetch as finished, even when the fetching task is
/// dropped before the response arrives.
struct InFlight<'a> {
    controller: &'a HoverPreviewController,
    anchor: NodeId,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, session: &mut HoverSession) {
        session.in_flight = false;
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            if let Some(session) = self.controller.sessions().get_mut(&self.anchor) {
                session.in_flight = false;
            }
        }
    }
}

impl Handler for HoverPreviewController {
    fn handle(&self, kind: EventKind, trigger: NodeId) -> Option<JoinHandle<()>> {
        match kind {
            EventKind::PointerEnter => self.enter(trigger),
            EventKind::PointerLeave => self.exit(trigger),
            EventKind::PreviewEnter => self.enter_preview(trigger),
            EventKind::PreviewLeave => self.exit_preview(trigger),
            EventKind::Click => {}
        }
        None
    }
}

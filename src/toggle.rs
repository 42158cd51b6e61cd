//! Follow/unfollow and collect/uncollect.
//!
//! Each relationship is shown as a pair of complementary triggers, exactly one
//! of which is visible. The visible one is derived from an explicit
//! [`RelationState`] per pair, which only changes once the server has
//! confirmed an action.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::binding::{Bindings, Role, TriggerBinding};
use crate::config::Settings;
use crate::counter::CounterRefresher;
use crate::dispatch::{EventKind, Handler};
use crate::notifier::Notifier;
use crate::page::{Document, NodeId, Page, Severity};
use crate::transport::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationState {
    Inactive,
    Active,
}

#[derive(Debug, Clone)]
pub struct TogglePair {
    /// Shown while inactive (`follow`, `collect`)
    pub establish: NodeId,
    /// Shown while active (`unfollow`, `uncollect`)
    pub remove: NodeId,
    state: RelationState,
}

impl TogglePair {
    /// Reads the initial state from markup, normalising a pair that shows both
    /// or neither trigger.
    pub fn from_markup(doc: &mut Document, establish: NodeId, remove: NodeId) -> Self {
        let state = if doc.is_visible(establish) || !doc.is_visible(remove) {
            RelationState::Inactive
        } else {
            RelationState::Active
        };

        let pair = Self { establish, remove, state };
        if !pair.is_consistent(doc) {
            warn!(
                establish = doc.name(establish),
                remove = doc.name(remove),
                ?state,
                "toggle pair visibility inconsistent, normalising"
            );
            pair.render(doc);
        }
        pair
    }

    pub fn state(&self) -> RelationState {
        self.state
    }

    /// Exactly one of the two triggers is visible.
    pub fn is_consistent(&self, doc: &Document) -> bool {
        doc.is_visible(self.establish) != doc.is_visible(self.remove)
    }

    fn render(&self, doc: &mut Document) {
        doc.set_visible(self.establish, self.state == RelationState::Inactive);
        doc.set_visible(self.remove, self.state == RelationState::Active);
    }

    /// Moves to `to` and mirrors it onto the page. Returns whether the state changed.
    pub fn transition(&mut self, doc: &mut Document, to: RelationState) -> bool {
        let changed = self.state != to;
        self.state = to;
        self.render(doc);
        changed
    }
}

#[derive(Clone)]
pub struct ToggleActionController {
    page: Page,
    client: Client,
    notifier: Notifier,
    counters: CounterRefresher,
    settings: Arc<Settings>,
    bindings: Arc<Bindings>,
    pairs: Arc<Mutex<Vec<TogglePair>>>,
    pair_of: Arc<HashMap<NodeId, usize>>,
}

impl ToggleActionController {
    pub fn new(
        page: Page,
        client: Client,
        notifier: Notifier,
        counters: CounterRefresher,
        settings: Arc<Settings>,
        bindings: Arc<Bindings>,
    ) -> Self {
        let mut pairs = Vec::new();
        let mut pair_of = HashMap::new();

        page.update(|doc| {
            for binding in bindings.iter().filter(|b| b.role.action().is_some()) {
                if pair_of.contains_key(&binding.node) {
                    continue;
                }
                let Some(other) = binding.pair else {
                    warn!(node = doc.name(binding.node), role = %binding.role, "toggle trigger has no counterpart");
                    continue;
                };
                if pair_of.contains_key(&other) {
                    warn!(
                        node = doc.name(binding.node),
                        counterpart = doc.name(other),
                        "counterpart already paired with another trigger, ignoring"
                    );
                    continue;
                }

                let (establish, remove) = if binding.role.establishes() {
                    (binding.node, other)
                } else {
                    (other, binding.node)
                };
                pair_of.insert(establish, pairs.len());
                pair_of.insert(remove, pairs.len());
                pairs.push(TogglePair::from_markup(doc, establish, remove));
            }
        });
        debug!(pairs = pairs.len(), "toggle pairs bound");

        Self {
            page,
            client,
            notifier,
            counters,
            settings,
            bindings,
            pairs: Arc::new(Mutex::new(pairs)),
            pair_of: Arc::new(pair_of),
        }
    }

    /// Current state of the pair `node` belongs to.
    pub fn state_of(&self, node: NodeId) -> Option<RelationState> {
        let idx = *self.pair_of.get(&node)?;
        Some(self.pairs.lock().unwrap_or_else(PoisonError::into_inner)[idx].state())
    }

    /// Posts the action of the trigger at or above `node`.
    ///
    /// Every call issues its own request; nothing is disabled while one is in
    /// flight. The page only changes after the server confirms.
    pub fn activate(&self, node: NodeId) -> Option<JoinHandle<()>> {
        let binding = self
            .page
            .read(|doc| Role::closest(doc, node))
            .and_then(|(trigger, _)| self.bindings.get(trigger))
            .filter(|binding| binding.role.action().is_some())
            .cloned()?;

        let this = self.clone();
        Some(tokio::spawn(async move { this.run(binding).await }))
    }

    #[instrument(skip_all, fields(role = %binding.role, endpoint = %binding.endpoint))]
    async fn run(&self, binding: TriggerBinding) {
        let message = match self.client.post_action(&binding.endpoint).await {
            Ok(message) => message,
            Err(e) => {
                warn!(%e, "toggle rejected");
                self.notifier.notify(e.user_message(&self.settings.generic_error), Severity::Error);
                return;
            }
        };

        let to = if binding.role.establishes() {
            RelationState::Active
        } else {
            RelationState::Inactive
        };
        self.apply(binding.node, to);
        self.notifier.info(message);

        if let (Some(action), Some(target)) = (binding.role.action(), binding.target.as_deref()) {
            let kind = action.counter();
            match binding.counter {
                Some(counter) => self.counters.refresh_node(target, kind, counter).await,
                None => self.counters.refresh(target, kind).await,
            };
        }
    }

    /// Applies a confirmed state to the pair of `node`. Applying the same state
    /// again is a no-op.
    pub fn apply(&self, node: NodeId, to: RelationState) -> bool {
        let Some(&idx) = self.pair_of.get(&node) else {
            return false;
        };

        let mut pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
        let pair = &mut pairs[idx];
        let changed = self.page.update(|doc| pair.transition(doc, to));
        info!(?to, changed, "toggle confirmed");
        changed
    }
}

impl Handler for ToggleActionController {
    fn handle(&self, kind: EventKind, trigger: NodeId) -> Option<JoinHandle<()>> {
        match kind {
            EventKind::Click => self.activate(trigger),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::context::PageContext;
    use crate::page::tests::spec;
    use crate::transport::fake::FakeTransport;

    struct Fixture {
        page: Page,
        controller: ToggleActionController,
        follow: NodeId,
        unfollow: NodeId,
        icon: NodeId,
        counter: NodeId,
    }

    fn fixture(transport: &FakeTransport) -> Fixture {
        let mut unfollow = spec("unfollow", Some("actions"), &["unfollow-btn"], &[("id", "42"), ("href", "/ajax/unfollow/alice")]);
        unfollow.visible = false;
        let doc = Document::from_nodes(vec![
            spec("actions", None, &[], &[]),
            spec("follow", Some("actions"), &["follow-btn"], &[("id", "42"), ("href", "/ajax/follow/alice")]),
            spec("icon", Some("follow"), &[], &[]),
            unfollow,
            spec("followers-count-42", None, &[], &[]),
        ])
        .unwrap();
        let page = Page::new(doc);

        let settings = Arc::new(Settings::default());
        let context = Arc::new(PageContext {
            authenticated: true,
            csrf_token: "tok".into(),
        });
        let client = Client::new(Arc::new(transport.clone()), context, "X-CSRF-Token");
        let notifier = Notifier::new(page.clone(), Duration::from_secs(3));
        let counters = CounterRefresher::new(page.clone(), client.clone(), notifier.clone(), settings.clone());
        let bindings = Arc::new(page.read(Bindings::scan));
        let controller = ToggleActionController::new(page.clone(), client, notifier, counters, settings, bindings);

        let (follow, unfollow, icon, counter) = page.read(|d| {
            (
                d.find("follow").unwrap(),
                d.find("unfollow").unwrap(),
                d.find("icon").unwrap(),
                d.find("followers-count-42").unwrap(),
            )
        });
        Fixture {
            page,
            controller,
            follow,
            unfollow,
            icon,
            counter,
        }
    }

    fn visible(page: &Page, node: NodeId) -> bool {
        page.read(|d| d.is_visible(node))
    }

    #[tokio::test]
    async fn follow_success_flips_pair_and_refreshes_counter() {
        let transport = FakeTransport::new();
        transport.respond("/ajax/follow/alice", 200, r#"{"message":"Followed."}"#);
        transport.respond("/ajax/followers-count/42", 200, r#"{"count":8}"#);
        let f = fixture(&transport);

        // clicked on the nested icon
        f.controller.activate(f.icon).unwrap().await.unwrap();

        assert!(!visible(&f.page, f.follow));
        assert!(visible(&f.page, f.unfollow));
        assert_eq!(f.controller.state_of(f.follow), Some(RelationState::Active));
        assert_eq!(f.page.read(|d| d.text(f.counter).to_string()), "8");
        assert_eq!(f.page.read(|d| d.toast().text.clone()), "Followed.");
        assert_eq!(transport.count("/ajax/followers-count/42"), 1);
    }

    #[tokio::test]
    async fn rejected_toggle_changes_nothing() {
        let transport = FakeTransport::new();
        transport.respond("/ajax/follow/alice", 400, r#"{"message":"Confirm account required."}"#);
        let f = fixture(&transport);

        f.controller.activate(f.follow).unwrap().await.unwrap();

        assert!(visible(&f.page, f.follow));
        assert!(!visible(&f.page, f.unfollow));
        assert_eq!(f.page.read(|d| d.toast().text.clone()), "Confirm account required.");
        assert_eq!(transport.count("/ajax/followers-count/42"), 0);
    }

    #[tokio::test]
    async fn success_with_garbage_body_is_a_failure() {
        let transport = FakeTransport::new();
        transport.respond("/ajax/follow/alice", 200, "<html>login</html>");
        let f = fixture(&transport);

        f.controller.activate(f.follow).unwrap().await.unwrap();

        assert!(visible(&f.page, f.follow));
        assert_eq!(f.page.read(|d| d.toast().text.clone()), "Server error, please try again later.");
    }

    #[tokio::test]
    async fn duplicate_confirmation_is_idempotent() {
        let transport = FakeTransport::new();
        let f = fixture(&transport);

        assert!(f.controller.apply(f.follow, RelationState::Active));
        assert!(!f.controller.apply(f.follow, RelationState::Active));

        f.page.read(|d| {
            assert!(!d.is_visible(f.follow));
            assert!(d.is_visible(f.unfollow));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn last_response_wins_when_racing() {
        let transport = FakeTransport::new();
        transport.respond_after("/ajax/follow/alice", Duration::from_millis(300), 200, r#"{"message":"Followed."}"#);
        transport.respond_after("/ajax/unfollow/alice", Duration::from_millis(100), 200, r#"{"message":"Unfollowed."}"#);
        transport.respond("/ajax/followers-count/42", 200, r#"{"count":1}"#);
        let f = fixture(&transport);

        let slow = f.controller.activate(f.follow).unwrap();
        let fast = f.controller.activate(f.unfollow).unwrap();
        fast.await.unwrap();
        assert_eq!(f.controller.state_of(f.follow), Some(RelationState::Inactive));
        slow.await.unwrap();

        assert_eq!(f.controller.state_of(f.follow), Some(RelationState::Active));
        f.page.read(|d| {
            assert!(!d.is_visible(f.follow));
            assert!(d.is_visible(f.unfollow));
        });
        assert_eq!(f.page.read(|d| d.text(f.counter).to_string()), "1");
    }

    #[test]
    fn inconsistent_markup_is_normalised() {
        let mut doc = Document::from_nodes(vec![spec("a", None, &[], &[]), spec("b", None, &[], &[])]).unwrap();
        let (a, b) = (doc.find("a").unwrap(), doc.find("b").unwrap());

        let pair = TogglePair::from_markup(&mut doc, a, b);
        assert_eq!(pair.state(), RelationState::Inactive);
        assert!(pair.is_consistent(&doc));

        doc.set_visible(a, false);
        doc.set_visible(b, false);
        let pair = TogglePair::from_markup(&mut doc, a, b);
        assert_eq!(pair.state(), RelationState::Inactive);
        assert!(doc.is_visible(a));
    }

    #[test]
    fn shared_counterpart_joins_only_one_pair() {
        let transport = FakeTransport::new();
        let mut unfollow = spec("unfollow", Some("card"), &["unfollow-btn"], &[("id", "42"), ("href", "/ajax/unfollow/alice")]);
        unfollow.visible = false;
        let doc = Document::from_nodes(vec![
            spec("card", None, &[], &[]),
            spec("follow", Some("card"), &["follow-btn"], &[("id", "42"), ("href", "/ajax/follow/alice")]),
            spec("follow-again", Some("card"), &["follow-btn"], &[("id", "42"), ("href", "/ajax/follow/alice")]),
            unfollow,
        ])
        .unwrap();
        let page = Page::new(doc);
        let settings = Arc::new(Settings::default());
        let context = Arc::new(PageContext {
            authenticated: true,
            csrf_token: String::new(),
        });
        let client = Client::new(Arc::new(transport), context, "X-CSRF-Token");
        let notifier = Notifier::new(page.clone(), Duration::from_secs(3));
        let counters = CounterRefresher::new(page.clone(), client.clone(), notifier.clone(), settings.clone());
        let bindings = Arc::new(page.read(Bindings::scan));
        let controller = ToggleActionController::new(page.clone(), client, notifier, counters, settings, bindings);

        let (follow, again, unfollow) = page.read(|d| {
            (
                d.find("follow").unwrap(),
                d.find("follow-again").unwrap(),
                d.find("unfollow").unwrap(),
            )
        });
        assert_eq!(controller.state_of(again), None);
        assert_eq!(controller.state_of(unfollow), Some(RelationState::Inactive));

        assert!(controller.apply(unfollow, RelationState::Active));
        page.read(|d| {
            assert!(!d.is_visible(follow));
            assert!(d.is_visible(unfollow));
            assert!(d.is_visible(again));
        });
    }
}

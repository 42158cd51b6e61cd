use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::binding::CounterKind;
use crate::config::Settings;
use crate::notifier::Notifier;
use crate::page::{NodeId, Page};
use crate::transport::Client;

/// Re-reads a count from the server and displays it verbatim.
///
/// Counts are never adjusted locally, so racing toggles always converge on the
/// server's value.
#[derive(Clone)]
pub struct CounterRefresher {
    page: Page,
    client: Client,
    notifier: Notifier,
    settings: Arc<Settings>,
}

impl CounterRefresher {
    pub fn new(page: Page, client: Client, notifier: Notifier, settings: Arc<Settings>) -> Self {
        Self {
            page,
            client,
            notifier,
            settings,
        }
    }

    /// The counter node's own `data-href`, else the settings template for `kind`.
    fn endpoint(&self, entity_id: &str, kind: CounterKind, node: NodeId) -> String {
        if let Some(href) = self.page.read(|doc| doc.data(node, "href").map(str::to_string)) {
            return href;
        }
        let template = match kind {
            CounterKind::Followers => &self.settings.followers_count_url,
            CounterKind::Collectors => &self.settings.collectors_count_url,
        };
        template.replace("{id}", entity_id)
    }

    /// Refreshes the conventionally named counter node (`<kind>-count-<id>`).
    pub async fn refresh(&self, entity_id: &str, kind: CounterKind) -> Option<u64> {
        let name = kind.node_name(entity_id);
        match self.page.read(|doc| doc.find(&name)) {
            Some(node) => self.refresh_node(entity_id, kind, node).await,
            None => {
                debug!(node = %name, "no counter on this page");
                None
            }
        }
    }

    #[instrument(skip(self, node))]
    pub async fn refresh_node(&self, entity_id: &str, kind: CounterKind, node: NodeId) -> Option<u64> {
        match self.client.fetch_count(&self.endpoint(entity_id, kind, node)).await {
            Ok(count) => {
                self.page.update(|doc| doc.set_text(node, count.to_string()));
                Some(count)
            }
            Err(e) => {
                warn!(%e, "counter refresh failed");
                self.notifier.error(e.user_message(&self.settings.generic_error));
                None
            }
        }
    }
}

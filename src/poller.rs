use std::sync::Arc;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::Settings;
use crate::context::PageContext;
use crate::notifier::Notifier;
use crate::page::{NodeId, Page, Severity};
use crate::timer::TimerSlot;
use crate::transport::Client;

/// Id, or marker class, of the unread-notifications badge.
pub const INDICATOR_MARKER: &str = "notification-badge";

/// Keeps the poll loop alive; dropping it stops polling.
#[derive(Debug)]
pub struct PollHandle {
    _task: TimerSlot,
}

/// Periodically refreshes the unread-notifications badge.
#[derive(Clone)]
pub struct NotificationPoller {
    page: Page,
    client: Client,
    notifier: Notifier,
    settings: Arc<Settings>,
    indicator: NodeId,
    endpoint: String,
}

impl NotificationPoller {
    /// Starts polling if the viewer is logged in and the page has a badge with a
    /// count endpoint. Otherwise no timer is created at all.
    pub fn start(
        context: &PageContext,
        page: Page,
        client: Client,
        notifier: Notifier,
        settings: Arc<Settings>,
    ) -> Option<PollHandle> {
        if !context.authenticated {
            debug!("anonymous viewer, not polling");
            return None;
        }

        let (indicator, endpoint) = page.read(|doc| {
            let indicator = doc
                .find(INDICATOR_MARKER)
                .or_else(|| doc.ids().find(|&n| doc.has_class(n, INDICATOR_MARKER)))?;
            let endpoint = doc.data(indicator, "href")?.to_string();
            Some((indicator, endpoint))
        })?;

        let poller = Self {
            page,
            client,
            notifier,
            settings,
            indicator,
            endpoint,
        };

        let period = poller.settings.poll_interval();
        info!(?period, "polling unread notifications");

        let mut task = TimerSlot::new();
        task.spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                poller.poll_once().await;
            }
        });

        Some(PollHandle { _task: task })
    }

    /// One poll. Failures are reported and otherwise ignored; the next tick
    /// polls again regardless.
    #[instrument(skip_all)]
    pub async fn poll_once(&self) {
        match self.client.fetch_count(&self.endpoint).await {
            Ok(count) => self.page.update(|doc| {
                if count == 0 {
                    doc.set_visible(self.indicator, false);
                } else {
                    doc.set_text(self.indicator, count.to_string());
                    doc.set_visible(self.indicator, true);
                }
            }),
            Err(e) => {
                warn!(%e, "unread count poll failed");
                self.notifier.notify(e.user_message(&self.settings.generic_error), Severity::Error);
            }
        }
    }
}

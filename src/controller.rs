//! Page initialization: wires every controller to one page.

use std::sync::Arc;

use chrono::{Local, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::binding::{Bindings, Role};
use crate::config::Settings;
use crate::context::PageContext;
use crate::counter::CounterRefresher;
use crate::dispatch::{Dispatcher, PageEvent};
use crate::hover::HoverPreviewController;
use crate::notifier::Notifier;
use crate::page::{Document, Page, PageError, PageSnapshot};
use crate::poller::{NotificationPoller, PollHandle};
use crate::timestamp::TimestampRenderer;
use crate::toggle::ToggleActionController;
use crate::transport::{Client, Transport};
use crate::widgets::{self, DeleteConfirmation, PanelSwitcher};

/// The interaction layer of one rendered page.
///
/// Must be created inside a tokio runtime. Dropping it stops the poller.
pub struct Interactions {
    page: Page,
    toggles: ToggleActionController,
    dispatcher: Dispatcher,
    _poller: Option<PollHandle>,
}

impl Interactions {
    /// Initializes against the viewer's local time zone and the current time.
    pub fn init(snapshot: PageSnapshot, settings: Settings, transport: Arc<dyn Transport>) -> Result<Self, PageError> {
        Self::init_with(snapshot, settings, transport, TimestampRenderer::new(Local, Utc::now()))
    }

    pub fn init_with<Tz>(
        snapshot: PageSnapshot,
        settings: Settings,
        transport: Arc<dyn Transport>,
        timestamps: TimestampRenderer<Tz>,
    ) -> Result<Self, PageError>
    where
        Tz: chrono::TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let context = Arc::new(PageContext::from_snapshot(&snapshot));
        let settings = Arc::new(settings);
        let page = Page::new(Document::from_nodes(snapshot.nodes)?);

        let client = Client::new(transport, context.clone(), settings.csrf_header.clone());
        let notifier = Notifier::new(page.clone(), settings.toast_duration());
        let bindings = Arc::new(page.read(Bindings::scan));

        timestamps.render(&page);
        let tooltips = widgets::attach_tooltips(&page);
        if bindings.is_empty() {
            debug!("no server-backed triggers on this page");
        }

        let counters = CounterRefresher::new(page.clone(), client.clone(), notifier.clone(), settings.clone());
        let toggles = ToggleActionController::new(
            page.clone(),
            client.clone(),
            notifier.clone(),
            counters,
            settings.clone(),
            bindings.clone(),
        );
        let hover = Arc::new(HoverPreviewController::new(
            page.clone(),
            client.clone(),
            notifier.clone(),
            settings.clone(),
            bindings.clone(),
        ));

        let mut dispatcher = Dispatcher::new(page.clone());
        let toggle_handler = Arc::new(toggles.clone());
        for role in [Role::Follow, Role::Unfollow, Role::Collect, Role::Uncollect] {
            dispatcher.register(role, toggle_handler.clone());
        }
        dispatcher.register(Role::HoverPreview, hover);
        dispatcher.register(Role::PanelSwitch, Arc::new(PanelSwitcher::new(page.clone())));
        dispatcher.register(Role::ConfirmDelete, Arc::new(DeleteConfirmation::new(page.clone())));

        let poller = NotificationPoller::start(&context, page.clone(), client, notifier, settings);

        info!(
            triggers = bindings.len(),
            tooltips,
            authenticated = context.authenticated,
            polling = poller.is_some(),
            "page interactions ready"
        );

        Ok(Self {
            page,
            toggles,
            dispatcher,
            _poller: poller,
        })
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn toggles(&self) -> &ToggleActionController {
        &self.toggles
    }

    /// Entry point for every gesture on the page.
    pub fn dispatch(&self, event: PageEvent) -> Option<JoinHandle<()>> {
        self.dispatcher.dispatch(event)
    }
}

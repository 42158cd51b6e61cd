//! The single transient status message of the page.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::page::{Page, Severity};
use crate::timer::TimerSlot;

/// Shows toasts; a newer message pre-empts the current one and its dismiss timer.
#[derive(Clone)]
pub struct Notifier {
    page: Page,
    duration: Duration,
    dismiss: Arc<Mutex<TimerSlot>>,
    generation: Arc<AtomicU64>,
}

impl Notifier {
    pub fn new(page: Page, duration: Duration) -> Self {
        Self {
            page,
            duration,
            dismiss: Arc::new(Mutex::new(TimerSlot::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn notify(&self, text: impl Into<String>, severity: Severity) {
        let text = text.into();
        debug!(%severity, %text, "toast");

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.page.update(|doc| doc.show_toast(text, severity));

        let page = self.page.clone();
        let current = self.generation.clone();
        self.dismiss
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .arm(self.duration, move || {
                // a superseding message owns the toast now
                if current.load(Ordering::SeqCst) == generation {
                    page.update(|doc| doc.hide_toast());
                }
            });
    }

    pub fn info(&self, text: impl Into<String>) {
        self.notify(text, Severity::Info);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.notify(text, Severity::Error);
    }
}

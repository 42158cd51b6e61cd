//! Client-side interaction layer for a photo sharing site.
//!
//! Hover previews, follow/collect toggles with live counters, unread
//! notification polling, local timestamp rendering and a few page-local
//! widgets, driven against a rendered page snapshot.

pub mod binding;
pub mod config;
pub mod context;
pub mod controller;
pub mod counter;
pub mod dispatch;
pub mod error;
pub mod hover;
pub mod notifier;
pub mod page;
pub mod poller;
pub mod timer;
pub mod timestamp;
pub mod toggle;
pub mod transport;
pub mod widgets;

pub use config::Settings;
pub use controller::Interactions;
pub use dispatch::{EventKind, PageEvent};
pub use error::RequestError;
pub use page::{Page, PageSnapshot, Severity};
pub use transport::{HttpTransport, Transport};

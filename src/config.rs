//! Tunable settings for the interaction controllers.
//!
//! Settings are optionally loaded from a JSON file. Every field has a default,
//! so a partial (or empty) file is valid.

use std::path::Path;
use std::time::Duration;

use tracing::info;

/// Timings, endpoint templates and fallback texts shared by all controllers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How long a pointer has to rest on a preview trigger before the preview is fetched
    pub hover_delay_ms: u64,
    /// Grace period after leaving a trigger or preview before the preview is hidden
    pub linger_ms: u64,
    /// How long a toast stays visible unless superseded
    pub toast_ms: u64,
    /// Interval between unread-count polls
    pub poll_interval_ms: u64,
    /// Count endpoint for followers, `{id}` is replaced with the entity id
    pub followers_count_url: String,
    /// Count endpoint for collectors, `{id}` is replaced with the entity id
    pub collectors_count_url: String,
    /// Shown whenever a failure carries no message of its own
    pub generic_error: String,
    /// Header carrying the anti-forgery token on mutating requests
    pub csrf_header: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hover_delay_ms: 500,
            linger_ms: 200,
            toast_ms: 3000,
            poll_interval_ms: 30_000,
            followers_count_url: "/ajax/followers-count/{id}".to_string(),
            collectors_count_url: "/ajax/collectors-count/{id}".to_string(),
            generic_error: "Server error, please try again later.".to_string(),
            csrf_header: "X-CSRF-Token".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&raw)?;
        info!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn hover_delay(&self) -> Duration {
        Duration::from_millis(self.hover_delay_ms)
    }

    pub fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("could not read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

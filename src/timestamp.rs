//! Renders embedded UTC timestamps in the viewer's time zone.
//!
//! Marked nodes carry `class="timestamp"` and `data-timestamp` (RFC 3339, or a
//! naive `YYYY-MM-DDTHH:MM:SS` taken as UTC). `data-mode` lists one or more
//! space-separated renderings:
//!
//! - `absolute` (default): text becomes `data-format` or the long-date format
//! - `relative`: text becomes "3 hours ago" style
//! - `tooltip`: text is left alone, the absolute time (`data-format` or the long
//!   date with time) is attached as a tooltip
//!
//! `relative tooltip` gives a relative label with the exact time on hover.
//!
//! Formats are either one of the named long-date presets (`L`, `LL`, `LLL`,
//! `LLLL` and their abbreviated lowercase forms) or a strftime pattern.

use std::fmt::Display;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

use crate::page::{NodeId, Page};

pub const TIMESTAMP_MARKER: &str = "timestamp";

const DEFAULT_FORMAT: &str = "LL";
const TOOLTIP_FORMAT: &str = "LLL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Absolute,
    Relative,
    Tooltip,
}

impl RenderMode {
    fn parse(mode: &str) -> Option<Self> {
        match mode {
            "absolute" | "format" => Some(RenderMode::Absolute),
            "relative" | "fromNow" => Some(RenderMode::Relative),
            "tooltip" => Some(RenderMode::Tooltip),
            _ => None,
        }
    }

    /// Parses a `data-mode` value. No value means absolute; any unknown word
    /// rejects the whole list.
    pub fn parse_list(modes: Option<&str>) -> Option<Vec<Self>> {
        match modes {
            None => Some(vec![RenderMode::Absolute]),
            Some(modes) => {
                let parsed = modes.split_whitespace().map(Self::parse).collect::<Option<Vec<_>>>()?;
                (!parsed.is_empty()).then_some(parsed)
            }
        }
    }
}

fn preset(format: &str) -> Option<&'static str> {
    Some(match format {
        "L" => "%m/%d/%Y",
        "LL" => "%B %-d, %Y",
        "LLL" => "%B %-d, %Y %-I:%M %p",
        "LLLL" => "%A, %B %-d, %Y %-I:%M %p",
        "l" => "%-m/%-d/%Y",
        "ll" => "%b %-d, %Y",
        "lll" => "%b %-d, %Y %-I:%M %p",
        "llll" => "%a, %b %-d, %Y %-I:%M %p",
        _ => return None,
    })
}

/// Resolves presets and rejects patterns chrono cannot format.
fn strftime_pattern(format: &str) -> Option<&str> {
    let pattern = preset(format).unwrap_or(format);
    if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
        None
    } else {
        Some(pattern)
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// "a few seconds ago", "in 3 days", ...
pub fn relative(instant: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - instant).num_seconds();
    let span = humanize(seconds.unsigned_abs());
    if seconds < 0 {
        format!("in {span}")
    } else {
        format!("{span} ago")
    }
}

fn humanize(seconds: u64) -> String {
    let s = seconds as f64;
    let minutes = (s / 60.0).round() as u64;
    let hours = (s / 3600.0).round() as u64;
    let days = (s / 86400.0).round() as u64;

    if seconds < 45 {
        "a few seconds".to_string()
    } else if seconds < 90 {
        "a minute".to_string()
    } else if minutes < 45 {
        format!("{minutes} minutes")
    } else if minutes < 90 {
        "an hour".to_string()
    } else if hours < 22 {
        format!("{hours} hours")
    } else if hours < 36 {
        "a day".to_string()
    } else if days < 26 {
        format!("{days} days")
    } else if days < 45 {
        "a month".to_string()
    } else if days < 320 {
        let months = ((days as f64 / 30.4375).round() as u64).max(2);
        format!("{months} months")
    } else if days < 548 {
        "a year".to_string()
    } else {
        let years = ((days as f64 / 365.25).round() as u64).max(2);
        format!("{years} years")
    }
}

/// One-shot renderer, run once at page initialization.
pub struct TimestampRenderer<Tz: TimeZone> {
    tz: Tz,
    now: DateTime<Utc>,
}

impl<Tz> TimestampRenderer<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    pub fn new(tz: Tz, now: DateTime<Utc>) -> Self {
        Self { tz, now }
    }

    pub fn absolute(&self, instant: DateTime<Utc>, format: &str) -> String {
        let pattern = strftime_pattern(format).unwrap_or_else(|| {
            warn!(format, "invalid timestamp format, using default");
            preset(DEFAULT_FORMAT).unwrap_or("%Y-%m-%d")
        });
        instant.with_timezone(&self.tz).format(pattern).to_string()
    }

    /// Renders every marked node. Returns how many were rendered.
    pub fn render(&self, page: &Page) -> usize {
        page.update(|doc| {
            let nodes: Vec<NodeId> = doc.ids().filter(|&n| doc.has_class(n, TIMESTAMP_MARKER)).collect();
            let mut rendered = 0;

            for node in nodes {
                let Some(instant) = doc.data(node, "timestamp").and_then(parse_timestamp) else {
                    warn!(node = doc.name(node), "missing or unparseable timestamp");
                    continue;
                };
                let Some(modes) = RenderMode::parse_list(doc.data(node, "mode")) else {
                    warn!(node = doc.name(node), mode = ?doc.data(node, "mode"), "unknown timestamp mode");
                    continue;
                };

                for mode in modes {
                    match mode {
                        RenderMode::Absolute => {
                            let text = self.absolute(instant, doc.data(node, "format").unwrap_or(DEFAULT_FORMAT));
                            doc.set_text(node, text);
                        }
                        RenderMode::Relative => doc.set_text(node, relative(instant, self.now)),
                        RenderMode::Tooltip => {
                            let title = self.absolute(instant, doc.data(node, "format").unwrap_or(TOOLTIP_FORMAT));
                            doc.set_tooltip(node, title);
                        }
                    }
                }
                rendered += 1;
            }

            debug!(rendered, "timestamps rendered");
            rendered
        })
    }
}

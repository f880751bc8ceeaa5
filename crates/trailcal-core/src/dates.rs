//! Date normalization rules applied to standardized events.
//!
//! Two rules, tried in order:
//! 1. An event starting at exactly midnight becomes an all-day event.
//! 2. Otherwise a timezone-qualified event whose local start equals its
//!    local end is given a real duration: one hour for remote meetings,
//!    four hours for everything else.

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use crate::ics::CalendarObject;

/// Format of a local date-time value (`20250101T180000`).
pub const ICS_DATE_TIME_FORMAT: &str = "%Y%m%dT%H%M%S";

const START: &str = "DTSTART";
const END: &str = "DTEND";
const MIDNIGHT_SUFFIX: &str = "T000000";

/// Tunables for the zero-duration rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// `LOCATION` value marking a remote meeting.
    pub remote_location: String,
    /// Duration given to zero-length remote meetings.
    pub remote_duration: Duration,
    /// Duration given to every other zero-length event.
    pub default_duration: Duration,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            remote_location: "Zoom".to_string(),
            remote_duration: Duration::hours(1),
            default_duration: Duration::hours(4),
        }
    }
}

impl NormalizeOptions {
    /// Builder: set the remote meeting marker.
    pub fn with_remote_location(mut self, location: impl Into<String>) -> Self {
        self.remote_location = location.into();
        self
    }

    /// Builder: set both durations.
    pub fn with_durations(mut self, remote: Duration, default: Duration) -> Self {
        self.remote_duration = remote;
        self.default_duration = default;
        self
    }

    fn duration_for(&self, location: Option<&str>) -> Duration {
        if location == Some(self.remote_location.as_str()) {
            self.remote_duration
        } else {
            self.default_duration
        }
    }
}

/// Which rule changed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRule {
    /// The event was turned into an all-day event.
    AllDay,
    /// A zero-length event was given a duration.
    Extended,
    /// Nothing matched.
    Unchanged,
}

/// Applies the date rules to `event` in place.
pub fn normalize_dates(event: &mut CalendarObject, options: &NormalizeOptions) -> DateRule {
    if make_all_day(event) {
        DateRule::AllDay
    } else if extend_zero_duration(event, options) {
        DateRule::Extended
    } else {
        DateRule::Unchanged
    }
}

/// Keeps only the date of a midnight `DTSTART` and drops `DTEND`.
fn make_all_day(event: &mut CalendarObject) -> bool {
    let Some(date) = event
        .text(START)
        .filter(|start| start.ends_with(MIDNIGHT_SUFFIX))
        .and_then(|start| start.split_once('T'))
        .map(|(date, _)| date.to_string())
    else {
        return false;
    };

    debug!(date = %date, "Converting midnight event to all-day");
    event.set_text(START, date);
    event.remove(END);
    true
}

/// Extends every `DTEND;TZID=...` that equals its matching `DTSTART;TZID=...`.
fn extend_zero_duration(event: &mut CalendarObject, options: &NormalizeOptions) -> bool {
    let duration = options.duration_for(event.text("LOCATION"));

    let updates: Vec<(String, String)> = event
        .properties
        .keys()
        .filter_map(|name| name.strip_prefix(START))
        .filter(|params| params.starts_with(';') && params.contains("TZID="))
        .filter_map(|params| {
            let start = event.text(&format!("{START}{params}"))?;
            let end_name = format!("{END}{params}");
            if event.text(&end_name) != Some(start) {
                return None;
            }
            let parsed = NaiveDateTime::parse_from_str(start, ICS_DATE_TIME_FORMAT)
                .map_err(|e| debug!(value = %start, error = %e, "Unparseable local start"))
                .ok()?;
            let end = (parsed + duration).format(ICS_DATE_TIME_FORMAT).to_string();
            Some((end_name, end))
        })
        .collect();

    let changed = !updates.is_empty();
    for (name, value) in updates {
        debug!(property = %name, end = %value, "Extending zero-length event");
        event.set_text(name, value);
    }
    changed
}

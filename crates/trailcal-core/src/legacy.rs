//! Deterministic, rule-based cleanup of the club feed.
//!
//! This predates the service-backed standardization and is still served as
//! the legacy feed. It never leaves the process.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::dates::{NormalizeOptions, normalize_dates};
use crate::feed::FeedIdentity;
use crate::ics::{CalendarObject, FormatResult, Property, parse, serialize};

static SEE_NOTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)\s*-?\s*see notes\.?$").expect("see-notes regex should be valid")
});

static LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" *Level (\d)").expect("level regex should be valid"));

static ARRIVAL_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(.*?)\s*\(Arrival Time: .*\)$").expect("arrival regex should be valid")
});

/// Group lines that concern group 3, alone or combined with others.
const KEPT_GROUP_PREFIXES: [&str; 7] = [
    "Group 3",
    "Group 2,3",
    "Group 2, and 3",
    "Group 2, 2.5, and 3",
    "Group 2.5 & 3",
    "Group 2.5, 3",
    "Group one do two repeats, group 2,2.5 & 3",
];

/// Cleans a whole calendar feed.
pub fn cleanup(calendar_text: &str, identity: &FeedIdentity) -> FormatResult<String> {
    let mut calendar = parse(calendar_text)?;
    identity.stamp(&mut calendar);

    if let Some(Property::Components(events)) = calendar.properties.get_mut("VEVENT") {
        let options = NormalizeOptions::default();
        for event in events.iter_mut() {
            cleanup_event(event, &options);
        }
        debug!(events = events.len(), "Applied legacy cleanup");
    }

    Ok(serialize(&calendar))
}

/// Cleans one event in place.
pub fn cleanup_event(event: &mut CalendarObject, options: &NormalizeOptions) {
    normalize_dates(event, options);

    if let Some(summary) = event.text("SUMMARY").map(strip_see_notes) {
        event.set_text("SUMMARY", summary);
    }

    if let Some(description) = event.text("DESCRIPTION").map(clean_description) {
        event.set_text("DESCRIPTION", description);
    }
}

/// Removes a trailing "see notes" marker from a summary.
pub fn strip_see_notes(summary: &str) -> String {
    SEE_NOTES
        .captures(summary)
        .and_then(|captures| captures.get(1))
        .map_or_else(|| summary.to_string(), |m| m.as_str().to_string())
}

/// Keeps the group 3 instructions and the general text of a description.
pub fn clean_description(description: &str) -> String {
    let normalized = description.replace("Group  3", "Group 3");
    let normalized = LEVEL.replace_all(&normalized, "Group $1");

    let kept: Vec<&str> = normalized
        .split('\n')
        .map(str::trim)
        .filter(|line| {
            !line.starts_with("Group")
                || KEPT_GROUP_PREFIXES
                    .iter()
                    .any(|prefix| line.starts_with(prefix))
        })
        .collect();

    let joined = kept.join("\n").replace("\n\n\n", "\n");
    let trimmed = joined.trim();

    ARRIVAL_TIME
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map_or_else(|| trimmed.to_string(), |m| m.as_str().to_string())
}

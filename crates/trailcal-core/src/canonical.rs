//! Canonical cache identity for events.
//!
//! Two events share a key when their start/end properties, summary,
//! description and location are identical, whatever their UID, sequence
//! number or timestamps say.

use sha2::{Digest, Sha256};

use crate::ics::{CalendarObject, EVENT_TAG, serialize};

/// Exact property names that take part in the canonical identity.
const CANONICAL_NAMES: [&str; 3] = ["SUMMARY", "DESCRIPTION", "LOCATION"];

/// Property name prefixes that take part in the canonical identity.
/// Prefixes keep parameterized forms such as `DTSTART;TZID=...`.
const CANONICAL_PREFIXES: [&str; 2] = ["DTSTART", "DTEND"];

/// Returns true if `name` is part of the canonical identity.
pub fn is_canonical_property(name: &str) -> bool {
    CANONICAL_NAMES.contains(&name)
        || CANONICAL_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

/// Reduces an event to the properties that determine its identity.
pub fn minimal_event(event: &CalendarObject) -> CalendarObject {
    let mut minimal = CalendarObject::new(EVENT_TAG);
    minimal.properties = event
        .properties
        .iter()
        .filter(|(name, _)| is_canonical_property(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    minimal
}

/// Computes the cache key of an event: the SHA-256 of its serialized
/// minimal form, hex encoded.
pub fn canonical_key(event: &CalendarObject) -> String {
    sha256_hex(&serialize(&minimal_event(event)))
}

/// Hex-encoded SHA-256 digest of `text`.
pub fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

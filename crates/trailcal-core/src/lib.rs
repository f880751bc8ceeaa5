//! Core types: iCalendar codec, canonical keys, date rules, legacy cleanup

pub mod canonical;
pub mod dates;
pub mod feed;
pub mod ics;
pub mod legacy;
pub mod tracing;

pub use canonical::{canonical_key, minimal_event, sha256_hex};
pub use dates::{DateRule, NormalizeOptions, normalize_dates};
pub use feed::FeedIdentity;
pub use ics::{
    CALENDAR_TAG, CalendarObject, EVENT_TAG, FormatError, FormatResult, Property, parse, parse_as,
    serialize,
};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

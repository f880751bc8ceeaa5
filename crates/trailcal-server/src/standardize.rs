//! Per-event standardization: cache lookup, service call, merge, date rules.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trailcal_core::{
    CalendarObject, EVENT_TAG, NormalizeOptions, canonical_key, minimal_event, normalize_dates,
    parse_as, serialize,
};
use trailcal_standardizer::{ServiceResult, TextStandardizer};

use crate::cache::ContentCache;

/// What is sent to the service and what comes back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadStyle {
    /// Summary and description joined by a newline; the reply is a
    /// summary line followed by description lines.
    #[default]
    Plain,
    /// The serialized minimal event; the reply is a VEVENT block.
    EventBlock,
}

/// How a standardized event was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Served from the content cache without calling the service.
    Cached,
    /// Produced by the service and written to the cache.
    Fresh,
    /// The service produced nothing usable; the original is returned and
    /// nothing is cached.
    PassedThrough,
}

/// Result of standardizing one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardized {
    pub event: CalendarObject,
    pub outcome: Outcome,
}

impl Standardized {
    fn passed_through(event: &CalendarObject) -> Self {
        Self {
            event: event.clone(),
            outcome: Outcome::PassedThrough,
        }
    }
}

/// Standardizes single events through the cache and the text service.
pub struct EventStandardizer {
    cache: ContentCache,
    service: Arc<dyn TextStandardizer>,
    style: PayloadStyle,
    options: NormalizeOptions,
}

impl std::fmt::Debug for EventStandardizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStandardizer")
            .field("service", &self.service.name())
            .field("style", &self.style)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl EventStandardizer {
    /// Creates a standardizer with the plain payload style and default date rules.
    pub fn new(cache: ContentCache, service: Arc<dyn TextStandardizer>) -> Self {
        Self {
            cache,
            service,
            style: PayloadStyle::default(),
            options: NormalizeOptions::default(),
        }
    }

    /// Builder: set the payload style.
    pub fn with_style(mut self, style: PayloadStyle) -> Self {
        self.style = style;
        self
    }

    /// Builder: set the date normalization options.
    pub fn with_options(mut self, options: NormalizeOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the content cache.
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Standardizes one event. `force` skips the cache lookup (the result
    /// is still written).
    ///
    /// # Errors
    ///
    /// Only retryable service errors are returned, so a step runner can
    /// retry them. Every other failure passes the event through.
    pub async fn standardize(
        &self,
        event: &CalendarObject,
        force: bool,
    ) -> ServiceResult<Standardized> {
        let key = canonical_key(event);

        if !force {
            if let Some(cached) = self.cache.get(&key).await {
                debug!(key = %key, "Cache hit");
                return Ok(Standardized {
                    event: cached,
                    outcome: Outcome::Cached,
                });
            }
        }

        let payload = self.payload(event);
        let reply = match self.service.standardize(payload).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                info!(key = %key, service = self.service.name(), "Empty reply, passing event through");
                return Ok(Standardized::passed_through(event));
            }
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                warn!(key = %key, error = %e, "Service failed, passing event through");
                return Ok(Standardized::passed_through(event));
            }
        };

        let Some(mut merged) = self.merge(event, &reply) else {
            warn!(key = %key, "Unusable reply, passing event through");
            return Ok(Standardized::passed_through(event));
        };
        let rule = normalize_dates(&mut merged, &self.options);
        debug!(key = %key, rule = ?rule, "Merged reply");

        if let Err(e) = self.cache.put(&key, &merged).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }

        Ok(Standardized {
            event: merged,
            outcome: Outcome::Fresh,
        })
    }

    fn payload(&self, event: &CalendarObject) -> String {
        match self.style {
            PayloadStyle::Plain => format!(
                "{}\n{}",
                event.text("SUMMARY").unwrap_or_default(),
                event.text("DESCRIPTION").unwrap_or_default()
            ),
            PayloadStyle::EventBlock => serialize(&minimal_event(event)),
        }
    }

    fn merge(&self, original: &CalendarObject, reply: &str) -> Option<CalendarObject> {
        match self.style {
            PayloadStyle::Plain => {
                let (summary, description) = split_reply(reply);
                Some(overlay(original, summary, description, &[]))
            }
            PayloadStyle::EventBlock => {
                let block = parse_as(strip_code_fence(reply), EVENT_TAG)
                    .map_err(|e| debug!(error = %e, "Reply is not a VEVENT block"))
                    .ok()?;
                let summary = block.text("SUMMARY").unwrap_or_default();
                let description = block.text("DESCRIPTION").unwrap_or_default();
                let rest: Vec<(&str, &str)> = block
                    .properties
                    .keys()
                    .filter(|name| !matches!(name.as_str(), "SUMMARY" | "DESCRIPTION"))
                    .filter_map(|name| Some((name.as_str(), block.text(name)?)))
                    .collect();
                Some(overlay(original, summary, description, &rest))
            }
        }
    }
}

/// Splits a two-part reply at its first line break. A reply with no line
/// break is all summary.
fn split_reply(reply: &str) -> (&str, &str) {
    match reply.split_once('\n') {
        Some((summary, description)) => (summary.trim(), description.trim_end()),
        None => (reply.trim(), ""),
    }
}

/// Removes a surrounding Markdown code fence, if any.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return reply;
    };
    let inner = inner.split_once('\n').map_or("", |(_, body)| body);
    inner.strip_suffix("```").unwrap_or(inner)
}

/// Copies `original` and overlays the new summary and description (with
/// the original text kept as a footer) and any extra properties.
fn overlay(
    original: &CalendarObject,
    summary: &str,
    description: &str,
    extra: &[(&str, &str)],
) -> CalendarObject {
    let mut merged = original.clone();
    for (name, value) in extra {
        merged.set_text(*name, *value);
    }
    let footer = format!(
        "{description}\n\nSummary: {}\nDescription: {}",
        original.text("SUMMARY").unwrap_or_default(),
        original.text("DESCRIPTION").unwrap_or_default()
    );
    merged.set_text("SUMMARY", summary);
    merged.set_text("DESCRIPTION", footer);
    merged
}

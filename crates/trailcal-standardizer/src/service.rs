//! TextStandardizer trait definition.

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use crate::error::ServiceResult;

/// A boxed future for async trait methods, keeping the trait object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A service that rewrites raw event text into the club's standard form.
///
/// The input is one user turn (summary and description, or a serialized
/// event block, depending on how the caller builds it). The output is the
/// rewritten text, or `None` when the service produced nothing usable.
///
/// Implementations own their prompt: the few-shot examples and model
/// parameters are not part of the call.
pub trait TextStandardizer: Send + Sync {
    /// Returns the service name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Standardizes one piece of event text.
    ///
    /// # Errors
    ///
    /// Returns a `ServiceError` on network, quota or decoding failures.
    /// Callers retry errors whose code is retryable and pass the event
    /// through otherwise.
    fn standardize(&self, user_text: String) -> BoxFuture<'_, ServiceResult<Option<String>>>;
}

/// A standardizer that never produces output.
///
/// Used when no service credentials are configured: every event passes
/// through unchanged and nothing is cached.
#[derive(Debug, Default)]
pub struct DisabledStandardizer;

impl TextStandardizer for DisabledStandardizer {
    fn name(&self) -> &str {
        "disabled"
    }

    fn standardize(&self, user_text: String) -> BoxFuture<'_, ServiceResult<Option<String>>> {
        debug!(bytes = user_text.len(), "Standardizer disabled, skipping");
        Box::pin(async { Ok(None) })
    }
}

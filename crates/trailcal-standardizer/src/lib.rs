//! Boundary to the external text-standardization service.
//!
//! - [`TextStandardizer`] - the trait the pipeline calls for each event
//! - [`PromptTemplate`] - system instruction, few-shot examples and sampling parameters
//! - [`gemini::GeminiStandardizer`] - implementation backed by the Gemini API
//! - [`ServiceError`] - classified errors, with [`ServiceError::is_retryable`]

pub mod error;
pub mod gemini;
pub mod prompt;
pub mod service;

pub use error::{ServiceError, ServiceErrorCode, ServiceResult};
pub use prompt::{Exchange, PromptTemplate, Role, Turn};
pub use service::{BoxFuture, DisabledStandardizer, TextStandardizer};

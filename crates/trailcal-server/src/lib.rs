//! Standardization pipeline and feed server.
//!
//! This crate turns the upstream club calendar into the published feeds:
//! - a content cache over a pluggable key/value store
//! - per-event standardization through a [`TextStandardizer`](trailcal_standardizer::TextStandardizer)
//! - durable steps and deduplicated runs for whole calendars
//! - the HTTP routes serving original, standardized and legacy feeds
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use trailcal_server::{FeedService, FeedSource, ServerConfig, serve};
//! use trailcal_standardizer::DisabledStandardizer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::new(FeedSource::parse("team.ics")?);
//!     let feeds = FeedService::from_config(&config, Arc::new(DisabledStandardizer))?;
//!     serve(config.bind_addr, Arc::new(feeds)).await?;
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod error;
mod feed;
mod http;
mod pipeline;
mod signals;
mod standardize;
mod store;
mod workflow;

pub use cache::ContentCache;
pub use config::{DEFAULT_BIND_ADDR, FeedSource, PipelineConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use feed::{FeedService, run_id};
pub use http::{AppError, AppState, FeedQuery, router, serve};
pub use pipeline::{CalendarPipeline, RunParams, RunSummary};
pub use signals::SignalHandler;
pub use standardize::{EventStandardizer, Outcome, PayloadStyle, Standardized};
pub use store::{FileStore, KvStore, MAX_BATCH_KEYS, MemoryStore, StoreError, StoreResult};
pub use workflow::{
    Backoff, RunHandle, RunStatus, StepError, StepOptions, StepRunner, Workflow, WorkflowRegistry,
};

//! Commands working on a local calendar file.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use trailcal_core::{canonical_key, legacy, parse};
use trailcal_server::{CalendarPipeline, ContentCache, EventStandardizer, FileStore};
use trailcal_standardizer::{DisabledStandardizer, TextStandardizer};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Builds a pipeline over the file-backed cache.
fn pipeline(config: &ClientConfig, service: Arc<dyn TextStandardizer>) -> CalendarPipeline {
    let settings = config.pipeline.to_pipeline_config();
    let cache_dir = config.cache_dir();
    debug!(cache = %cache_dir.display(), "Opening cache");

    let cache = ContentCache::new(Arc::new(FileStore::new(cache_dir)));
    let standardizer = EventStandardizer::new(cache, service)
        .with_style(settings.style)
        .with_options(settings.normalize);
    CalendarPipeline::new(Arc::new(standardizer))
        .with_identity(settings.identity)
        .with_step_options(settings.step_options)
}

/// Standardizes `file`. With `cached_only` no service call is made.
pub async fn standardize(
    config: &ClientConfig,
    file: &Path,
    force: bool,
    cached_only: bool,
) -> ClientResult<String> {
    let text = tokio::fs::read_to_string(file).await?;
    if cached_only {
        let pipeline = pipeline(config, Arc::new(DisabledStandardizer));
        return Ok(pipeline.assemble_best_effort(&text).await?);
    }
    let pipeline = pipeline(config, config.standardizer()?);
    Ok(pipeline.run(&text, force).await?)
}

/// Applies the rule-based cleanup to `file`.
pub async fn legacy(config: &ClientConfig, file: &Path) -> ClientResult<String> {
    let text = tokio::fs::read_to_string(file).await?;
    let identity = config.pipeline.to_pipeline_config().identity;
    Ok(legacy::cleanup(&text, &identity)?)
}

/// Lists `<key>  <summary>` for every event of `file`.
pub async fn keys(file: &Path) -> ClientResult<String> {
    let text = tokio::fs::read_to_string(file).await?;
    let calendar = parse(&text)?;
    Ok(calendar
        .events()
        .iter()
        .map(|event| {
            format!(
                "{}  {}\n",
                canonical_key(event),
                event.text("SUMMARY").unwrap_or_default()
            )
        })
        .collect())
}

//! The `serve` command.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use trailcal_server::{FeedService, serve};

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Serves the feeds until a shutdown signal arrives.
pub async fn run(
    config: &ClientConfig,
    feed: Option<&str>,
    bind: Option<SocketAddr>,
) -> ClientResult<()> {
    let mut server_config = config.to_server_config(feed)?;
    if let Some(addr) = bind {
        server_config = server_config.with_bind_addr(addr);
    }

    let feeds = FeedService::from_config(&server_config, config.standardizer()?)?;
    info!(
        bind = %server_config.bind_addr,
        feed = %server_config.feed.name(),
        "Starting feed server"
    );
    serve(server_config.bind_addr, Arc::new(feeds)).await?;
    Ok(())
}

//! HTTP routes for the three feeds.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::{ServerError, ServerResult};
use crate::feed::FeedService;
use crate::signals::SignalHandler;

const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";
const PLAIN_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Shared state of the router.
pub type AppState = Arc<FeedService>;

/// Query parameters accepted by every feed.
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// `plain` serves the calendar as `text/plain`.
    pub mime: Option<String>,
    /// Starts a separate run that bypasses the cache.
    pub retry: Option<String>,
}

impl FeedQuery {
    fn content_type(&self) -> &'static str {
        match self.mime.as_deref() {
            Some("plain") => PLAIN_CONTENT_TYPE,
            _ => CALENDAR_CONTENT_TYPE,
        }
    }
}

/// Converts server errors to HTTP responses.
#[derive(Debug)]
pub struct AppError(ServerError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServerError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            ServerError::Format(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        (status, self.0.to_string()).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<ServerError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/original.ics", get(original))
        .route("/group3.ics", get(standardized))
        .route("/group3-legacy.ics", get(legacy))
        .fallback(not_found)
        .with_state(state)
}

fn calendar(query: &FeedQuery, body: String) -> Response {
    ([(header::CONTENT_TYPE, query.content_type())], body).into_response()
}

/// GET /original.ics - The upstream feed, unchanged
async fn original(
    State(feeds): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    Ok(calendar(&query, feeds.original().await?))
}

/// GET /group3.ics - The standardized feed
async fn standardized(
    State(feeds): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    let body = feeds.standardized(query.retry.as_deref()).await?;
    Ok(calendar(&query, body))
}

/// GET /group3-legacy.ics - The rule-based cleanup
async fn legacy(
    State(feeds): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    Ok(calendar(&query, feeds.legacy().await?))
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Serves the router on `addr` until a shutdown signal arrives.
pub async fn serve(addr: SocketAddr, state: AppState) -> ServerResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    let signals = SignalHandler::new();
    signals.spawn_listener();

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { signals.shutdown().await })
        .await?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use trailcal_standardizer::DisabledStandardizer;

    use super::*;
    use crate::config::{FeedSource, ServerConfig};

    const CALENDAR: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
BEGIN:VEVENT\r\n\
UID:1@khraces\r\n\
DTSTART:20250111T000000\r\n\
DTEND:20250111T000000\r\n\
SUMMARY:KHraces Trail Team - Rest - See Notes\r\n\
DESCRIPTION:Rest\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    fn app(feed: PathBuf) -> Router {
        let config = ServerConfig::new(FeedSource::File(feed))
            .with_completion_wait(Duration::from_secs(5));
        let feeds = FeedService::from_config(&config, Arc::new(DisabledStandardizer)).unwrap();
        router(Arc::new(feeds))
    }

    fn feed_file() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("team.ics");
        std::fs::write(&path, CALENDAR).unwrap();
        (dir, path)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String, String) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn original_feed() {
        let (_dir, path) = feed_file();

        let (status, content_type, body) = get(app(path), "/original.ics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/calendar; charset=utf-8");
        assert_eq!(body, CALENDAR);
    }

    #[tokio::test]
    async fn plain_mime_switches_content_type() {
        let (_dir, path) = feed_file();

        let (status, content_type, _) = get(app(path), "/original.ics?mime=plain").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/plain; charset=utf-8");
    }

    #[tokio::test]
    async fn standardized_feed_carries_identity() {
        let (_dir, path) = feed_file();

        let (status, _, body) = get(app(path), "/group3.ics?retry=2").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("NAME:DDD\r\n"));
        // The disabled service passes events through untouched.
        assert!(body.contains("SUMMARY:KHraces Trail Team - Rest - See Notes\r\n"));
    }

    #[tokio::test]
    async fn legacy_feed() {
        let (_dir, path) = feed_file();

        let (status, _, body) = get(app(path), "/group3-legacy.ics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("SUMMARY:KHraces Trail Team - Rest\r\n"));
        assert!(body.contains("DTSTART:20250111\r\n"));
        assert!(!body.contains("DTEND"));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let (_dir, path) = feed_file();

        let (status, _, _) = get(app(path), "/group4.ics").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_feed_is_bad_gateway() {
        let (status, _, _) = get(app(PathBuf::from("/nonexistent.ics")), "/original.ics").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn malformed_feed_is_unprocessable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ics");
        std::fs::write(&path, "BEGIN:VCALENDAR\r\nnot a property\r\n").unwrap();

        let (status, _, _) = get(app(path.clone()), "/group3-legacy.ics").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _, _) = get(app(path), "/group3.ics").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

//! HTTP facade serving `GET /feed`
//!
//! Query parameters are parsed into request overrides, handed to a
//! [`FeedProvider`], and the rendered feed is written back with a
//! format-specific content type.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{RawQuery, Request, State},
    http::{
        header::{CONTENT_TYPE, HeaderName},
        HeaderValue, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::SecondsFormat;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::feed::FeedProvider;
use crate::options::{FeedOptions, FeedQuery};

/// Wall-clock time spent producing the response
pub const GENERATION_TIME_HEADER: HeaderName = HeaderName::from_static("x-feed-generation-time");
/// When the served items were fetched from upstream
pub const SYNCED_AT_HEADER: HeaderName = HeaderName::from_static("x-feed-synced-at");

/// Build the application router
pub fn router(provider: Arc<dyn FeedProvider>) -> Router {
    Router::new()
        .route("/feed", get(feed))
        .layer(middleware::from_fn(log_requests))
        .with_state(provider)
}

/// Serve `app` on `listener` until Ctrl-C or SIGTERM
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn feed(
    State(provider): State<Arc<dyn FeedProvider>>,
    RawQuery(raw): RawQuery,
) -> Response {
    let start = Instant::now();
    let query = FeedQuery::parse(raw.as_deref().unwrap_or_default());
    let overrides = FeedOptions::from_query(&query);

    match provider.get_feed(&overrides).await {
        Ok(feed) => {
            let synced_at = feed.synced_at.to_rfc3339_opts(SecondsFormat::Secs, true);
            let mut response = (StatusCode::OK, feed.content).into_response();
            let headers = response.headers_mut();
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static(feed.format.content_type()),
            );
            if let Ok(value) = HeaderValue::from_str(&synced_at) {
                headers.insert(SYNCED_AT_HEADER, value);
            }
            if let Ok(value) = HeaderValue::from_str(&format!("{:?}", start.elapsed())) {
                headers.insert(GENERATION_TIME_HEADER, value);
            }
            response
        }
        Err(err) => {
            error!(error = %err, "feed generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to generate feed: {err}"),
            )
                .into_response()
        }
    }
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %uri.path(),
        query = uri.query().unwrap_or(""),
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "handled request"
    );
    response
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutting down server");
}

// src/web.rs

//! HTTP surface: document listing, document reads, and the SSE stream that
//! tells clients to reload.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path as UrlPath, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::stream::{self, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::watch::Receiver as WatchReceiver;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::hub::ReloadHub;
use crate::tree::{self, DocError};

/// Interval between SSE comment frames that keep idle connections open
/// through proxies with idle timeouts.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Handshake payload sent as soon as a streaming connection opens.
const CONNECTED_PAYLOAD: &str = "connected";

/// Shared state handed to every handler. The hub is constructed once at
/// startup and injected here rather than living in a global.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub hub: Arc<ReloadHub>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/files", get(list_documents))
        .route("/api/file/*path", get(get_document))
        .route("/api/events", get(document_events))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Binds the configured port and serves until the shutdown signal fires.
/// A bind failure here is startup-fatal for the process.
pub async fn start_server(
    config: Arc<AppConfig>,
    hub: Arc<ReloadHub>,
    shutdown: WatchReceiver<bool>,
) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("server listening on http://{addr}");
    serve(listener, config, hub, shutdown).await
}

/// Serves on an already-bound listener. Split from [`start_server`] so
/// tests can bind an ephemeral port themselves.
pub async fn serve(
    listener: TcpListener,
    config: Arc<AppConfig>,
    hub: Arc<ReloadHub>,
    mut shutdown: WatchReceiver<bool>,
) -> Result<()> {
    let app = router(AppState { config, hub });
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.changed().await.ok();
            info!("web server shutting down gracefully");
        })
        .await?;
    Ok(())
}

/// `GET /api/files` — the nested JSON listing of served documents.
async fn list_documents(State(state): State<AppState>) -> Response {
    match tree::build_tree(&state.config.markdown_dir, &state.config.ignore) {
        Ok(nodes) => Json(nodes).into_response(),
        Err(e) => {
            warn!("failed to build document listing: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("error reading directory: {e}"),
            )
                .into_response()
        }
    }
}

/// `GET /api/file/*path` — raw bytes of one document.
async fn get_document(State(state): State<AppState>, UrlPath(path): UrlPath<String>) -> Response {
    match tree::read_document(&state.config.markdown_dir, &path) {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            let status = match e {
                DocError::EmptyPath => StatusCode::BAD_REQUEST,
                DocError::OutsideRoot | DocError::NotADocument => StatusCode::FORBIDDEN,
                DocError::NotFound => StatusCode::NOT_FOUND,
                DocError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string()).into_response()
        }
    }
}

/// `GET /api/events` — the persistent reload notification stream.
///
/// Registers a subscriber with the hub, emits `data: connected` at once,
/// then one `data: reload` frame per coalesced notification, with comment
/// keepalives in between. Dropping the body stream on disconnect (or any
/// other exit) unregisters the subscriber, so cleanup is scoped, not
/// conditional.
async fn document_events(State(state): State<AppState>) -> Response {
    let subscriber = state.hub.register();
    info!("streaming client connected (subscriber {})", subscriber.id());

    let frames = stream::once(async { CONNECTED_PAYLOAD.to_string() })
        .chain(subscriber)
        .map(|payload| Ok::<SseEvent, Infallible>(SseEvent::default().data(payload)));

    let sse = Sse::new(frames).keep_alive(
        KeepAlive::new()
            .interval(KEEPALIVE_INTERVAL)
            .text("keepalive"),
    );

    // Make sure nothing between us and the client buffers the stream.
    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response()
}

/// Injects permissive CORS headers on every response and short-circuits
/// OPTIONS preflight requests.
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(&mut response);
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors_headers(&mut response);
    response
}

fn apply_cors_headers(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
}

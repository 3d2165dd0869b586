// src/server/mod.rs

//! Development server: static files from ordered base directories, prefix
//! routes, and the live reload channel.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::model::ServerConfig;
use crate::errors::{PipelineError, Result};

pub mod reload;

pub use reload::{CLIENT_PATH, ReloadChannel, SOCKET_PATH};

const CLIENT_TAG: &str = r#"<script src="/__assetpipe/client.js"></script>"#;

/// Keeps the server task alive and exposes the bound port.
#[derive(Debug)]
pub struct ServerHandle {
    pub port: u16,
    task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

#[derive(Clone)]
struct StaticDirs {
    dirs: Arc<Vec<PathBuf>>,
}

/// Build the router for `cfg` with paths resolved against `root`.
pub fn build_router(cfg: &ServerConfig, root: &Path, channel: ReloadChannel) -> Router {
    let dirs = StaticDirs {
        dirs: Arc::new(cfg.base_dirs.iter().map(|d| root.join(d)).collect()),
    };

    let mut files: Router = Router::new().fallback(serve_static).with_state(dirs);
    for (prefix, dir) in cfg.routes.iter() {
        files = files.nest_service(prefix, ServeDir::new(root.join(dir)));
    }

    Router::new()
        .route(SOCKET_PATH, get(reload::ws_handler))
        .route(CLIENT_PATH, get(reload::client_js))
        .with_state(channel)
        .merge(files)
        .layer(middleware::from_fn(inject_client))
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve in the background. `port` overrides the configured port;
/// `Some(0)` picks a free one.
pub async fn serve(
    cfg: &ServerConfig,
    root: &Path,
    channel: ReloadChannel,
    port: Option<u16>,
) -> Result<ServerHandle> {
    let router = build_router(cfg, root, channel);
    let addr = format!("0.0.0.0:{}", port.unwrap_or(cfg.port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PipelineError::ConfigError(format!("cannot bind dev server to {addr}: {e}")))?;
    let local_addr = listener.local_addr()?;

    info!(
        port = local_addr.port(),
        base_dirs = ?cfg.base_dirs,
        "dev server listening on http://localhost:{}",
        local_addr.port()
    );

    let task = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).await {
            warn!(error = %err, "dev server stopped");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        task,
    })
}

/// Serve from the first base directory that has the file.
async fn serve_static(State(state): State<StaticDirs>, req: Request) -> Response {
    let (parts, _body) = req.into_parts();

    for dir in state.dirs.iter() {
        let mut probe = Request::builder()
            .method(parts.method.clone())
            .uri(parts.uri.clone())
            .body(Body::empty())
            .unwrap_or_default();
        *probe.headers_mut() = parts.headers.clone();

        let response = match ServeDir::new(dir).oneshot(probe).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
        if response.status() != StatusCode::NOT_FOUND {
            return response.map(Body::new);
        }
    }

    StatusCode::NOT_FOUND.into_response()
}

/// Insert the reload client before `</body>`, or append it.
pub fn inject_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(idx) => format!("{}{CLIENT_TAG}{}", &html[..idx], &html[idx..]),
        None => format!("{html}{CLIENT_TAG}"),
    }
}

async fn inject_client(req: Request, next: Next) -> Response {
    let is_head = req.method() == Method::HEAD;
    let response = next.run(req).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));
    if is_head || !is_html || response.status() != StatusCode::OK {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer html response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes));
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

//! Liveness endpoint
//!
//! `GET /health` → `200 {"status":"healthy"}`。それ以外のパス・メソッドは全部 404
//! （axum 既定の 405 は返さない）。

use std::io;
use std::net::SocketAddr;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub fn health_routes() -> Router {
    Router::new()
        .route("/health", any(health_check))
        .fallback(not_found)
}

async fn health_check(method: Method) -> Response {
    if method != Method::GET {
        return not_found().await.into_response();
    }
    Json(json!({ "status": "healthy" })).into_response()
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// A running liveness server. Aborted on drop of the process or via `shutdown`.
pub struct HealthServer {
    local_addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl HealthServer {
    /// Bind `addr` and serve in a background task.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "health endpoint listening");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, health_routes()).await {
                error!(error = %e, "health endpoint stopped");
            }
        });
        Ok(Self { local_addr, handle })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

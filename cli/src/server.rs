//! Local HTTP wrapper: `GET /fetch?url=<percent-encoded URL>`.
//!
//! Binds loopback only. One [`FetchGate`] is shared by every request, so the
//! rate limiter throttles the whole process.

use std::future::pending;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use axum::{Json, Router};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;

use fetchgate_fetch::{ErrorKind, FetchGate, GateError};

pub const DEFAULT_PORT: u16 = 8877;

#[derive(Debug, Deserialize)]
struct FetchParams {
    url: Option<String>,
}

pub fn router(gate: Arc<FetchGate>) -> Router {
    Router::new()
        .route("/fetch", get(handle_fetch))
        .with_state(gate)
}

pub async fn serve(gate: Arc<FetchGate>, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("fetch server at http://{addr}/fetch?url=...");
    axum::serve(listener, router(gate))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn handle_fetch(
    State(gate): State<Arc<FetchGate>>,
    Query(params): Query<FetchParams>,
) -> Response {
    let Some(url) = params.url.filter(|u| !u.trim().is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing url" })),
        )
            .into_response();
    };

    match gate.fetch(&url).await {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &GateError) -> Response {
    let kind = err.kind();
    let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut body = err.to_json();
    match kind {
        ErrorKind::Allowlist => body["error"] = "URL not on allowlist".into(),
        ErrorKind::UrlBlocked => body["error"] = "URL blocked".into(),
        ErrorKind::Extraction | ErrorKind::Fetch => {}
    }

    (status, Json(body)).into_response()
}

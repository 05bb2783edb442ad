//! HTTP server for Prometheus metrics and remote module control.
//!
//! Runs on a separate tokio task. `/metrics` serves the Prometheus text
//! format; `POST /modules/:name/:action` forwards a lifecycle request into
//! the engine and answers with the JSON outcome.

use crate::control::{ControlHandle, LifecycleOp};
use crate::error::Outcome;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;

/// Handler for GET /metrics - returns Prometheus metrics in text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

#[derive(Serialize)]
struct Status {
    state: &'static str,
}

async fn status_handler(State(control): State<ControlHandle>) -> Json<Status> {
    Json(Status {
        state: control.state().as_str(),
    })
}

async fn module_handler(
    State(control): State<ControlHandle>,
    Path((name, action)): Path<(String, String)>,
) -> (StatusCode, Json<Outcome>) {
    let op = match action.parse::<LifecycleOp>() {
        Ok(op) => op,
        Err(reason) => return (StatusCode::BAD_REQUEST, Json(Outcome::failed(reason))),
    };
    let outcome = control.request(op, &name).await;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };
    (status, Json(outcome))
}

/// Routes served by the control endpoint.
pub fn router(control: ControlHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .route("/modules/:name/:action", post(module_handler))
        .with_state(control)
}

/// Run the HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, control: ControlHandle) {
    let app = router(control);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Metrics/control HTTP server listening");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind HTTP server");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "HTTP server error");
    }
}

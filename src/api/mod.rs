//! HTTP routes.
//!
//! | Route                | Gate            | Purpose                           |
//! |----------------------|-----------------|-----------------------------------|
//! | `GET /`              | none            | liveness                          |
//! | `GET /points`        | none            | list points (`skip`, `limit`)     |
//! | `GET /points/:id`    | none            | one point                         |
//! | `POST /points`       | verify          | register a point                  |
//! | `DELETE /point/:name`| verify          | remove a point                    |
//! | `GET /access`        | verify + grant  | the caller's authorized point     |
//!
//! Prometheus metrics are served by [`metrics_router`] on a separate port.

mod access;
mod points;

use crate::auth::RequestGate;
use crate::db::Database;
use crate::telemetry::{RequestTimer, spans};
use axum::extract::{FromRef, MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::Instrument;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub gate: Arc<RequestGate>,
}

impl FromRef<AppState> for Arc<RequestGate> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.gate)
    }
}

/// Build the public API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/points", get(points::list).post(points::create))
        .route("/points/:id", get(points::get_by_id))
        .route("/point/:name", axum::routing::delete(points::delete))
        .route("/access", get(access::access))
        .layer(middleware::from_fn(track_requests))
        .with_state(state)
}

/// Router serving `GET /metrics` in Prometheus text format.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(|| async { crate::metrics::gather_metrics() }))
}

/// Serve `app` until ctrl-c.
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
}

async fn root() -> Json<Value> {
    Json(json!({ "response": "Hello World!" }))
}

async fn track_requests(req: Request, next: Next) -> Response {
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let span = spans::request(req.method().as_str(), &route);
    let timer = RequestTimer::new(route);

    let response = next.run(req).instrument(span).await;
    timer.finish(response.status().as_u16());
    response
}

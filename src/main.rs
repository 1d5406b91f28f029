//! dropoffd - campus drop-off point registry.
//!
//! Serves the point catalogue over HTTP and gates mutations and point access
//! on bearer tokens issued by an external identity provider.

mod api;
mod auth;
mod config;
mod db;
mod error;
mod metrics;
mod telemetry;

use crate::api::AppState;
use crate::auth::{KeySetCache, RequestGate, TokenVerifier};
use crate::config::Config;
use crate::db::Database;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        eprintln!("failed to load config {config_path}: {e}");
        e
    })?;

    telemetry::init_tracing(config.server.log_format);

    if let Err(errors) = config::validation::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "configuration has {} error(s), refusing to start",
            errors.len()
        ));
    }

    info!(
        server = %config.server.name,
        issuer = %config.auth.issuer,
        audience = %config.auth.audience,
        "Starting dropoffd"
    );

    let db = Database::new(config.database_path()).await?;
    info!(path = %config.database_path(), "Database opened");

    db::seed::seed(&db, &config.seed).await?;
    let points = db.points().count().await?;
    let grants = db.grants().list().await?;
    for grant in &grants {
        debug!(
            id = grant.id,
            subject = %grant.subject,
            name = %grant.name,
            point_id = grant.point_id,
            created_at = grant.created_at,
            "Grant loaded"
        );
    }
    info!(points, grants = grants.len(), "Registry ready");

    // metrics_port = 0 disables the endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        let addr = SocketAddr::from(([0, 0, 0, 0], metrics_port));
        tokio::spawn(async move {
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!(%addr, error = %e, "Failed to bind metrics server");
                    return;
                }
            };
            info!(%addr, "Prometheus metrics server listening");
            if let Err(e) = axum::serve(listener, api::metrics_router()).await {
                error!(error = %e, "Metrics server error");
            }
        });
    }

    let keys = Arc::new(KeySetCache::new(&config.auth)?);
    match keys.refresh().await {
        Ok(set) => info!(url = %keys.url(), keys = set.len(), "Key set loaded"),
        Err(e) => warn!(
            url = %keys.url(),
            error = %e,
            "Key set warm-up failed, will retry on first request"
        ),
    }

    let verifier = TokenVerifier::new(&config.auth, keys);
    let state = AppState {
        db: db.clone(),
        gate: Arc::new(RequestGate::new(verifier, db)),
    };

    let listener = tokio::net::TcpListener::bind(config.listen.address).await?;
    info!(addr = %config.listen.address, "HTTP listener bound");

    api::serve(listener, api::router(state)).await?;
    info!("Shutdown complete");
    Ok(())
}

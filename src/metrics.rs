//! Prometheus metrics collection for dropoffd.
//!
//! Metrics are registered once at startup by [`init`]; until then every
//! `record_*` helper is a no-op, which keeps unit tests free of global setup.
//!
//! - `dropoff_auth_verifications_total{outcome}` - gate outcomes by error code
//! - `dropoff_jwks_fetch_total{result}` - key set fetch attempts
//! - `dropoff_jwks_fetch_duration_seconds` - key set fetch latency
//! - `dropoff_http_requests_total{route,status}` - HTTP requests served
//! - `dropoff_http_request_duration_seconds{route}` - HTTP request latency
//! - `dropoff_integrity_faults_total` - grants pointing at missing points

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Access control
// ========================================================================

/// Gate outcomes (`ok` or an auth error code).
pub static AUTH_VERIFICATIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Key set fetch attempts by result.
pub static JWKS_FETCHES: OnceLock<IntCounterVec> = OnceLock::new();

/// Key set fetch latency.
pub static JWKS_FETCH_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Grants found referencing a point that no longer exists.
pub static INTEGRITY_FAULTS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// HTTP
// ========================================================================

pub static HTTP_REQUESTS: OnceLock<IntCounterVec> = OnceLock::new();

pub static HTTP_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(AUTH_VERIFICATIONS, IntCounterVec::new(Opts::new("dropoff_auth_verifications_total", "Bearer token verification outcomes"), &["outcome"]));
    register!(JWKS_FETCHES, IntCounterVec::new(Opts::new("dropoff_jwks_fetch_total", "Key set fetch attempts"), &["result"]));
    register!(JWKS_FETCH_LATENCY, Histogram::with_opts(
        HistogramOpts::new("dropoff_jwks_fetch_duration_seconds", "Key set fetch latency")
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])));
    register!(INTEGRITY_FAULTS, IntCounter::new("dropoff_integrity_faults_total", "Grants referencing missing points"));
    register!(HTTP_REQUESTS, IntCounterVec::new(Opts::new("dropoff_http_requests_total", "HTTP requests served"), &["route", "status"]));
    register!(HTTP_LATENCY, HistogramVec::new(
        HistogramOpts::new("dropoff_http_request_duration_seconds", "HTTP request latency by route")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["route"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

/// Record a gate outcome.
#[inline]
pub fn record_auth(outcome: &str) {
    if let Some(c) = AUTH_VERIFICATIONS.get() {
        c.with_label_values(&[outcome]).inc();
    }
}

/// Record a key set fetch attempt with latency.
#[inline]
pub fn record_jwks_fetch(result: &str, duration_secs: f64) {
    if let Some(c) = JWKS_FETCHES.get() {
        c.with_label_values(&[result]).inc();
    }
    if let Some(h) = JWKS_FETCH_LATENCY.get() {
        h.observe(duration_secs);
    }
}

#[inline]
pub fn record_integrity_fault() {
    if let Some(c) = INTEGRITY_FAULTS.get() {
        c.inc();
    }
}

/// Record a served HTTP request.
#[inline]
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    if let Some(c) = HTTP_REQUESTS.get() {
        c.with_label_values(&[route, &status.to_string()]).inc();
    }
    if let Some(h) = HTTP_LATENCY.get() {
        h.with_label_values(&[route]).observe(duration_secs);
    }
}

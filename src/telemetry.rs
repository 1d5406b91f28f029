//! Telemetry utilities for request timing and log setup.

use crate::config::LogFormat;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Guard for timing an HTTP request and recording metrics.
///
/// Records latency and status when [`finish`](Self::finish) is called, or
/// as a 500 when dropped unfinished (handler panicked or was cancelled).
pub struct RequestTimer {
    route: String,
    start: Instant,
    status: Option<u16>,
}

impl RequestTimer {
    /// Start timing a request.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            start: Instant::now(),
            status: None,
        }
    }

    pub fn finish(mut self, status: u16) {
        self.status = Some(status);
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_request(&self.route, self.status.unwrap_or(500), duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Create a span for an inbound HTTP request.
    pub fn request(method: &str, route: &str) -> Span {
        info_span!("request", method = %method, route = %route)
    }
}

//! Identity provider configuration.

use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::time::Duration;

/// Environment variable overriding `auth.issuer`.
pub const ISSUER_ENV: &str = "DROPOFF_AUTH_ISSUER";
/// Environment variable overriding `auth.audience`.
pub const AUDIENCE_ENV: &str = "DROPOFF_AUTH_AUDIENCE";

/// Token verification and key set settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Trusted issuer URL. Tokens must carry exactly this `iss`.
    #[serde(default)]
    pub issuer: String,
    /// Expected `aud` value.
    #[serde(default)]
    pub audience: String,
    /// Accepted signing algorithms (default: RS256).
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,
    /// Clock skew tolerated on `exp`/`nbf` (default: 0).
    #[serde(default = "default_leeway_secs")]
    pub leeway_secs: u64,
    /// Timeout for a single key set fetch (default: 5).
    #[serde(default = "default_jwks_timeout_secs")]
    pub jwks_timeout_secs: u64,
    /// Age after which a cached key set is refetched (default: 3600, 0 = never).
    #[serde(default = "default_jwks_max_age_secs")]
    pub jwks_max_age_secs: u64,
    /// Extra attempts after a failed fetch (default: 2).
    #[serde(default = "default_jwks_fetch_retries")]
    pub jwks_fetch_retries: u32,
    /// Initial backoff between fetch attempts, doubled each retry (default: 200).
    #[serde(default = "default_jwks_retry_backoff_ms")]
    pub jwks_retry_backoff_ms: u64,
    /// Forced refreshes allowed per minute on unknown key ids (default: 6).
    #[serde(default = "default_jwks_refresh_per_minute")]
    pub jwks_refresh_per_minute: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            audience: String::new(),
            algorithms: default_algorithms(),
            leeway_secs: default_leeway_secs(),
            jwks_timeout_secs: default_jwks_timeout_secs(),
            jwks_max_age_secs: default_jwks_max_age_secs(),
            jwks_fetch_retries: default_jwks_fetch_retries(),
            jwks_retry_backoff_ms: default_jwks_retry_backoff_ms(),
            jwks_refresh_per_minute: default_jwks_refresh_per_minute(),
        }
    }
}

impl AuthConfig {
    /// Published key set location: `<issuer>/.well-known/jwks.json`.
    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.issuer.trim_end_matches('/'))
    }

    pub fn jwks_timeout(&self) -> Duration {
        Duration::from_secs(self.jwks_timeout_secs)
    }

    pub fn jwks_max_age(&self) -> Option<Duration> {
        (self.jwks_max_age_secs > 0).then(|| Duration::from_secs(self.jwks_max_age_secs))
    }

    pub fn jwks_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.jwks_retry_backoff_ms)
    }

    pub(super) fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(issuer) = lookup(ISSUER_ENV).filter(|v| !v.is_empty()) {
            self.issuer = issuer;
        }
        if let Some(audience) = lookup(AUDIENCE_ENV).filter(|v| !v.is_empty()) {
            self.audience = audience;
        }
    }
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256]
}

fn default_leeway_secs() -> u64 {
    0
}

fn default_jwks_timeout_secs() -> u64 {
    5
}

fn default_jwks_max_age_secs() -> u64 {
    3600
}

fn default_jwks_fetch_retries() -> u32 {
    2
}

fn default_jwks_retry_backoff_ms() -> u64 {
    200
}

fn default_jwks_refresh_per_minute() -> u32 {
    6
}

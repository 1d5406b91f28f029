//! Identity provider key set cache.
//!
//! Fetches `<issuer>/.well-known/jwks.json` and keeps the usable verification
//! keys in memory. The whole set is swapped atomically on refresh; readers
//! hold an `Arc` to the set they started with and never see a partial one.
//!
//! # Refresh policy
//!
//! - First use (or `max_age` elapsed): fetch, with bounded retry and backoff.
//!   Concurrent callers share one fetch. Expired-set refreshes are throttled;
//!   while throttled the expired set keeps being served.
//! - Token names an unknown `kid`: one forced refresh, throttled by its own
//!   governor limiter so forged `kid`s cannot hammer the provider.

use crate::config::AuthConfig;
use governor::{Quota, RateLimiter};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk};
use jsonwebtoken::{Algorithm, DecodingKey};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failures fetching or decoding the published key set.
#[derive(Debug, Error)]
pub enum KeyRetrievalError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("key set endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("request timed out")]
    Timeout,
    #[error("malformed key set: {0}")]
    Malformed(String),
    #[error("key set refresh throttled")]
    Throttled,
}

impl KeyRetrievalError {
    fn label(&self) -> &'static str {
        match self {
            Self::Request(_) => "request_error",
            Self::Status(_) => "bad_status",
            Self::Timeout => "timeout",
            Self::Malformed(_) => "malformed",
            Self::Throttled => "throttled",
        }
    }
}

/// A public key usable for signature verification.
pub struct VerificationKey {
    pub decoding: DecodingKey,
    /// Algorithm pinned by the key's `alg` member, if published.
    pub algorithm: Option<Algorithm>,
}

/// Immutable snapshot of the provider's verification keys, by key id.
pub struct KeySet {
    keys: HashMap<String, VerificationKey>,
    fetched_at: Instant,
}

impl KeySet {
    /// Build a key set from a JWKS document (`{"keys": [...]}`).
    ///
    /// Entries without a `kid`, encryption keys, symmetric (`oct`) keys and
    /// entries that fail to parse are skipped. A document with no usable
    /// key is rejected.
    pub fn from_document(doc: &Value) -> Result<Self, KeyRetrievalError> {
        let entries = doc
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| KeyRetrievalError::Malformed("missing keys array".to_string()))?;

        let mut keys = HashMap::with_capacity(entries.len());
        for entry in entries {
            let Some(kid) = entry.get("kid").and_then(Value::as_str) else {
                debug!("Skipping key without kid");
                continue;
            };
            if entry.get("use").and_then(Value::as_str) == Some("enc") {
                debug!(kid, "Skipping encryption key");
                continue;
            }
            let jwk: Jwk = match serde_json::from_value(entry.clone()) {
                Ok(jwk) => jwk,
                Err(e) => {
                    warn!(kid, error = %e, "Skipping unparseable key");
                    continue;
                }
            };
            if matches!(jwk.algorithm, AlgorithmParameters::OctetKey(_)) {
                warn!(kid, "Skipping symmetric key in published key set");
                continue;
            }
            let decoding = match DecodingKey::from_jwk(&jwk) {
                Ok(key) => key,
                Err(e) => {
                    warn!(kid, error = %e, "Skipping invalid key");
                    continue;
                }
            };
            let algorithm = entry
                .get("alg")
                .and_then(Value::as_str)
                .and_then(|alg| Algorithm::from_str(alg).ok());

            keys.insert(kid.to_string(), VerificationKey { decoding, algorithm });
        }

        if keys.is_empty() {
            return Err(KeyRetrievalError::Malformed("no usable keys".to_string()));
        }

        Ok(Self {
            keys,
            fetched_at: Instant::now(),
        })
    }

    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn contains(&self, kid: &str) -> bool {
        self.keys.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Process-wide, thread-safe cache of the provider's key set.
pub struct KeySetCache {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    max_age: Option<Duration>,
    retries: u32,
    backoff: Duration,
    current: RwLock<Option<Arc<KeySet>>>,
    refresh_lock: tokio::sync::Mutex<()>,
    scheduled_refresh: governor::DefaultDirectRateLimiter,
    forced_refresh: governor::DefaultDirectRateLimiter,
}

impl KeySetCache {
    /// Create an empty cache for the configured issuer.
    pub fn new(config: &AuthConfig) -> Result<Self, KeyRetrievalError> {
        let timeout = config.jwks_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dropoffd/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let per_minute = NonZeroU32::new(config.jwks_refresh_per_minute).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            url: config.jwks_url(),
            client,
            timeout,
            max_age: config.jwks_max_age(),
            retries: config.jwks_fetch_retries,
            backoff: config.jwks_retry_backoff(),
            current: RwLock::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
            scheduled_refresh: RateLimiter::direct(Quota::per_minute(per_minute)),
            forced_refresh: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current key set, fetching it when absent or older than `max_age`.
    ///
    /// When the refresh limiter is exhausted an expired set is returned as is,
    /// and an empty cache fails with [`KeyRetrievalError::Throttled`].
    pub async fn get_keys(&self) -> Result<Arc<KeySet>, KeyRetrievalError> {
        if let Some(set) = self.cached().filter(|set| !self.is_expired(set)) {
            return Ok(set);
        }

        let _guard = self.refresh_lock.lock().await;
        // Re-check: the holder before us may have installed a fresh set.
        let cached = self.cached();
        if let Some(set) = &cached
            && !self.is_expired(set)
        {
            return Ok(Arc::clone(set));
        }

        if self.scheduled_refresh.check().is_err() {
            return match cached {
                Some(set) => {
                    debug!(url = %self.url, "Key set refresh throttled, serving expired set");
                    Ok(set)
                }
                None => Err(KeyRetrievalError::Throttled),
            };
        }
        if cached.is_some() {
            debug!(url = %self.url, "Cached key set expired");
        }
        self.fetch_with_retry().await
    }

    /// Key set that contains `kid`, or `None` when the provider does not publish it.
    ///
    /// A miss against the cached set triggers one forced refresh if the
    /// limiter allows it. A failed forced refresh counts as a miss.
    pub async fn key_set_containing(
        &self,
        kid: &str,
    ) -> Result<Option<Arc<KeySet>>, KeyRetrievalError> {
        let set = self.get_keys().await?;
        if set.contains(kid) {
            return Ok(Some(set));
        }

        if self.forced_refresh.check().is_err() {
            debug!(kid, "Unknown key id, forced refresh throttled");
            return Ok(None);
        }

        match self.refresh().await {
            Ok(set) if set.contains(kid) => Ok(Some(set)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(kid, error = %e, "Forced key set refresh failed");
                Ok(None)
            }
        }
    }

    /// Fetch the key set now and install it.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, KeyRetrievalError> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_with_retry().await
    }

    fn is_expired(&self, set: &KeySet) -> bool {
        self.max_age.is_some_and(|max| set.age() >= max)
    }

    async fn fetch_with_retry(&self) -> Result<Arc<KeySet>, KeyRetrievalError> {
        let mut attempt = 0;
        loop {
            match self.fetch().await {
                Ok(set) => {
                    info!(url = %self.url, keys = set.len(), "Key set refreshed");
                    return Ok(self.install(set));
                }
                Err(e) if attempt < self.retries => {
                    let delay = self.backoff.saturating_mul(2u32.saturating_pow(attempt));
                    warn!(url = %self.url, attempt, error = %e, "Key set fetch failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Key set fetch failed");
                    return Err(e);
                }
            }
        }
    }

    /// Replace the cached set as a whole.
    pub fn install(&self, set: KeySet) -> Arc<KeySet> {
        let set = Arc::new(set);
        *self.current.write() = Some(Arc::clone(&set));
        set
    }

    /// Cached set without touching the network.
    pub fn cached(&self) -> Option<Arc<KeySet>> {
        self.current.read().clone()
    }

    async fn fetch(&self) -> Result<KeySet, KeyRetrievalError> {
        let started = Instant::now();
        let result = self.fetch_inner().await;
        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        crate::metrics::record_jwks_fetch(label, started.elapsed().as_secs_f64());
        result
    }

    async fn fetch_inner(&self) -> Result<KeySet, KeyRetrievalError> {
        let body = tokio::time::timeout(self.timeout, async {
            let response = self.client.get(&self.url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(KeyRetrievalError::Status(status));
            }
            Ok::<_, KeyRetrievalError>(response.bytes().await?)
        })
        .await
        .map_err(|_| KeyRetrievalError::Timeout)??;

        let doc: Value = serde_json::from_slice(&body)
            .map_err(|e| KeyRetrievalError::Malformed(e.to_string()))?;
        KeySet::from_document(&doc)
    }
}

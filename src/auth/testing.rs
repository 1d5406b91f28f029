//! Test fixtures: RSA signing keys, token minting and a stub identity provider.

use crate::config::AuthConfig;
use axum::Router;
use axum::extract::State;
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Private key for `k1`, published in [`JWKS`].
pub const K1_PEM: &str = include_str!("../../tests/fixtures/k1_private.pem");
/// Private key for `k2`, only published in [`JWKS_ROTATED`].
pub const K2_PEM: &str = include_str!("../../tests/fixtures/k2_private.pem");
pub const JWKS: &str = include_str!("../../tests/fixtures/jwks.json");
pub const JWKS_ROTATED: &str = include_str!("../../tests/fixtures/jwks_rotated.json");

pub const AUDIENCE: &str = "myapp";

/// Auth config pointing at `issuer` with fast retries.
pub fn auth_config(issuer: &str) -> AuthConfig {
    AuthConfig {
        issuer: issuer.to_string(),
        audience: AUDIENCE.to_string(),
        jwks_retry_backoff_ms: 10,
        ..AuthConfig::default()
    }
}

/// Standard claims expiring `exp_offset` seconds from now.
pub fn claims(issuer: &str, subject: &str, exp_offset: i64) -> Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "sub": subject,
        "iss": issuer,
        "aud": AUDIENCE,
        "iat": now,
        "exp": now + exp_offset,
    })
}

/// Sign `claims` with RS256 under key id `kid`.
pub fn mint(kid: &str, pem: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

/// Local HTTP server publishing a key set at `/.well-known/jwks.json`.
///
/// Responses are served in order; the last one repeats.
pub struct IdpStub {
    pub issuer: String,
    hits: Arc<AtomicUsize>,
    user_agent: Arc<Mutex<Option<String>>>,
}

#[derive(Clone)]
struct StubState {
    responses: Arc<Vec<(StatusCode, &'static str)>>,
    delay: Duration,
    hits: Arc<AtomicUsize>,
    user_agent: Arc<Mutex<Option<String>>>,
}

async fn jwks_handler(
    State(state): State<StubState>,
    headers: HeaderMap,
) -> (StatusCode, &'static str) {
    let n = state.hits.fetch_add(1, Ordering::SeqCst);
    *state.user_agent.lock() = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    let idx = n.min(state.responses.len() - 1);
    state.responses[idx]
}

impl IdpStub {
    pub async fn spawn(responses: Vec<(StatusCode, &'static str)>) -> Self {
        Self::start(responses, Duration::ZERO).await
    }

    pub async fn spawn_slow(delay: Duration, body: &'static str) -> Self {
        Self::start(vec![(StatusCode::OK, body)], delay).await
    }

    async fn start(responses: Vec<(StatusCode, &'static str)>, delay: Duration) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let user_agent = Arc::new(Mutex::new(None));
        let state = StubState {
            responses: Arc::new(responses),
            delay,
            hits: Arc::clone(&hits),
            user_agent: Arc::clone(&user_agent),
        };
        let app = Router::new()
            .route("/.well-known/jwks.json", get(jwks_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            issuer: format!("http://{addr}"),
            hits,
            user_agent,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// `User-Agent` of the most recent key set request.
    pub fn last_user_agent(&self) -> Option<String> {
        self.user_agent.lock().clone()
    }
}

//! Stand-in identity provider.
//!
//! Serves a fixture key set at `/.well-known/jwks.json` and mints RS256
//! tokens with the matching private keys.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub const K1_PEM: &str = include_str!("../fixtures/k1_private.pem");
pub const K2_PEM: &str = include_str!("../fixtures/k2_private.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");

pub const AUDIENCE: &str = "myapp";

pub struct Idp {
    pub issuer: String,
    up: Arc<AtomicBool>,
}

impl Idp {
    pub async fn spawn() -> anyhow::Result<Self> {
        let up = Arc::new(AtomicBool::new(true));
        let state = Arc::clone(&up);
        let app = Router::new().route(
            "/.well-known/jwks.json",
            get(move || {
                let state = Arc::clone(&state);
                async move {
                    if state.load(Ordering::SeqCst) {
                        (StatusCode::OK, JWKS)
                    } else {
                        (StatusCode::SERVICE_UNAVAILABLE, "down")
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            issuer: format!("http://{addr}"),
            up,
        })
    }

    /// Make the key set endpoint answer 503 from now on.
    pub fn take_down(&self) {
        self.up.store(false, Ordering::SeqCst);
    }

    /// A valid token for `subject`, signed with the published key.
    pub fn token(&self, subject: &str) -> String {
        self.mint("k1", K1_PEM, &self.claims(subject, 3600))
    }

    pub fn claims(&self, subject: &str, exp_offset: i64) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "sub": subject,
            "iss": self.issuer,
            "aud": AUDIENCE,
            "iat": now,
            "exp": now + exp_offset,
        })
    }

    pub fn mint(&self, kid: &str, pem: &str, claims: &Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
        jsonwebtoken::encode(&header, claims, &key).unwrap()
    }
}

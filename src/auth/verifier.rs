//! Bearer token verification.
//!
//! A token is accepted only when all of these hold:
//! 1. it parses as a JWS with an asymmetric, configured `alg`
//! 2. its `kid` names a key in the provider's published set
//! 3. the signature verifies under that key
//! 4. `exp` has not passed, `iss` and `aud` match the configuration
//!
//! The result is a typed [`VerifiedIdentity`]; tokens missing any consumed
//! claim are rejected here instead of failing later on field access.

use super::jwks::KeySetCache;
use crate::config::AuthConfig;
use crate::error::AuthError;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Validation};
use serde::Deserialize;
use std::sync::Arc;

/// True for public-key signature schemes.
pub fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Claims of a successfully verified token. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub subject: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct Claims {
    sub: String,
    iss: String,
    aud: Audience,
    exp: i64,
}

/// Verifies bearer tokens against the issuer's key set.
pub struct TokenVerifier {
    keys: Arc<KeySetCache>,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig, keys: Arc<KeySetCache>) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.algorithms = config
            .algorithms
            .iter()
            .copied()
            .filter(|alg| is_asymmetric(*alg))
            .collect();
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_audience(&[config.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = config.leeway_secs;
        validation.validate_nbf = true;

        Self { keys, validation }
    }

    /// Verify a raw token and return the identity it asserts.
    pub async fn verify(&self, raw_token: &str) -> Result<VerifiedIdentity, AuthError> {
        let token = raw_token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| AuthError::MalformedToken(e.to_string()))?;

        // HMAC tokens never reach key lookup.
        if !is_asymmetric(header.alg) || !self.validation.algorithms.contains(&header.alg) {
            return Err(AuthError::InvalidSignature(format!(
                "algorithm {:?} not accepted",
                header.alg
            )));
        }

        let kid = header.kid.ok_or(AuthError::UnknownKey(None))?;
        let Some(keys) = self.keys.key_set_containing(&kid).await? else {
            return Err(AuthError::UnknownKey(Some(kid)));
        };
        let Some(key) = keys.get(&kid) else {
            return Err(AuthError::UnknownKey(Some(kid)));
        };
        if key.algorithm.is_some_and(|pinned| pinned != header.alg) {
            return Err(AuthError::InvalidSignature(format!(
                "algorithm {:?} does not match key {kid}",
                header.alg
            )));
        }

        let data = jsonwebtoken::decode::<Claims>(token, &key.decoding, &self.validation)
            .map_err(classify)?;
        let claims = data.claims;

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| AuthError::InvalidClaims("exp out of range".to_string()))?;
        let audience = match claims.aud {
            Audience::One(aud) => vec![aud],
            Audience::Many(auds) => auds,
        };

        Ok(VerifiedIdentity {
            subject: claims.sub,
            issuer: claims.iss,
            audience,
            expires_at,
        })
    }
}

fn classify(e: jsonwebtoken::errors::Error) -> AuthError {
    match e.kind() {
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidKeyFormat => AuthError::InvalidSignature(e.to_string()),
        ErrorKind::ExpiredSignature
        | ErrorKind::ImmatureSignature
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::Json(_) => AuthError::InvalidClaims(e.to_string()),
        _ => AuthError::MalformedToken(e.to_string()),
    }
}

//! Request gate: bearer credential → verified identity → authorization.
//!
//! Every protected handler goes through [`RequestGate::gate`] before it reads
//! a body or touches storage. Point-scoped handlers use
//! [`RequestGate::authorize`], which also resolves the caller's grant.

use super::{Authorization, AuthorizationResolver, TokenVerifier, VerifiedIdentity};
use crate::db::{Database, Point};
use crate::error::{ApiError, AuthError};
use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(AuthError::MissingCredential);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedToken("authorization header is not ASCII".to_string()))?
        .trim();
    if value.is_empty() {
        return Err(AuthError::MissingCredential);
    }

    let (scheme, token) = value.split_once(' ').unwrap_or((value, ""));
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedToken(format!("unsupported scheme {scheme}")));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingCredential);
    }
    Ok(token)
}

/// Outcome of a point-scoped check.
#[derive(Debug)]
pub enum Access {
    Granted {
        identity: VerifiedIdentity,
        authorization: Authorization,
        point: Point,
    },
    /// Valid identity without a grant. A legitimate state, not an error.
    NoGrant { identity: VerifiedIdentity },
}

/// Composes verification and authorization for HTTP handlers.
pub struct RequestGate {
    verifier: TokenVerifier,
    resolver: AuthorizationResolver,
    db: Database,
}

impl RequestGate {
    pub fn new(verifier: TokenVerifier, db: Database) -> Self {
        Self {
            verifier,
            resolver: AuthorizationResolver::new(db.clone()),
            db,
        }
    }

    /// Verify the request's bearer credential.
    pub async fn gate(&self, headers: &HeaderMap) -> Result<VerifiedIdentity, AuthError> {
        let result = match bearer_token(headers) {
            Ok(token) => self.verifier.verify(token).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(identity) => {
                crate::metrics::record_auth("ok");
                debug!(
                    subject = %identity.subject,
                    issuer = %identity.issuer,
                    audience = ?identity.audience,
                    expires_at = %identity.expires_at,
                    "Token verified"
                );
            }
            Err(e) if e.is_unauthorized() => {
                crate::metrics::record_auth(e.error_code());
                debug!(code = e.error_code(), error = %e, "Token rejected");
            }
            Err(e) => {
                crate::metrics::record_auth(e.error_code());
                warn!(code = e.error_code(), error = %e, "Token verification failed upstream");
            }
        }
        result
    }

    /// Verify the caller and resolve the point they may operate against.
    pub async fn authorize(&self, headers: &HeaderMap) -> Result<Access, ApiError> {
        let identity = self.gate(headers).await?;

        let Some(authorization) = self.resolver.resolve(&identity).await? else {
            return Ok(Access::NoGrant { identity });
        };

        match self.db.points().find_by_id(authorization.point_id).await? {
            Some(point) => Ok(Access::Granted {
                identity,
                authorization,
                point,
            }),
            None => {
                crate::metrics::record_integrity_fault();
                error!(
                    subject = %identity.subject,
                    point_id = authorization.point_id,
                    "Grant references a missing point"
                );
                Err(ApiError::DanglingGrant {
                    subject: identity.subject,
                    point_id: authorization.point_id,
                })
            }
        }
    }
}

/// Extractor for handlers that require a verified caller.
///
/// Rejects with the collapsed 401/400 response before the handler runs.
pub struct Authenticated(pub VerifiedIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    Arc<RequestGate>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let gate = Arc::<RequestGate>::from_ref(state);
        let identity = gate.gate(&parts.headers).await?;
        Ok(Self(identity))
    }
}

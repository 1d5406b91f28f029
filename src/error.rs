//! Unified error handling for dropoffd.
//!
//! Internal errors keep every distinct failure kind for logs and metrics.
//! At the HTTP boundary they collapse: all token failures become the same
//! 401, so a caller cannot learn which check rejected it.

use crate::auth::KeyRetrievalError;
use crate::db::DbError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

// ============================================================================
// Auth Errors (token verification)
// ============================================================================

/// Errors produced while turning a bearer credential into a verified identity.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingCredential,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("no key {0:?} in key set")]
    UnknownKey(Option<String>),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    #[error("key retrieval failed: {0}")]
    KeyRetrieval(#[from] KeyRetrievalError),
}

impl AuthError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedToken(_) => "malformed_token",
            Self::UnknownKey(_) => "unknown_key",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::InvalidClaims(_) => "invalid_claims",
            Self::KeyRetrieval(_) => "key_retrieval",
        }
    }

    /// True for failures caused by the credential itself.
    ///
    /// These are never retried. Everything else is an upstream fault.
    pub fn is_unauthorized(&self) -> bool {
        !matches!(self, Self::KeyRetrieval(_))
    }
}

// ============================================================================
// API Errors (HTTP boundary)
// ============================================================================

/// Errors surfaced by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("grant for {subject} references missing point {point_id}")]
    DanglingGrant { subject: String, point_id: i64 },
}

impl ApiError {
    /// Status code and client-visible detail.
    fn status_and_detail(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Auth(AuthError::MissingCredential) => (
                StatusCode::UNAUTHORIZED,
                "ERROR: Authorization header missing",
            ),
            Self::Auth(e) if e.is_unauthorized() => {
                (StatusCode::UNAUTHORIZED, "ERROR: Invalid Access token")
            }
            Self::Auth(_) => (StatusCode::BAD_REQUEST, "ERROR: Error authenticating"),
            Self::Db(DbError::PointExists(_)) => {
                (StatusCode::CONFLICT, "ERROR: Point already exists")
            }
            Self::Db(DbError::CoordinatesTaken(_)) => {
                (StatusCode::CONFLICT, "ERROR: Coordinates already registered")
            }
            Self::Db(DbError::PointInUse(_)) => {
                (StatusCode::CONFLICT, "ERROR: Point is referenced by a grant")
            }
            Self::Db(DbError::PointNotFound(_)) => (StatusCode::NOT_FOUND, "ERROR: Point not found"),
            Self::Db(_) | Self::DanglingGrant { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ERROR: Internal error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

//! Point-scoped access route.

use super::AppState;
use crate::auth::{Access, Authorization};
use crate::db::Point;
use crate::error::ApiError;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Serialize)]
struct AccessBody {
    #[serde(flatten)]
    authorization: Authorization,
    point: Point,
}

/// GET /access
///
/// 200 with the caller's grant, 204 when the verified caller holds none.
pub async fn access(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, ApiError> {
    match state.gate.authorize(&headers).await? {
        Access::Granted {
            identity,
            authorization,
            point,
        } => {
            debug!(subject = %identity.subject, point_id = point.id, "Access granted");
            Ok(Json(AccessBody {
                authorization,
                point,
            })
            .into_response())
        }
        Access::NoGrant { identity } => {
            debug!(subject = %identity.subject, "No grant, nothing to return");
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

//! Point registry routes.

use super::AppState;
use crate::auth::Authenticated;
use crate::db::{DbError, NewPoint, Point, PointRepository};
use crate::error::ApiError;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct Page {
    skip: Option<i64>,
    limit: Option<i64>,
}

/// GET /points
pub async fn list(
    State(state): State<AppState>,
    Query(page): Query<Page>,
) -> Result<Json<Vec<Point>>, ApiError> {
    let skip = page.skip.unwrap_or(0).max(0);
    let limit = page
        .limit
        .unwrap_or(PointRepository::DEFAULT_LIMIT)
        .clamp(0, MAX_LIMIT);
    Ok(Json(state.db.points().list(skip, limit).await?))
}

/// GET /points/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Point>, ApiError> {
    state
        .db
        .points()
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| DbError::PointNotFound(id.to_string()).into())
}

/// POST /points
pub async fn create(
    Authenticated(identity): Authenticated,
    State(state): State<AppState>,
    Json(new_point): Json<NewPoint>,
) -> Result<(StatusCode, Json<Point>), ApiError> {
    let point = state.db.points().create(&new_point).await?;
    info!(subject = %identity.subject, point = %point.name, id = point.id, "Point registered");
    Ok((StatusCode::CREATED, Json(point)))
}

/// DELETE /point/:name
pub async fn delete(
    Authenticated(identity): Authenticated,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let point = state.db.points().delete_by_name(&name).await?;
    info!(subject = %identity.subject, point = %point.name, id = point.id, "Point removed");
    Ok(Json(json!({ "message": "Point deleted" })))
}

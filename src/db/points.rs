//! Point repository.
//!
//! Points are keyed by their unique name. Creation never overwrites an
//! existing point, and a point still referenced by a grant cannot be removed.

use super::{DbError, on_foreign_key_violation, on_unique_violation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// A stored drop-off point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Point {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub coordinates: String,
    pub image: Option<String>,
}

/// Fields supplied when registering a point.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPoint {
    pub name: String,
    pub location: String,
    pub coordinates: String,
    #[serde(default)]
    pub image: Option<String>,
}

type PointRow = (i64, String, String, String, Option<String>);

impl From<PointRow> for Point {
    fn from((id, name, location, coordinates, image): PointRow) -> Self {
        Self {
            id,
            name,
            location,
            coordinates,
            image,
        }
    }
}

/// Repository for point operations.
pub struct PointRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PointRepository<'a> {
    /// Default page size for [`list`](Self::list).
    pub const DEFAULT_LIMIT: i64 = 100;

    /// Create a new point repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// List points ordered by id.
    pub async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Point>, DbError> {
        let rows = sqlx::query_as::<_, PointRow>(
            r#"
            SELECT id, name, location, coordinates, image
            FROM points
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Point::from).collect())
    }

    /// Find point by id.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Point>, DbError> {
        let row = sqlx::query_as::<_, PointRow>(
            r#"
            SELECT id, name, location, coordinates, image
            FROM points
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Point::from))
    }

    /// Find point by name.
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Point>, DbError> {
        let row = sqlx::query_as::<_, PointRow>(
            r#"
            SELECT id, name, location, coordinates, image
            FROM points
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Point::from))
    }

    /// Register a new point.
    ///
    /// A point with the same name is rejected with [`DbError::PointExists`],
    /// one at already-registered coordinates with [`DbError::CoordinatesTaken`].
    pub async fn create(&self, point: &NewPoint) -> Result<Point, DbError> {
        if self.find_by_name(&point.name).await?.is_some() {
            return Err(DbError::PointExists(point.name.clone()));
        }

        // UNIQUE constraints still catch a concurrent insert of the same name
        let result = sqlx::query(
            r#"
            INSERT INTO points (name, location, coordinates, image)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&point.name)
        .bind(&point.location)
        .bind(&point.coordinates)
        .bind(&point.image)
        .execute(self.pool)
        .await
        .map_err(|e| {
            on_unique_violation(e, |message| {
                if message.contains("points.coordinates") {
                    DbError::CoordinatesTaken(point.coordinates.clone())
                } else {
                    DbError::PointExists(point.name.clone())
                }
            })
        })?;

        Ok(Point {
            id: result.last_insert_rowid(),
            name: point.name.clone(),
            location: point.location.clone(),
            coordinates: point.coordinates.clone(),
            image: point.image.clone(),
        })
    }

    /// Remove a point by name, returning the deleted record.
    pub async fn delete_by_name(&self, name: &str) -> Result<Point, DbError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PointRow>(
            r#"
            SELECT id, name, location, coordinates, image
            FROM points
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(point) = row.map(Point::from) else {
            return Err(DbError::PointNotFound(name.to_string()));
        };

        sqlx::query("DELETE FROM points WHERE id = ?")
            .bind(point.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| on_foreign_key_violation(e, || DbError::PointInUse(name.to_string())))?;

        tx.commit().await?;
        Ok(point)
    }

    /// Number of stored points.
    pub async fn count(&self) -> Result<i64, DbError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM points")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

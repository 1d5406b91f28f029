//! Grant repository.
//!
//! A grant maps one provider subject to the single point that subject may
//! operate against. Grants are written out-of-band (seed data, admin
//! tooling) and only read on the request path.

use super::DbError;
use sqlx::{SqliteExecutor, SqlitePool};

/// A stored subject-to-point grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub id: i64,
    pub subject: String,
    pub name: String,
    pub point_id: i64,
    pub created_at: i64,
}

type GrantRow = (i64, String, String, i64, i64);

impl From<GrantRow> for Grant {
    fn from((id, subject, name, point_id, created_at): GrantRow) -> Self {
        Self {
            id,
            subject,
            name,
            point_id,
            created_at,
        }
    }
}

/// Repository for grant operations.
pub struct GrantRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> GrantRepository<'a> {
    /// Create a new grant repository.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Find the grant held by a subject.
    pub async fn find_by_subject(&self, subject: &str) -> Result<Option<Grant>, DbError> {
        let row = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT id, subject, name, point_id, created_at
            FROM grants
            WHERE subject = ?
            "#,
        )
        .bind(subject)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Grant::from))
    }

    /// All grants, ordered by id.
    pub async fn list(&self) -> Result<Vec<Grant>, DbError> {
        let rows = sqlx::query_as::<_, GrantRow>(
            r#"
            SELECT id, subject, name, point_id, created_at
            FROM grants
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Grant::from).collect())
    }
}

/// Create a grant on `executor`. A subject holds at most one.
pub(super) async fn insert_grant<'e, E>(
    executor: E,
    subject: &str,
    name: &str,
    point_id: i64,
) -> Result<Grant, DbError>
where
    E: SqliteExecutor<'e>,
{
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO grants (subject, name, point_id, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(subject)
    .bind(name)
    .bind(point_id)
    .bind(now)
    .execute(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            DbError::GrantExists(subject.to_string())
        }
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            DbError::PointNotFound(point_id.to_string())
        }
        other => DbError::from(other),
    })?;

    Ok(Grant {
        id: result.last_insert_rowid(),
        subject: subject.to_string(),
        name: name.to_string(),
        point_id,
        created_at: now,
    })
}

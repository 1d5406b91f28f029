//! First-run seed data.
//!
//! Loads the campus point catalogue into an empty database and then the
//! configured grants, all inside one transaction.

use super::grants::insert_grant;
use super::{DbError, NewPoint};
use crate::config::SeedConfig;
use tracing::{info, warn};

/// Counts of rows written by [`seed`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub points: usize,
    pub grants: usize,
}

/// The built-in point catalogue.
pub fn catalogue() -> Vec<NewPoint> {
    [
        (
            "Reitoria",
            "Departamento 25",
            "40.631417730224, -8.657526476133642",
            "https://api-assets.ua.pt/v1/image/resizer?imageUrl=https%3A%2F%2Fuaonline.ua.pt%2Fupload%2Fimg%2Fjoua_i_3090.jpg&width=1200",
        ),
        (
            "CP",
            "Departamento 23",
            "40.62957166653202, -8.655231694880136",
            "https://api-assets.ua.pt/v1/image/resizer?imageUrl=https%3A%2F%2Fapi-assets.ua.pt%2Ffiles%2Fimgs%2F000%2F001%2F838%2Foriginal.jpg&width=1200",
        ),
        (
            "DETI",
            "Departamento 4",
            "40.63331148617483, -8.659589862642955",
            "https://api-assets.ua.pt/files/imgs/000/000/380/original.jpg",
        ),
        (
            "Cantina de Santiago",
            "Departamento 6",
            "40.630659968175124, -8.659097986459223",
            "https://api-assets.ua.pt/v1/image/resizer?imageUrl=https%3A%2F%2Fuaonline.ua.pt%2Fupload%2Fimg%2Fjoua_i_12306.jpg&width=1200",
        ),
        (
            "Cantina do Crasto",
            "Departamento M",
            "40.62450887522072, -8.656864475040406",
            "https://api-assets.ua.pt/v1/image/resizer?imageUrl=https%3A%2F%2Fuaonline.ua.pt%2Fupload%2Fimg%2Fjoua_i_2828.JPG&width=1200",
        ),
        (
            "Pavilhão Aristides Hall",
            "Departamento E",
            "40.63000326980208, -8.654180591479575",
            "https://d1bvpoagx8hqbg.cloudfront.net/originals/bem-vindos-a-ua-399bd8560914b519d0dca3fc57bd0afe.jpg",
        ),
    ]
    .into_iter()
    .map(|(name, location, coordinates, image)| NewPoint {
        name: name.to_string(),
        location: location.to_string(),
        coordinates: coordinates.to_string(),
        image: Some(image.to_string()),
    })
    .collect()
}

/// Seed the database.
///
/// Points are only loaded into an empty table. Grants whose subject already
/// holds one are skipped, so restarting with the same config is a no-op.
pub async fn seed(db: &super::Database, config: &SeedConfig) -> Result<SeedReport, DbError> {
    let mut report = SeedReport::default();
    if !config.enabled {
        return Ok(report);
    }

    let mut tx = db.pool().begin().await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM points")
        .fetch_one(&mut *tx)
        .await?;

    if existing == 0 {
        for point in catalogue() {
            sqlx::query(
                "INSERT INTO points (name, location, coordinates, image) VALUES (?, ?, ?, ?)",
            )
            .bind(&point.name)
            .bind(&point.location)
            .bind(&point.coordinates)
            .bind(&point.image)
            .execute(&mut *tx)
            .await?;
            report.points += 1;
        }
    }

    for grant in &config.grants {
        let point_id: Option<i64> = sqlx::query_scalar("SELECT id FROM points WHERE name = ?")
            .bind(&grant.point)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(point_id) = point_id else {
            return Err(DbError::PointNotFound(grant.point.clone()));
        };

        match insert_grant(&mut *tx, &grant.subject, &grant.name, point_id).await {
            Ok(_) => report.grants += 1,
            Err(DbError::GrantExists(_)) => {
                warn!(subject = %grant.subject, "Seed grant skipped, subject already holds a grant");
            }
            Err(e) => return Err(e),
        }
    }

    tx.commit().await?;
    info!(points = report.points, grants = report.grants, "Seed data applied");
    Ok(report)
}

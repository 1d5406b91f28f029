//! Maps a verified subject to the one point it may operate against.

use super::VerifiedIdentity;
use crate::db::{Database, DbError};
use serde::Serialize;
use tracing::debug;

/// A subject's authorization: who they are and which point they hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Authorization {
    #[serde(rename = "name")]
    pub principal: String,
    pub point_id: i64,
}

/// Looks up grants by verified subject.
///
/// Point existence is not checked here; a grant naming a deleted point is a
/// data-consistency fault for the caller to report.
#[derive(Clone)]
pub struct AuthorizationResolver {
    db: Database,
}

impl AuthorizationResolver {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// `None` when the subject holds no grant. Never a default point.
    pub async fn resolve(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<Option<Authorization>, DbError> {
        let grant = self.db.grants().find_by_subject(&identity.subject).await?;
        if grant.is_none() {
            debug!(subject = %identity.subject, "No grant for subject");
        }
        Ok(grant.map(|g| Authorization {
            principal: g.name,
            point_id: g.point_id,
        }))
    }
}

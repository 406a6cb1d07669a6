use anyhow::Result;
use sqlx::SqliteConnection;

use crate::domain::karma::{TargetKind, TargetRef};
use crate::infra::db::Db;

/// Read-only lookup of like targets in the entity tables. The ledger reads
/// existence and ownership through this and never writes back.
#[derive(Clone)]
pub struct TargetResolver {
    db: Db,
}

impl TargetResolver {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Maps a wire-level kind string plus id onto a target address. `None`
    /// means the kind string is not a recognized target type.
    pub fn resolve(kind: &str, id: i64) -> Option<TargetRef> {
        TargetKind::from_db(kind).map(|kind| TargetRef { kind, id })
    }

    pub async fn exists(&self, target: TargetRef) -> Result<bool> {
        Ok(self.owner_of(target).await?.is_some())
    }

    /// Current owner of the target, or `None` if the target is absent.
    pub async fn owner_of(&self, target: TargetRef) -> Result<Option<i64>> {
        let mut conn = self.db.pool().acquire().await?;
        Self::owner_in(&mut conn, target).await
    }

    /// Ownership lookup on an explicit connection so toggle_like can resolve
    /// the beneficiary inside its own transaction.
    pub(crate) async fn owner_in(
        conn: &mut SqliteConnection,
        target: TargetRef,
    ) -> Result<Option<i64>> {
        let sql = match target.kind {
            TargetKind::Post => "SELECT author_id FROM posts WHERE id = ?",
            TargetKind::Comment => "SELECT author_id FROM comments WHERE id = ?",
        };

        let owner = sqlx::query_scalar(sql)
            .bind(target.id)
            .fetch_optional(conn)
            .await?;

        Ok(owner)
    }
}

use anyhow::Result;
use sqlx::SqliteConnection;
use time::OffsetDateTime;

use crate::app::resolver::TargetResolver;
use crate::domain::karma::{LikeState, TargetRef, ToggleOutcome};
use crate::infra::db::{unix_ms, Db};

/// Write side of the karma ledger. Owns the per-(actor, target) uniqueness
/// invariant and the like/unlike toggle state machine.
#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Flips the like state for (actor, target) inside one transaction and
    /// returns the new state plus the recomputed like count. `None` means the
    /// target does not exist.
    ///
    /// The delete runs first so the transaction takes the write lock before
    /// reading anything; two toggles on the same key serialize instead of
    /// both observing "absent". If the insert still loses a race, the unique
    /// index on (actor_id, target_kind, target_id) rejects it and the current
    /// state is re-read and reported rather than surfaced as an error.
    ///
    /// SQLite has a single database-wide writer, so toggles on distinct keys
    /// still queue behind each other for the write lock; the pool's busy
    /// timeout bounds that wait. To keep the lock held as briefly as
    /// possible, the transaction covers only the flip itself and the count
    /// is read back after commit.
    pub async fn toggle_like(
        &self,
        actor_id: i64,
        target: TargetRef,
    ) -> Result<Option<ToggleOutcome>> {
        let mut tx = self.db.pool().begin().await?;

        let deleted = sqlx::query(
            "DELETE FROM karma_ledger \
             WHERE actor_id = ? AND target_kind = ? AND target_id = ?",
        )
        .bind(actor_id)
        .bind(target.kind.as_db())
        .bind(target.id)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() > 0 {
            tx.commit().await?;
            let like_count = self.count_likes(target).await?;
            return Ok(Some(ToggleOutcome {
                state: LikeState::Unliked,
                like_count,
            }));
        }

        // Beneficiary is captured from the target's current owner at like
        // time; historical entries keep it even if ownership later changes.
        let Some(beneficiary_id) = TargetResolver::owner_in(&mut tx, target).await? else {
            // Dropping the transaction rolls back the no-op delete.
            return Ok(None);
        };

        let inserted = sqlx::query(
            "INSERT INTO karma_ledger \
             (beneficiary_id, actor_id, points, target_kind, target_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (actor_id, target_kind, target_id) DO NOTHING",
        )
        .bind(beneficiary_id)
        .bind(actor_id)
        .bind(target.kind.points())
        .bind(target.kind.as_db())
        .bind(target.id)
        .bind(unix_ms(OffsetDateTime::now_utc()))
        .execute(&mut *tx)
        .await?;

        let state = if inserted.rows_affected() > 0 {
            LikeState::Liked
        } else if Self::is_liked_in(&mut tx, actor_id, target).await? {
            // A concurrent toggle won the insert; its entry is the one that
            // survives and this call just reports it.
            LikeState::Liked
        } else {
            LikeState::Unliked
        };

        tx.commit().await?;
        let like_count = self.count_likes(target).await?;

        Ok(Some(ToggleOutcome { state, like_count }))
    }

    pub async fn count_likes(&self, target: TargetRef) -> Result<i64> {
        let mut conn = self.db.pool().acquire().await?;
        Self::count_in(&mut conn, target).await
    }

    pub async fn is_liked_by(&self, actor_id: i64, target: TargetRef) -> Result<bool> {
        let mut conn = self.db.pool().acquire().await?;
        Self::is_liked_in(&mut conn, actor_id, target).await
    }

    async fn count_in(conn: &mut SqliteConnection, target: TargetRef) -> Result<i64> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM karma_ledger WHERE target_kind = ? AND target_id = ?",
        )
        .bind(target.kind.as_db())
        .bind(target.id)
        .fetch_one(conn)
        .await?;

        Ok(count)
    }

    async fn is_liked_in(
        conn: &mut SqliteConnection,
        actor_id: i64,
        target: TargetRef,
    ) -> Result<bool> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS( \
                SELECT 1 FROM karma_ledger \
                WHERE actor_id = ? AND target_kind = ? AND target_id = ?)",
        )
        .bind(actor_id)
        .bind(target.kind.as_db())
        .bind(target.id)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }
}

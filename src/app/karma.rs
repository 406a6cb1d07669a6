use std::collections::HashMap;

use anyhow::{anyhow, Result};
use sqlx::{QueryBuilder, Row, Sqlite};
use time::{Duration, OffsetDateTime};

use crate::domain::karma::{Annotation, LeaderboardRow, TargetKind, TargetRef};
use crate::infra::db::{unix_ms, Db};

/// Read side of the karma ledger: batched per-target annotations and the
/// windowed leaderboard. Never mutates the ledger.
#[derive(Clone)]
pub struct KarmaService {
    db: Db,
}

impl KarmaService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Like counts and viewer liked-status for a whole batch of targets.
    ///
    /// Issues one grouped count query, plus one set-membership query when a
    /// viewer is present, regardless of batch size. Every requested target
    /// gets an entry; targets with no likes annotate as zero/false.
    pub async fn batch_annotate(
        &self,
        targets: &[TargetRef],
        viewer_id: Option<i64>,
    ) -> Result<HashMap<TargetRef, Annotation>> {
        let mut annotations: HashMap<TargetRef, Annotation> = targets
            .iter()
            .map(|target| (*target, Annotation::default()))
            .collect();

        if targets.is_empty() {
            return Ok(annotations);
        }

        let mut counts = QueryBuilder::new(
            "SELECT target_kind, target_id, COUNT(*) AS like_count \
             FROM karma_ledger WHERE (target_kind, target_id) IN (",
        );
        push_target_tuples(&mut counts, targets);
        counts.push(") GROUP BY target_kind, target_id");

        for row in counts.build().fetch_all(self.db.pool()).await? {
            let target = target_from_row(&row)?;
            if let Some(annotation) = annotations.get_mut(&target) {
                annotation.like_count = row.get("like_count");
            }
        }

        if let Some(viewer_id) = viewer_id {
            let mut liked = QueryBuilder::new(
                "SELECT target_kind, target_id FROM karma_ledger WHERE actor_id = ",
            );
            liked.push_bind(viewer_id);
            liked.push(" AND (target_kind, target_id) IN (");
            push_target_tuples(&mut liked, targets);
            liked.push(")");

            for row in liked.build().fetch_all(self.db.pool()).await? {
                let target = target_from_row(&row)?;
                if let Some(annotation) = annotations.get_mut(&target) {
                    annotation.is_liked = true;
                }
            }
        }

        Ok(annotations)
    }

    /// Users ranked by karma received within the trailing window, recomputed
    /// in full per query.
    pub async fn leaderboard(&self, window: Duration, limit: i64) -> Result<Vec<LeaderboardRow>> {
        self.leaderboard_since(OffsetDateTime::now_utc() - window, limit)
            .await
    }

    /// Ranking over entries with `created_at >= cutoff` (inclusive). Ties on
    /// total karma order by ascending user id so the ranking is a total order.
    pub async fn leaderboard_since(
        &self,
        cutoff: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<LeaderboardRow>> {
        let rows = sqlx::query(
            "SELECT k.beneficiary_id, u.username, SUM(k.points) AS karma \
             FROM karma_ledger k \
             JOIN users u ON u.id = k.beneficiary_id \
             WHERE k.created_at >= ? \
             GROUP BY k.beneficiary_id \
             ORDER BY karma DESC, k.beneficiary_id ASC \
             LIMIT ?",
        )
        .bind(unix_ms(cutoff))
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut ranking = Vec::with_capacity(rows.len());
        for row in rows {
            ranking.push(LeaderboardRow {
                user_id: row.get("beneficiary_id"),
                username: row.get("username"),
                karma: row.get("karma"),
            });
        }

        Ok(ranking)
    }
}

fn push_target_tuples<'a>(builder: &mut QueryBuilder<'a, Sqlite>, targets: &[TargetRef]) {
    for (i, target) in targets.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push("(");
        builder.push_bind(target.kind.as_db());
        builder.push(", ");
        builder.push_bind(target.id);
        builder.push(")");
    }
}

fn target_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<TargetRef> {
    let kind: String = row.get("target_kind");
    let kind =
        TargetKind::from_db(&kind).ok_or_else(|| anyhow!("unknown target kind: {}", kind))?;

    Ok(TargetRef {
        kind,
        id: row.get("target_id"),
    })
}

use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;

use crate::domain::post::Post;
use crate::infra::db::{from_unix_ms, unix_ms, Db};

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, author_id: i64, content: String) -> Result<Post> {
        let author: String = sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;

        let created_at = OffsetDateTime::now_utc();
        let row = sqlx::query(
            "INSERT INTO posts (author_id, content, created_at) \
             VALUES (?, ?, ?) \
             RETURNING id, created_at",
        )
        .bind(author_id)
        .bind(&content)
        .bind(unix_ms(created_at))
        .fetch_one(self.db.pool())
        .await?;

        Ok(Post {
            id: row.get("id"),
            author_id,
            author,
            content,
            created_at: from_unix_ms(row.get("created_at"))?,
        })
    }

    /// Newest-first page of posts. Annotation (likes, comment counts) is the
    /// aggregator's job and happens per request on top of this list.
    pub async fn list_posts(&self, limit: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query(
            "SELECT p.id, p.author_id, u.username AS author, p.content, p.created_at \
             FROM posts p \
             JOIN users u ON u.id = p.author_id \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            posts.push(Post {
                id: row.get("id"),
                author_id: row.get("author_id"),
                author: row.get("author"),
                content: row.get("content"),
                created_at: from_unix_ms(row.get("created_at"))?,
            });
        }

        Ok(posts)
    }
}

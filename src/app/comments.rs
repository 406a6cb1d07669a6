use std::collections::{HashMap, HashSet};

use anyhow::Result;
use sqlx::{QueryBuilder, Row, Sqlite};
use time::OffsetDateTime;

use crate::domain::comment::{Comment, CommentNode};
use crate::domain::karma::{Annotation, TargetRef};
use crate::infra::db::{from_unix_ms, unix_ms, Db};

/// Replies may nest this many levels below a root comment. Each level adds
/// two layers of JSON nesting when the forest is serialized, so the cap keeps
/// responses well inside serde_json's recursion limit.
pub const MAX_REPLY_DEPTH: i64 = 32;

pub enum CreateCommentOutcome {
    Created(Comment),
    /// Post absent, or the named parent does not belong to the post.
    NotFound,
    /// The reply would sit deeper than `MAX_REPLY_DEPTH`.
    TooDeep,
}

#[derive(Clone)]
pub struct CommentService {
    db: Db,
}

impl CommentService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Creates a comment on a post, optionally as a reply.
    pub async fn create_comment(
        &self,
        author_id: i64,
        post_id: i64,
        parent_id: Option<i64>,
        content: String,
    ) -> Result<CreateCommentOutcome> {
        let post: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;
        if post.is_none() {
            return Ok(CreateCommentOutcome::NotFound);
        }

        let mut depth = 0;
        if let Some(parent_id) = parent_id {
            let parent: Option<(i64, i64)> =
                sqlx::query_as("SELECT post_id, depth FROM comments WHERE id = ?")
                    .bind(parent_id)
                    .fetch_optional(self.db.pool())
                    .await?;
            let Some((parent_post, parent_depth)) = parent else {
                return Ok(CreateCommentOutcome::NotFound);
            };
            if parent_post != post_id {
                return Ok(CreateCommentOutcome::NotFound);
            }
            if parent_depth + 1 >= MAX_REPLY_DEPTH {
                return Ok(CreateCommentOutcome::TooDeep);
            }
            depth = parent_depth + 1;
        }

        let author: String = sqlx::query_scalar("SELECT username FROM users WHERE id = ?")
            .bind(author_id)
            .fetch_one(self.db.pool())
            .await?;

        let created_at = OffsetDateTime::now_utc();
        let row = sqlx::query(
            "INSERT INTO comments (author_id, post_id, parent_id, depth, content, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING id, created_at",
        )
        .bind(author_id)
        .bind(post_id)
        .bind(parent_id)
        .bind(depth)
        .bind(&content)
        .bind(unix_ms(created_at))
        .fetch_one(self.db.pool())
        .await?;

        Ok(CreateCommentOutcome::Created(Comment {
            id: row.get("id"),
            post_id,
            parent_id,
            author_id,
            author,
            content,
            created_at: from_unix_ms(row.get("created_at"))?,
        }))
    }

    /// Flat comment list for a post, oldest first. Tree assembly happens in
    /// `build_comment_tree` so it stays independent of storage.
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.parent_id, c.author_id, u.username AS author, \
                    c.content, c.created_at \
             FROM comments c \
             JOIN users u ON u.id = c.author_id \
             WHERE c.post_id = ? \
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(self.db.pool())
        .await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            comments.push(Comment {
                id: row.get("id"),
                post_id: row.get("post_id"),
                parent_id: row.get("parent_id"),
                author_id: row.get("author_id"),
                author: row.get("author"),
                content: row.get("content"),
                created_at: from_unix_ms(row.get("created_at"))?,
            });
        }

        Ok(comments)
    }

    /// Comment totals for a page of posts in one grouped query.
    pub async fn counts_by_post(&self, post_ids: &[i64]) -> Result<HashMap<i64, i64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT post_id, COUNT(*) AS comments_count FROM comments WHERE post_id IN (",
        );
        let mut separated = query.separated(", ");
        for post_id in post_ids {
            separated.push_bind(*post_id);
        }
        query.push(") GROUP BY post_id");

        let rows = query.build().fetch_all(self.db.pool()).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("post_id"), row.get("comments_count")))
            .collect())
    }
}

/// Assembles the flat comment list into a reply forest. Two passes, O(n),
/// tolerant of children appearing before their parents in the input. A comment
/// whose parent is missing from the input becomes a root rather than being
/// dropped. Sibling order mirrors input order.
pub fn build_comment_tree(
    comments: &[Comment],
    annotations: &HashMap<TargetRef, Annotation>,
) -> Vec<CommentNode> {
    let known: HashSet<i64> = comments.iter().map(|comment| comment.id).collect();

    let mut children: HashMap<i64, Vec<&Comment>> = HashMap::new();
    let mut roots: Vec<&Comment> = Vec::new();
    for comment in comments {
        match comment.parent_id {
            Some(parent_id) if parent_id != comment.id && known.contains(&parent_id) => {
                children.entry(parent_id).or_default().push(comment);
            }
            _ => roots.push(comment),
        }
    }

    // Explicit-stack depth-first assembly: a finished node folds into its
    // parent's replies when popped, so arbitrarily deep chains never touch
    // the call stack.
    struct Frame<'a> {
        comment: &'a Comment,
        node: CommentNode,
        next_child: usize,
    }

    let mut forest = Vec::with_capacity(roots.len());
    let mut stack: Vec<Frame> = Vec::new();
    for root in roots {
        stack.push(Frame {
            comment: root,
            node: bare_node(root, annotations),
            next_child: 0,
        });
        while let Some(frame) = stack.last_mut() {
            let child = children
                .get(&frame.comment.id)
                .and_then(|kids| kids.get(frame.next_child))
                .copied();
            if let Some(child) = child {
                frame.next_child += 1;
                let node = bare_node(child, annotations);
                stack.push(Frame {
                    comment: child,
                    node,
                    next_child: 0,
                });
                continue;
            }
            if let Some(finished) = stack.pop() {
                match stack.last_mut() {
                    Some(parent) => parent.node.replies.push(finished.node),
                    None => forest.push(finished.node),
                }
            }
        }
    }

    forest
}

fn bare_node(comment: &Comment, annotations: &HashMap<TargetRef, Annotation>) -> CommentNode {
    let annotation = annotations
        .get(&TargetRef::comment(comment.id))
        .copied()
        .unwrap_or_default();

    CommentNode {
        id: comment.id,
        author: comment.author.clone(),
        content: comment.content.clone(),
        like_count: annotation.like_count,
        is_liked: annotation.is_liked,
        created_at: comment.created_at,
        replies: Vec::new(),
    }
}

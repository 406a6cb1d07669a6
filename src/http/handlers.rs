use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::app::auth::AuthService;
use crate::app::comments::{build_comment_tree, CommentService, CreateCommentOutcome};
use crate::app::engagement::EngagementService;
use crate::app::karma::KarmaService;
use crate::app::posts::PostService;
use crate::app::resolver::TargetResolver;
use crate::domain::comment::CommentNode;
use crate::domain::karma::{LeaderboardRow, LikeState, TargetRef};
use crate::http::{AppError, AuthUser};
use crate::AppState;

const MAX_USERNAME_LEN: usize = 30;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_POST_LEN: usize = 5000;
const MAX_COMMENT_LEN: usize = 1000;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let username = payload.username.trim();
    if username.is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::bad_request("username must be at most 30 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = AuthService::new(state.db.clone(), state.session_ttl_hours);
    let user = service
        .signup(username.to_string(), payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to sign up");
            AppError::internal("failed to sign up")
        })?;

    let user = user.ok_or_else(|| AppError::conflict("username already taken"))?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: user.id,
            username: user.username,
            created_at: user.created_at,
        }),
    ))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: i64,
    pub username: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.username.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }

    let service = AuthService::new(state.db.clone(), state.session_ttl_hours);
    let outcome = service
        .login(payload.username.trim(), &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to log in");
            AppError::internal("failed to log in")
        })?;

    let outcome = outcome.ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    Ok(Json(LoginResponse {
        token: outcome.token,
        user_id: outcome.user.id,
        username: outcome.user.username,
    }))
}

#[derive(Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct PostResponse {
    pub id: i64,
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub like_count: i64,
    pub is_liked: bool,
    pub comments_count: i64,
}

pub async fn list_posts(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let limit = query.limit.unwrap_or(50);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }
    let viewer_id = auth.map(|user| user.user_id);

    let posts = PostService::new(state.db.clone())
        .list_posts(limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list posts");
            AppError::internal("failed to list posts")
        })?;

    let targets: Vec<TargetRef> = posts.iter().map(|post| TargetRef::post(post.id)).collect();
    let annotations = KarmaService::new(state.db.clone())
        .batch_annotate(&targets, viewer_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to annotate posts");
            AppError::internal("failed to list posts")
        })?;

    let post_ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
    let comment_counts = CommentService::new(state.db.clone())
        .counts_by_post(&post_ids)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to count comments");
            AppError::internal("failed to list posts")
        })?;

    let items = posts
        .into_iter()
        .map(|post| {
            let annotation = annotations
                .get(&TargetRef::post(post.id))
                .copied()
                .unwrap_or_default();
            PostResponse {
                id: post.id,
                author: post.author,
                content: post.content,
                created_at: post.created_at,
                like_count: annotation.like_count,
                is_liked: annotation.is_liked,
                comments_count: comment_counts.get(&post.id).copied().unwrap_or(0),
            }
        })
        .collect();

    Ok(Json(items))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("post content cannot be empty"));
    }
    if payload.content.chars().count() > MAX_POST_LEN {
        return Err(AppError::bad_request("post content exceeds 5000 characters"));
    }

    let post = PostService::new(state.db.clone())
        .create_post(auth.user_id, payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            id: post.id,
            author: post.author,
            content: post.content,
            created_at: post.created_at,
            like_count: 0,
            is_liked: false,
            comments_count: 0,
        }),
    ))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
    pub parent_id: Option<i64>,
}

#[derive(Serialize)]
pub struct CommentCreatedResponse {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn comment_post(
    Path(id): Path<i64>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CommentCreatedResponse>), AppError> {
    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("comment content cannot be empty"));
    }
    if payload.content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request("comment content exceeds 1000 characters"));
    }

    let outcome = CommentService::new(state.db.clone())
        .create_comment(auth.user_id, id, payload.parent_id, payload.content)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = id, user_id = auth.user_id, "failed to comment");
            AppError::internal("failed to comment")
        })?;

    let comment = match outcome {
        CreateCommentOutcome::Created(comment) => comment,
        CreateCommentOutcome::NotFound => {
            return Err(AppError::not_found("post or parent comment not found"));
        }
        CreateCommentOutcome::TooDeep => {
            return Err(AppError::bad_request("reply nesting is too deep"));
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(CommentCreatedResponse {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author: comment.author,
            content: comment.content,
            created_at: comment.created_at,
        }),
    ))
}

pub async fn list_post_comments(
    Path(id): Path<i64>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
) -> Result<Json<Vec<CommentNode>>, AppError> {
    let viewer_id = auth.map(|user| user.user_id);

    let resolver = TargetResolver::new(state.db.clone());
    let post_exists = resolver.exists(TargetRef::post(id)).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = id, "failed to resolve post");
        AppError::internal("failed to list comments")
    })?;
    if !post_exists {
        return Err(AppError::not_found("post not found"));
    }

    let comments = CommentService::new(state.db.clone())
        .list_for_post(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = id, "failed to list comments");
            AppError::internal("failed to list comments")
        })?;

    let targets: Vec<TargetRef> = comments
        .iter()
        .map(|comment| TargetRef::comment(comment.id))
        .collect();
    let annotations = KarmaService::new(state.db.clone())
        .batch_annotate(&targets, viewer_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = id, "failed to annotate comments");
            AppError::internal("failed to list comments")
        })?;

    Ok(Json(build_comment_tree(&comments, &annotations)))
}

#[derive(Deserialize)]
pub struct ToggleLikeRequest {
    #[serde(rename = "type")]
    pub target_type: String,
    pub id: i64,
}

#[derive(Serialize)]
pub struct ToggleLikeResponse {
    pub status: LikeState,
    pub like_count: i64,
}

pub async fn toggle_like(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ToggleLikeRequest>,
) -> Result<Json<ToggleLikeResponse>, AppError> {
    let target = TargetResolver::resolve(&payload.target_type, payload.id)
        .ok_or_else(|| AppError::bad_request("unknown target type"))?;

    let outcome = EngagementService::new(state.db.clone())
        .toggle_like(auth.user_id, target)
        .await
        .map_err(|err| {
            tracing::error!(
                error = ?err,
                user_id = auth.user_id,
                target_id = payload.id,
                target_type = %payload.target_type,
                "failed to toggle like"
            );
            AppError::internal("failed to toggle like")
        })?;

    let outcome = outcome.ok_or_else(|| AppError::not_found("target not found"))?;

    Ok(Json(ToggleLikeResponse {
        status: outcome.state,
        like_count: outcome.like_count,
    }))
}

pub async fn leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardRow>>, AppError> {
    let window = Duration::hours(state.leaderboard_window_hours as i64);
    let ranking = KarmaService::new(state.db.clone())
        .leaderboard(window, state.leaderboard_limit)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to compute leaderboard");
            AppError::internal("failed to compute leaderboard")
        })?;

    Ok(Json(ranking))
}

use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(handlers::signup))
        .route("/auth/login", post(handlers::login))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", get(handlers::list_posts))
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id/comments", get(handlers::list_post_comments))
        .route("/posts/:id/comments", post(handlers::comment_post))
}

pub fn likes() -> Router<AppState> {
    Router::new().route("/likes/toggle", post(handlers::toggle_like))
}

pub fn leaderboard() -> Router<AppState> {
    Router::new().route("/leaderboard", get(handlers::leaderboard))
}

//! Signup & Session Tests

mod common;

use axum::http::StatusCode;
use common::{app, DEFAULT_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn signup_and_login() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/signup",
            json!({"username": "alice", "password": DEFAULT_PASSWORD}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json()["username"], "alice");

    let resp = app
        .post_json(
            "/auth/login",
            json!({"username": "alice", "password": DEFAULT_PASSWORD}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["token"].as_str().unwrap().len() > 32);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = app().await;
    app.create_user("dupe").await;

    let resp = app
        .post_json(
            "/auth/signup",
            json!({"username": "testuser_dupe", "password": DEFAULT_PASSWORD}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "username already taken");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = app().await;
    app.create_user("badpass").await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({"username": "testuser_badpass", "password": "not-the-password"}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_username_is_unauthorized() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/login",
            json!({"username": "nobody", "password": DEFAULT_PASSWORD}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let app = app().await;

    let resp = app
        .post_json("/posts", json!({"content": "hi"}), Some("not-a-real-token"))
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blank_signup_fields_are_rejected() {
    let app = app().await;

    let resp = app
        .post_json(
            "/auth/signup",
            json!({"username": "  ", "password": DEFAULT_PASSWORD}),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app().await;

    let resp = app.get("/health", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}

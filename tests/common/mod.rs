#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::ServiceExt;

use kudos::config::AppConfig;
use kudos::infra::db::Db;
use kudos::AppState;

pub const DEFAULT_PASSWORD: &str = "testpassword123";

/// Self-contained app instance over a fresh SQLite database in a tempdir.
/// Each test builds its own so tests stay independent and fully parallel.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _tmp: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

pub async fn app() -> TestApp {
    TestApp::setup().await
}

impl TestApp {
    async fn setup() -> Self {
        let tmp = tempfile::tempdir().expect("failed to create tempdir");
        let database_url = format!("sqlite://{}", tmp.path().join("kudos_test.db").display());

        let config = AppConfig {
            http_addr: "127.0.0.1:0".into(),
            database_url,
            db_max_connections: 5,
            db_busy_timeout_seconds: 5,
            session_ttl_hours: 24,
            // Wide limit so rankings from a single test are always visible.
            leaderboard_window_hours: 24,
            leaderboard_limit: 100,
        };

        let db = Db::connect(&config).await.expect("Db::connect failed");

        let state = AppState {
            db,
            session_ttl_hours: config.session_ttl_hours,
            leaderboard_window_hours: config.leaderboard_window_hours,
            leaderboard_limit: config.leaderboard_limit,
        };

        let router = kudos::http::router(state.clone());

        TestApp {
            router,
            state,
            _tmp: tmp,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    /// Register and log a user in through the API. Returns the bearer token.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let username = format!("testuser_{}", suffix);

        let resp = self
            .post_json(
                "/auth/signup",
                json!({"username": username, "password": DEFAULT_PASSWORD}),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "signup failed: {}", resp.error_message());
        let id = resp.json()["id"].as_i64().expect("signup returned no id");

        let resp = self
            .post_json(
                "/auth/login",
                json!({"username": username, "password": DEFAULT_PASSWORD}),
                None,
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "login failed: {}", resp.error_message());
        let token = resp.json()["token"]
            .as_str()
            .expect("login returned no token")
            .to_string();

        TestUser {
            id,
            username,
            token,
        }
    }

    pub async fn create_post(&self, token: &str, content: &str) -> i64 {
        let resp = self
            .post_json("/posts", json!({"content": content}), Some(token))
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create post failed: {}", resp.error_message());
        resp.json()["id"].as_i64().expect("post has no id")
    }

    pub async fn create_comment(
        &self,
        token: &str,
        post_id: i64,
        parent_id: Option<i64>,
        content: &str,
    ) -> i64 {
        let resp = self
            .post_json(
                &format!("/posts/{}/comments", post_id),
                json!({"content": content, "parent_id": parent_id}),
                Some(token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::CREATED, "create comment failed: {}", resp.error_message());
        resp.json()["id"].as_i64().expect("comment has no id")
    }

    /// Direct pool access for DB-level assertions.
    pub fn pool(&self) -> &SqlitePool {
        self.state.db.pool()
    }
}

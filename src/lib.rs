pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::infra::db::Db;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub session_ttl_hours: u64,
    pub leaderboard_window_hours: u64,
    pub leaderboard_limit: i64,
}

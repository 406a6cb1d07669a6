pub mod auth;
pub mod comments;
pub mod engagement;
pub mod karma;
pub mod posts;
pub mod resolver;

pub mod comment;
pub mod karma;
pub mod post;
pub mod user;

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};

use crate::domain::user::User;
use crate::infra::db::{from_unix_ms, unix_ms, Db};

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    session_ttl_hours: u64,
}

impl AuthService {
    pub fn new(db: Db, session_ttl_hours: u64) -> Self {
        Self {
            db,
            session_ttl_hours,
        }
    }

    /// Registers a new user. `None` means the username is already taken.
    pub async fn signup(&self, username: String, password: String) -> Result<Option<User>> {
        let password_hash = hash_password(&password)?;
        let created_at = OffsetDateTime::now_utc();

        let row = sqlx::query(
            "INSERT INTO users (username, password_hash, created_at) \
             VALUES (?, ?, ?) \
             ON CONFLICT (username) DO NOTHING \
             RETURNING id, username, created_at",
        )
        .bind(&username)
        .bind(password_hash)
        .bind(unix_ms(created_at))
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Some(User {
                id: row.get("id"),
                username: row.get("username"),
                created_at: from_unix_ms(row.get("created_at"))?,
            })),
            None => Ok(None),
        }
    }

    /// Verifies credentials and issues an opaque session token. Only the
    /// SHA-256 of the token is stored. `None` on bad credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<LoginOutcome>> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let user = User {
            id: row.get("id"),
            username: row.get("username"),
            created_at: from_unix_ms(row.get("created_at"))?,
        };

        let token = generate_token();
        let now = OffsetDateTime::now_utc();
        let expires_at = now + Duration::hours(self.session_ttl_hours as i64);

        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(hash_token(&token))
        .bind(user.id)
        .bind(unix_ms(now))
        .bind(unix_ms(expires_at))
        .execute(self.db.pool())
        .await?;

        Ok(Some(LoginOutcome { user, token }))
    }

    /// Resolves a bearer token to a live session. `None` for unknown or
    /// expired tokens.
    pub async fn authenticate(&self, token: &str) -> Result<Option<AuthSession>> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > ?",
        )
        .bind(hash_token(token))
        .bind(unix_ms(OffsetDateTime::now_utc()))
        .fetch_optional(self.db.pool())
        .await?;

        Ok(user_id.map(|user_id| AuthSession { user_id }))
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|err| anyhow!("invalid stored password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

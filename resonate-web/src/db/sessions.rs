//! Login sessions
//!
//! The client holds an opaque random token; only its SHA-256 digest is
//! stored, so a leaked database does not leak usable sessions.

use chrono::Duration;
use rand::RngCore;
use resonate_common::db::{User, UserId};
use resonate_common::time::{now, to_db_string};
use resonate_common::{Error, Result};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tracing::debug;

/// Hex-encoded SHA-256 of a session token
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Start a session for `user_id`, returning the token to hand to the client
pub async fn create_session(pool: &SqlitePool, user_id: UserId, ttl: Duration) -> Result<String> {
    let token = generate_token();
    let created_at = now();
    let expires_at = created_at
        .checked_add_signed(ttl)
        .ok_or_else(|| Error::Config(format!("Session lifetime {} is out of range", ttl)))?;

    sqlx::query(
        r#"
        INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(hash_token(&token))
    .bind(user_id)
    .bind(to_db_string(&created_at))
    .bind(to_db_string(&expires_at))
    .execute(pool)
    .await?;

    debug!("Started session for user {}", user_id);
    Ok(token)
}

/// Resolve a token to its user
///
/// Expired sessions are deleted when encountered and resolve to `None`.
pub async fn find_session_user(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let token_hash = hash_token(token);

    let row = sqlx::query(
        r#"
        SELECT u.id, u.username, u.email, u.password_hash, u.bio, u.instrument,
               u.location, u.genres, u.avatar_url, u.date_joined,
               s.expires_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = ?
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let expires_at: String = sqlx::Row::try_get(&row, "expires_at")?;
    if expires_at <= to_db_string(&now()) {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(&token_hash)
            .execute(pool)
            .await?;
        debug!("Dropped expired session");
        return Ok(None);
    }

    User::from_row(&row).map(Some)
}

pub async fn delete_session(pool: &SqlitePool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(hash_token(token))
        .execute(pool)
        .await?;

    Ok(())
}

/// Revoke every session a user holds
pub async fn delete_user_sessions(pool: &SqlitePool, user_id: UserId) -> Result<u64> {
    let done = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(done.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{create_user, NewUser};
    use resonate_common::db::init_memory_database;

    async fn setup() -> (SqlitePool, User) {
        let pool = init_memory_database().await.unwrap();
        let user = create_user(
            &pool,
            &NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "x".to_string(),
            },
        )
        .await
        .unwrap();
        (pool, user)
    }

    #[test]
    fn test_hash_token_is_hex_sha256() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_tokens_are_random() {
        let first = generate_token();
        assert_eq!(first.len(), 64);
        assert_ne!(first, generate_token());
    }

    #[tokio::test]
    async fn test_out_of_range_lifetime_is_an_error() {
        let (pool, user) = setup().await;
        let result = create_session(&pool, user.id, Duration::days(100_000_000)).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let (pool, user) = setup().await;
        let token = create_session(&pool, user.id, Duration::hours(1)).await.unwrap();

        let found = find_session_user(&pool, &token).await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        delete_session(&pool, &token).await.unwrap();
        assert!(find_session_user(&pool, &token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_not_stored_in_clear() {
        let (pool, user) = setup().await;
        let token = create_session(&pool, user.id, Duration::hours(1)).await.unwrap();

        let stored: String = sqlx::query_scalar("SELECT token_hash FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_ne!(stored, token);
        assert_eq!(stored, hash_token(&token));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected_and_removed() {
        let (pool, user) = setup().await;
        let token = create_session(&pool, user.id, Duration::seconds(-1)).await.unwrap();

        assert!(find_session_user(&pool, &token).await.unwrap().is_none());

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_delete_user_sessions() {
        let (pool, user) = setup().await;
        let first = create_session(&pool, user.id, Duration::hours(1)).await.unwrap();
        let second = create_session(&pool, user.id, Duration::hours(1)).await.unwrap();

        assert_eq!(delete_user_sessions(&pool, user.id).await.unwrap(), 2);
        assert!(find_session_user(&pool, &first).await.unwrap().is_none());
        assert!(find_session_user(&pool, &second).await.unwrap().is_none());
    }
}

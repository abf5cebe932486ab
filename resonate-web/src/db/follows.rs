//! Follow graph (toggle relation between users)

use resonate_common::db::UserId;
use resonate_common::time::{now, to_db_string};
use resonate_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::debug;

pub async fn is_following(pool: &SqlitePool, follower: UserId, followee: UserId) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = ? AND followee_id = ?)",
    )
    .bind(follower)
    .bind(followee)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}

/// Flip the follow edge `follower → followee`
///
/// Returns `true` when the edge exists afterwards. Following yourself is
/// rejected with `Error::InvalidInput` and leaves the graph untouched.
pub async fn toggle_follow(pool: &SqlitePool, follower: UserId, followee: UserId) -> Result<bool> {
    if follower == followee {
        return Err(Error::InvalidInput("You cannot follow yourself.".to_string()));
    }

    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
        .bind(follower)
        .bind(followee)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        sqlx::query("INSERT INTO follows (follower_id, followee_id, created_at) VALUES (?, ?, ?)")
            .bind(follower)
            .bind(followee)
            .bind(to_db_string(&now()))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let following = removed == 0;
    debug!("User {} follow {} -> {}", follower, followee, following);
    Ok(following)
}

pub async fn follower_count(pool: &SqlitePool, user_id: UserId) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followee_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

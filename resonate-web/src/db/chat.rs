//! Two-party chat threads and their messages
//!
//! A pair of users shares at most one thread. Lookups are symmetric and the
//! `idx_chat_threads_pair` index rejects a second row for the same pair, so
//! concurrent starts converge on one thread.

use resonate_common::db::{ChatThread, Message, ThreadId, UserId, UserSummary};
use resonate_common::time::{now, parse_db_string, to_db_string};
use resonate_common::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::debug;

const THREAD_COLUMNS: &str = "id, user1_id, user2_id, created_at, updated_at";

/// One row of a user's inbox
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub thread_id: ThreadId,
    pub other_user: UserSummary,
    pub updated_at: DateTime<Utc>,
    /// Content of the newest message, if any
    pub last_message: Option<String>,
}

async fn find_pair(pool: &SqlitePool, a: UserId, b: UserId) -> Result<Option<ChatThread>> {
    let row = sqlx::query(&format!(
        r#"
        SELECT {} FROM chat_threads
        WHERE (user1_id = ?1 AND user2_id = ?2) OR (user1_id = ?2 AND user2_id = ?1)
        "#,
        THREAD_COLUMNS
    ))
    .bind(a)
    .bind(b)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(ChatThread::from_row).transpose()
}

/// Return the thread between `current` and `other`, creating it if needed
///
/// Whichever order the two users are given in, the same thread comes back.
pub async fn get_or_create_thread(pool: &SqlitePool, current: UserId, other: UserId) -> Result<ChatThread> {
    if current == other {
        return Err(Error::InvalidInput("You cannot start a chat with yourself.".to_string()));
    }

    if let Some(thread) = find_pair(pool, current, other).await? {
        return Ok(thread);
    }

    let stamp = to_db_string(&now());
    let result = sqlx::query(
        r#"
        INSERT INTO chat_threads (user1_id, user2_id, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(current)
    .bind(other)
    .bind(&stamp)
    .bind(&stamp)
    .execute(pool)
    .await;

    match result {
        Ok(done) if done.rows_affected() > 0 => {
            debug!("Started chat thread {} between {} and {}", done.last_insert_rowid(), current, other);
        }
        Ok(_) => debug!("Chat thread between {} and {} created concurrently", current, other),
        Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
            return Err(Error::NotFound(format!("user {}", other)))
        }
        Err(e) => return Err(e.into()),
    }

    find_pair(pool, current, other)
        .await?
        .ok_or_else(|| Error::Internal(format!("chat thread for {} and {} vanished", current, other)))
}

pub async fn find_thread(pool: &SqlitePool, id: ThreadId) -> Result<Option<ChatThread>> {
    let row = sqlx::query(&format!("SELECT {} FROM chat_threads WHERE id = ?", THREAD_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(ChatThread::from_row).transpose()
}

/// Threads `user` takes part in, most recently active first
pub async fn list_inbox(pool: &SqlitePool, user: UserId) -> Result<Vec<InboxEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT t.id AS thread_id, t.updated_at,
               u.id AS author_id, u.username AS author_username,
               u.instrument AS author_instrument, u.avatar_url AS author_avatar_url,
               (SELECT m.content FROM messages m
                WHERE m.thread_id = t.id
                ORDER BY m.created_at DESC, m.id DESC
                LIMIT 1) AS last_message
        FROM chat_threads t
        JOIN users u
          ON u.id = CASE WHEN t.user1_id = ?1 THEN t.user2_id ELSE t.user1_id END
        WHERE t.user1_id = ?1 OR t.user2_id = ?1
        ORDER BY t.updated_at DESC, t.id DESC
        "#,
    )
    .bind(user)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(InboxEntry {
                thread_id: row.try_get("thread_id")?,
                other_user: UserSummary {
                    id: row.try_get("author_id")?,
                    username: row.try_get("author_username")?,
                    instrument: row.try_get("author_instrument")?,
                    avatar_url: row.try_get("author_avatar_url")?,
                },
                updated_at: parse_db_string(&row.try_get::<String, _>("updated_at")?)?,
                last_message: row.try_get("last_message")?,
            })
        })
        .collect()
}

/// Messages of a thread, oldest first
pub async fn list_messages(pool: &SqlitePool, thread: ThreadId) -> Result<Vec<Message>> {
    let rows = sqlx::query(
        r#"
        SELECT m.id, m.thread_id, m.content, m.created_at,
               u.id AS author_id, u.username AS author_username,
               u.instrument AS author_instrument, u.avatar_url AS author_avatar_url
        FROM messages m
        JOIN users u ON u.id = m.sender_id
        WHERE m.thread_id = ?
        ORDER BY m.created_at ASC, m.id ASC
        "#,
    )
    .bind(thread)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Message::from_row).collect()
}

/// Append a message and mark the thread as active
///
/// The `updated_at` bump and the insert share one transaction and one
/// timestamp. The bump runs first so the transaction holds the write lock
/// from its first statement. A sender outside the thread is
/// `Error::InvalidInput`.
pub async fn post_message(pool: &SqlitePool, thread: ThreadId, sender: UserId, content: &str) -> Result<Message> {
    let stamp = to_db_string(&now());
    let mut tx = pool.begin().await?;

    let bumped = sqlx::query(
        "UPDATE chat_threads SET updated_at = ?1 WHERE id = ?2 AND (user1_id = ?3 OR user2_id = ?3)",
    )
    .bind(&stamp)
    .bind(thread)
    .bind(sender)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if bumped == 0 {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM chat_threads WHERE id = ?)")
            .bind(thread)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(Error::NotFound(format!("chat thread {}", thread)));
        }
        return Err(Error::InvalidInput(format!(
            "user {} is not a participant of thread {}",
            sender, thread
        )));
    }

    let id = sqlx::query("INSERT INTO messages (thread_id, sender_id, content, created_at) VALUES (?, ?, ?, ?)")
        .bind(thread)
        .bind(sender)
        .bind(content)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    tx.commit().await?;

    debug!("User {} posted message {} in thread {}", sender, id, thread);

    let row = sqlx::query(
        r#"
        SELECT m.id, m.thread_id, m.content, m.created_at,
               u.id AS author_id, u.username AS author_username,
               u.instrument AS author_instrument, u.avatar_url AS author_avatar_url
        FROM messages m
        JOIN users u ON u.id = m.sender_id
        WHERE m.id = ?
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Message::from_row(&row)
}

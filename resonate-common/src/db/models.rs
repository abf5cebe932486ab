//! Database models
//!
//! Row types shared by the store modules. Each `from_row` expects the
//! column names used by the `SELECT` lists in `resonate-web`'s `db` modules.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::time::parse_db_string;
use crate::Result;

pub type UserId = i64;
pub type PostId = i64;
pub type CommentId = i64;
pub type ThreadId = i64;
pub type MessageId = i64;

/// Account record plus musician profile fields
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub bio: String,
    pub instrument: String,
    pub location: String,
    pub genres: String,
    pub avatar_url: Option<String>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            bio: row.try_get("bio")?,
            instrument: row.try_get("instrument")?,
            location: row.try_get("location")?,
            genres: row.try_get("genres")?,
            avatar_url: row.try_get("avatar_url")?,
            date_joined: parse_db_string(&row.try_get::<String, _>("date_joined")?)?,
        })
    }

    /// Public view of the user, safe to embed in other responses
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            username: self.username.clone(),
            instrument: self.instrument.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Compact user reference embedded in posts, comments and threads
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub instrument: String,
    pub avatar_url: Option<String>,
}

/// A post joined with its author and engagement counts
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: PostId,
    pub author: UserSummary,
    pub content: String,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
}

impl Post {
    /// Expects `author_*` columns from a join on `users`
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            author: author_from_row(row)?,
            content: row.try_get("content")?,
            media_url: row.try_get("media_url")?,
            created_at: parse_db_string(&row.try_get::<String, _>("created_at")?)?,
            like_count: row.try_get("like_count")?,
            comment_count: row.try_get("comment_count")?,
        })
    }
}

/// A comment joined with its author
#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            post_id: row.try_get("post_id")?,
            author: author_from_row(row)?,
            content: row.try_get("content")?,
            created_at: parse_db_string(&row.try_get::<String, _>("created_at")?)?,
        })
    }
}

/// Two-party conversation container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatThread {
    pub id: ThreadId,
    pub user1_id: UserId,
    pub user2_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatThread {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            user1_id: row.try_get("user1_id")?,
            user2_id: row.try_get("user2_id")?,
            created_at: parse_db_string(&row.try_get::<String, _>("created_at")?)?,
            updated_at: parse_db_string(&row.try_get::<String, _>("updated_at")?)?,
        })
    }

    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The participant that is not `user_id`
    ///
    /// Only meaningful when `user_id` is a participant.
    pub fn other_participant(&self, user_id: UserId) -> UserId {
        if self.user2_id == user_id {
            self.user1_id
        } else {
            self.user2_id
        }
    }
}

/// A message within a thread
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub thread_id: ThreadId,
    pub sender: UserSummary,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            thread_id: row.try_get("thread_id")?,
            sender: author_from_row(row)?,
            content: row.try_get("content")?,
            created_at: parse_db_string(&row.try_get::<String, _>("created_at")?)?,
        })
    }
}

fn author_from_row(row: &SqliteRow) -> Result<UserSummary> {
    Ok(UserSummary {
        id: row.try_get("author_id")?,
        username: row.try_get("author_username")?,
        instrument: row.try_get("author_instrument")?,
        avatar_url: row.try_get("author_avatar_url")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    fn thread(user1_id: UserId, user2_id: UserId) -> ChatThread {
        ChatThread {
            id: 1,
            user1_id,
            user2_id,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn test_other_participant_from_either_side() {
        let t = thread(10, 20);
        assert_eq!(t.other_participant(10), 20);
        assert_eq!(t.other_participant(20), 10);
    }

    #[test]
    fn test_is_participant() {
        let t = thread(10, 20);
        assert!(t.is_participant(10));
        assert!(t.is_participant(20));
        assert!(!t.is_participant(30));
    }
}

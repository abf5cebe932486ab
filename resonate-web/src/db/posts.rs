//! Posts, likes and comments
//!
//! Deleting a post relies on the `ON DELETE CASCADE` foreign keys declared
//! on `comments` and `likes`.

use resonate_common::db::{Comment, CommentId, Post, PostId, UserId};
use resonate_common::time::{now, to_db_string};
use resonate_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, warn};

const POST_SELECT: &str = r#"
    SELECT p.id, p.content, p.media_url, p.created_at,
           u.id AS author_id, u.username AS author_username,
           u.instrument AS author_instrument, u.avatar_url AS author_avatar_url,
           (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.content, c.created_at,
           u.id AS author_id, u.username AS author_username,
           u.instrument AS author_instrument, u.avatar_url AS author_avatar_url
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

/// Outcome of an owner-checked delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The row exists but belongs to someone else; nothing was removed
    NotOwner,
}

pub async fn create_post(
    pool: &SqlitePool,
    author: UserId,
    content: &str,
    media_url: Option<&str>,
) -> Result<Post> {
    let id = sqlx::query("INSERT INTO posts (author_id, content, media_url, created_at) VALUES (?, ?, ?, ?)")
        .bind(author)
        .bind(content)
        .bind(media_url)
        .bind(to_db_string(&now()))
        .execute(pool)
        .await?
        .last_insert_rowid();

    debug!("User {} created post {}", author, id);
    get_post(pool, id).await
}

pub async fn find_post(pool: &SqlitePool, id: PostId) -> Result<Option<Post>> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?", POST_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(Post::from_row).transpose()
}

pub async fn get_post(pool: &SqlitePool, id: PostId) -> Result<Post> {
    find_post(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("post {}", id)))
}

/// Every post, newest first
pub async fn list_recent(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY p.created_at DESC, p.id DESC LIMIT ? OFFSET ?",
        POST_SELECT
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Post::from_row).collect()
}

pub async fn count_all(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

const FEED_WHERE: &str = r#"
    WHERE p.author_id = ?1
       OR p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ?1)
"#;

/// Posts by `viewer` and everyone they follow, newest first
pub async fn list_feed(pool: &SqlitePool, viewer: UserId, limit: i64, offset: i64) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!(
        "{} {} ORDER BY p.created_at DESC, p.id DESC LIMIT ?2 OFFSET ?3",
        POST_SELECT, FEED_WHERE
    ))
    .bind(viewer)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Post::from_row).collect()
}

pub async fn count_feed(pool: &SqlitePool, viewer: UserId) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM posts p {}", FEED_WHERE))
        .bind(viewer)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Posts written by one user, newest first
pub async fn list_by_author(pool: &SqlitePool, author: UserId) -> Result<Vec<Post>> {
    let rows = sqlx::query(&format!(
        "{} WHERE p.author_id = ? ORDER BY p.created_at DESC, p.id DESC",
        POST_SELECT
    ))
    .bind(author)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Post::from_row).collect()
}

/// Delete a post if `actor` wrote it; comments and likes go with it
pub async fn delete_post(pool: &SqlitePool, id: PostId, actor: UserId) -> Result<DeleteOutcome> {
    let author: Option<UserId> = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match author {
        None => Err(Error::NotFound(format!("post {}", id))),
        Some(author) if author != actor => {
            warn!("User {} tried to delete post {} owned by {}", actor, id, author);
            Ok(DeleteOutcome::NotOwner)
        }
        Some(_) => {
            sqlx::query("DELETE FROM posts WHERE id = ? AND author_id = ?")
                .bind(id)
                .bind(actor)
                .execute(pool)
                .await?;
            debug!("User {} deleted post {}", actor, id);
            Ok(DeleteOutcome::Deleted)
        }
    }
}

pub async fn has_liked(pool: &SqlitePool, post: PostId, user: UserId) -> Result<bool> {
    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM likes WHERE post_id = ? AND user_id = ?)")
            .bind(post)
            .bind(user)
            .fetch_one(pool)
            .await?;
    Ok(exists)
}

pub async fn like_count(pool: &SqlitePool, post: PostId) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = ?")
        .bind(post)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Flip `user`'s like on `post`
///
/// Returns `true` when the post is liked afterwards. Unknown posts are
/// `Error::NotFound`; liking your own post is `Error::InvalidInput`. The
/// delete runs first so the transaction holds the write lock before it
/// reads anything.
pub async fn toggle_like(pool: &SqlitePool, post: PostId, user: UserId) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query("DELETE FROM likes WHERE post_id = ? AND user_id = ?")
        .bind(post)
        .bind(user)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if removed == 0 {
        let author: Option<UserId> = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = ?")
            .bind(post)
            .fetch_optional(&mut *tx)
            .await?;

        match author {
            None => return Err(Error::NotFound(format!("post {}", post))),
            Some(author) if author == user => {
                return Err(Error::InvalidInput("You cannot like your own post.".to_string()))
            }
            Some(_) => {}
        }

        sqlx::query("INSERT INTO likes (post_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(post)
            .bind(user)
            .bind(to_db_string(&now()))
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let liked = removed == 0;
    debug!("User {} like on post {} -> {}", user, post, liked);
    Ok(liked)
}

pub async fn add_comment(pool: &SqlitePool, post: PostId, author: UserId, content: &str) -> Result<Comment> {
    let result = sqlx::query("INSERT INTO comments (post_id, author_id, content, created_at) VALUES (?, ?, ?, ?)")
        .bind(post)
        .bind(author)
        .bind(content)
        .bind(to_db_string(&now()))
        .execute(pool)
        .await;

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
            return Err(Error::NotFound(format!("post {}", post)))
        }
        Err(e) => return Err(e.into()),
    };

    get_comment(pool, id).await
}

pub async fn get_comment(pool: &SqlitePool, id: CommentId) -> Result<Comment> {
    let row = sqlx::query(&format!("{} WHERE c.id = ?", COMMENT_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound(format!("comment {}", id)))?;

    Comment::from_row(&row)
}

/// Comments on a post, oldest first
pub async fn list_comments(pool: &SqlitePool, post: PostId) -> Result<Vec<Comment>> {
    let rows = sqlx::query(&format!(
        "{} WHERE c.post_id = ? ORDER BY c.created_at ASC, c.id ASC",
        COMMENT_SELECT
    ))
    .bind(post)
    .fetch_all(pool)
    .await?;

    rows.iter().map(Comment::from_row).collect()
}

/// Delete a comment if `actor` wrote it
///
/// Returns the outcome together with the parent post id, which callers use
/// to send the user back to the post.
pub async fn delete_comment(
    pool: &SqlitePool,
    id: CommentId,
    actor: UserId,
) -> Result<(DeleteOutcome, PostId)> {
    let row: Option<(UserId, PostId)> =
        sqlx::query_as("SELECT author_id, post_id FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    let Some((author, post)) = row else {
        return Err(Error::NotFound(format!("comment {}", id)));
    };

    if author != actor {
        warn!("User {} tried to delete comment {} owned by {}", actor, id, author);
        return Ok((DeleteOutcome::NotOwner, post));
    }

    sqlx::query("DELETE FROM comments WHERE id = ? AND author_id = ?")
        .bind(id)
        .bind(actor)
        .execute(pool)
        .await?;

    debug!("User {} deleted comment {}", actor, id);
    Ok((DeleteOutcome::Deleted, post))
}

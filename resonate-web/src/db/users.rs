//! User accounts and musician profiles

use resonate_common::db::{User, UserId};
use resonate_common::time::{now, to_db_string};
use resonate_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

const USER_COLUMNS: &str = "id, username, email, password_hash, bio, instrument, location, genres, avatar_url, date_joined";

/// Account fields supplied at signup
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Editable profile fields
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: String,
    pub bio: String,
    pub instrument: String,
    pub location: String,
    pub genres: String,
    pub avatar_url: Option<String>,
}

/// Filters for musician search; empty strings are ignored
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub query: String,
    pub instrument: String,
    pub location: String,
    /// Requesting user, left out of the results
    pub exclude: Option<UserId>,
}

/// Follower/following/post counters shown on a profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
}

/// Insert a new user
///
/// A taken username (compared case-insensitively) is reported as
/// `Error::InvalidInput`.
pub async fn create_user(pool: &SqlitePool, new_user: &NewUser) -> Result<User> {
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, date_joined)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&new_user.username)
    .bind(&new_user.email)
    .bind(&new_user.password_hash)
    .bind(to_db_string(&now()))
    .execute(pool)
    .await
    .map_err(Error::from);

    let id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(e) if e.is_unique_violation() => {
            return Err(Error::InvalidInput(
                "A user with that username already exists.".to_string(),
            ))
        }
        Err(e) => return Err(e),
    };

    debug!("Created user {} ({})", new_user.username, id);
    get_user(pool, id).await
}

pub async fn find_by_id(pool: &SqlitePool, id: UserId) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(User::from_row).transpose()
}

/// Case-insensitive lookup
pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM users WHERE username = ? COLLATE NOCASE",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(User::from_row).transpose()
}

pub async fn get_user(pool: &SqlitePool, id: UserId) -> Result<User> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {}", id)))
}

pub async fn get_by_username(pool: &SqlitePool, username: &str) -> Result<User> {
    find_by_username(pool, username)
        .await?
        .ok_or_else(|| Error::NotFound(format!("user '{}'", username)))
}

pub async fn update_profile(pool: &SqlitePool, id: UserId, update: &ProfileUpdate) -> Result<User> {
    let done = sqlx::query(
        r#"
        UPDATE users
        SET email = ?, bio = ?, instrument = ?, location = ?, genres = ?, avatar_url = ?
        WHERE id = ?
        "#,
    )
    .bind(&update.email)
    .bind(&update.bio)
    .bind(&update.instrument)
    .bind(&update.location)
    .bind(&update.genres)
    .bind(&update.avatar_url)
    .bind(id)
    .execute(pool)
    .await?;

    if done.rows_affected() == 0 {
        return Err(Error::NotFound(format!("user {}", id)));
    }

    get_user(pool, id).await
}

pub async fn set_password_hash(pool: &SqlitePool, id: UserId, password_hash: &str) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn profile_stats(pool: &SqlitePool, id: UserId) -> Result<ProfileStats> {
    let (followers, following, posts): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM follows WHERE followee_id = ?1),
            (SELECT COUNT(*) FROM follows WHERE follower_id = ?1),
            (SELECT COUNT(*) FROM posts WHERE author_id = ?1)
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    Ok(ProfileStats {
        followers,
        following,
        posts,
    })
}

/// Escape `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern
fn like_pattern(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('%');
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

const SEARCH_WHERE: &str = r#"
    WHERE (?1 = '' OR username LIKE ?2 ESCAPE '\' OR bio LIKE ?2 ESCAPE '\')
      AND (?3 = '' OR instrument LIKE ?4 ESCAPE '\')
      AND (?5 = '' OR location LIKE ?6 ESCAPE '\')
      AND (?7 IS NULL OR id <> ?7)
"#;

/// Count users matching a search filter
pub async fn count_search(pool: &SqlitePool, filter: &SearchFilter) -> Result<i64> {
    let query = filter.query.trim();
    let instrument = filter.instrument.trim();
    let location = filter.location.trim();

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {}", SEARCH_WHERE))
        .bind(query)
        .bind(like_pattern(query))
        .bind(instrument)
        .bind(like_pattern(instrument))
        .bind(location)
        .bind(like_pattern(location))
        .bind(filter.exclude)
        .fetch_one(pool)
        .await?;

    Ok(total)
}

/// Case-insensitive substring search ordered by username
pub async fn search(
    pool: &SqlitePool,
    filter: &SearchFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<User>> {
    let query = filter.query.trim();
    let instrument = filter.instrument.trim();
    let location = filter.location.trim();

    let rows = sqlx::query(&format!(
        "SELECT {} FROM users {} ORDER BY username COLLATE NOCASE ASC LIMIT ?8 OFFSET ?9",
        USER_COLUMNS, SEARCH_WHERE
    ))
    .bind(query)
    .bind(like_pattern(query))
    .bind(instrument)
    .bind(like_pattern(instrument))
    .bind(location)
    .bind(like_pattern(location))
    .bind(filter.exclude)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(User::from_row).collect()
}

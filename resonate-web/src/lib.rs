//! resonate-web library: social network for musicians
//!
//! Profiles, posts with likes and comments, a follow graph and two-party
//! chat threads, served as a JSON API over SQLite.

use axum::Router;
use resonate_common::config::MAX_SESSION_TTL_HOURS;
use sqlx::SqlitePool;
use std::time::Instant;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod forms;
pub mod pagination;
pub mod password;

pub use error::{ApiError, ApiResult};
pub use password::PasswordHasher;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub hasher: PasswordHasher,
    /// Lifetime of a new session
    pub session_ttl: chrono::Duration,
    /// Mark the session cookie `Secure`
    pub secure_cookies: bool,
    pub startup_time: Instant,
}

impl AppState {
    /// `session_ttl_hours` is clamped to `1..=MAX_SESSION_TTL_HOURS`
    pub fn new(db: SqlitePool, session_ttl_hours: i64, secure_cookies: bool) -> Self {
        let session_ttl_hours = session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS);
        Self {
            db,
            hasher: PasswordHasher::default(),
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            secure_cookies,
            startup_time: Instant::now(),
        }
    }

    /// Swap the password hasher (tests use cheap argon2 costs)
    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }
}

/// Build application router
///
/// Everything under `/accounts/` and `/chats/` requires a session except
/// signup, login and logout.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/accounts/", get(api::posts::home))
        .route("/accounts/feed/", get(api::posts::feed))
        .route("/accounts/view_post/:post_id/", get(api::posts::view_post))
        .route("/accounts/posts/create/", post(api::posts::create_post))
        .route("/accounts/post/:post_id/delete/", post(api::posts::delete_post))
        .route("/accounts/like_toggle/:post_id/", post(api::posts::like_toggle))
        .route("/accounts/post/:post_id/comment/", post(api::posts::add_comment))
        .route("/accounts/comment/:comment_id/delete/", post(api::posts::delete_comment))
        .route("/accounts/profile/", get(api::profiles::own_profile))
        .route("/accounts/profile/:username/", get(api::profiles::profile))
        .route("/accounts/musician/:user_id/", get(api::profiles::musician_detail))
        .route(
            "/accounts/edit_profile/",
            get(api::profiles::edit_profile_form).post(api::profiles::edit_profile),
        )
        .route("/accounts/follow_toggle/:username/", post(api::profiles::follow_toggle))
        .route("/accounts/search/", get(api::profiles::search))
        .route("/accounts/password-change/", post(api::accounts::password_change))
        .route("/chats/", get(api::chat::inbox))
        .route("/chats/start/:username/", get(api::chat::start_thread))
        .route(
            "/chats/:thread_id/",
            get(api::chat::view_thread).post(api::chat::post_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), api::require_login));

    let public = Router::new()
        .route("/", get(api::ui::landing))
        .route("/accounts/signup/", post(api::accounts::signup))
        .route(
            "/accounts/login/",
            get(api::ui::login_page).post(api::accounts::login),
        )
        .route("/accounts/logout/", post(api::accounts::logout))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

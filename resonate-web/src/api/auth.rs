//! Session authentication
//!
//! Protected routes sit behind [`require_login`], which resolves the
//! session token to a user and hands it to handlers as [`CurrentUser`].
//! Requests without a live session are redirected to the login page.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use resonate_common::db::User;
use tracing::debug;

use crate::db::sessions;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "resonate_session";

pub const LOGIN_PATH: &str = "/accounts/login/";

/// The authenticated user for this request
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Session token from `Authorization: Bearer` or the session cookie
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value).flatten())
        .find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

/// Resolve the request's session, if any
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<User>> {
    match session_token_from_headers(headers) {
        Some(token) => Ok(sessions::find_session_user(&state.db, &token).await?),
        None => Ok(None),
    }
}

/// Login URL that sends the user back to `path` afterwards
pub fn login_redirect(path: &str) -> String {
    format!("{}?next={}", LOGIN_PATH, path)
}

/// Middleware for routes that need a logged-in user
pub async fn require_login(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(user) = authenticate(&state, request.headers()).await? else {
        let path = request.uri().path();
        debug!("No session for {}, redirecting to login", path);
        return Err(ApiError::Redirect(login_redirect(path)));
    };

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// `Set-Cookie` value starting a session
pub fn session_cookie(state: &AppState, token: &str) -> String {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookies)
        .max_age(CookieDuration::seconds(state.session_ttl.num_seconds()))
        .build()
        .to_string()
}

/// `Set-Cookie` value that makes the browser drop the session cookie
pub fn clear_session_cookie(state: &AppState) -> String {
    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookies)
        .build();
    cookie.make_removal();
    cookie.to_string()
}

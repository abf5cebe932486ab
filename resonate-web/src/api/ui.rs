//! Static pages: landing and login

use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};

use super::auth::authenticate;
use crate::error::ApiResult;
use crate::AppState;

const LANDING_HTML: &str = include_str!("../ui/landing.html");
const LOGIN_HTML: &str = include_str!("../ui/login.html");

/// GET /
///
/// Logged-in users go straight to their profile.
pub async fn landing(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if authenticate(&state, &headers).await?.is_some() {
        return Ok(Redirect::to("/accounts/profile/").into_response());
    }
    Ok(Html(LANDING_HTML).into_response())
}

/// GET /accounts/login/
pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_HTML)
}

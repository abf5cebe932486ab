//! Signup, login, logout and password change

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use tracing::{debug, info};

use super::auth::{clear_session_cookie, session_cookie, session_token_from_headers, CurrentUser, LOGIN_PATH};
use crate::db::{sessions, users};
use crate::error::{ApiError, ApiResult, NON_FIELD_ERRORS};
use crate::forms::{CleanForm, LoginForm, PasswordChangeForm, SignupForm};
use crate::AppState;

const BAD_CREDENTIALS: &str = "Please enter a correct username and password.";

/// Argon2 is deliberately slow; keep it off the async workers
async fn hash_password(state: &AppState, password: String) -> ApiResult<String> {
    let hasher = state.hasher.clone();
    let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Password hashing task failed: {}", e)))??;
    Ok(hash)
}

async fn verify_password(state: &AppState, password: String, stored_hash: String) -> ApiResult<bool> {
    let hasher = state.hasher.clone();
    tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))
}

/// POST /accounts/signup/
pub async fn signup(State(state): State<AppState>, Json(form): Json<SignupForm>) -> ApiResult<Response> {
    let form = form.clean()?;
    let password_hash = hash_password(&state, form.password.clone()).await?;

    let new_user = users::NewUser {
        username: form.username,
        email: form.email,
        password_hash,
    };
    let user = match users::create_user(&state.db, &new_user).await {
        Ok(user) => user,
        Err(resonate_common::Error::InvalidInput(msg)) => return Err(ApiError::field("username", msg)),
        Err(e) => return Err(e.into()),
    };

    let token = sessions::create_session(&state.db, user.id, state.session_ttl).await?;
    info!("New account: {}", user.username);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&state, &token))],
        Json(user),
    )
        .into_response())
}

/// POST /accounts/login/
pub async fn login(State(state): State<AppState>, Json(form): Json<LoginForm>) -> ApiResult<Response> {
    let form = form.clean()?;

    let user = users::find_by_username(&state.db, &form.username).await?;
    let verified = match &user {
        Some(user) => verify_password(&state, form.password, user.password_hash.clone()).await?,
        None => {
            let hasher = state.hasher.clone();
            tokio::task::spawn_blocking(move || hasher.verify_absent(&form.password))
                .await
                .map_err(|e| ApiError::Internal(format!("Password check task failed: {}", e)))?
        }
    };

    let Some(user) = user.filter(|_| verified) else {
        debug!("Failed login for {}", form.username);
        return Err(ApiError::field(NON_FIELD_ERRORS, BAD_CREDENTIALS));
    };

    let token = sessions::create_session(&state.db, user.id, state.session_ttl).await?;
    debug!("User {} logged in", user.id);

    Ok(([(header::SET_COOKIE, session_cookie(&state, &token))], Json(user)).into_response())
}

/// POST /accounts/logout/
///
/// Works with or without a live session; always ends at the login page.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if let Some(token) = session_token_from_headers(&headers) {
        sessions::delete_session(&state.db, &token).await?;
    }

    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&state))],
        Redirect::to(LOGIN_PATH),
    )
        .into_response())
}

/// POST /accounts/password-change/
///
/// Every existing session of the user is revoked and a fresh one issued to
/// the caller.
pub async fn password_change(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(form): Json<PasswordChangeForm>,
) -> ApiResult<Response> {
    let form = form.for_user(&user.username).clean()?;

    if !verify_password(&state, form.old_password.clone(), user.password_hash.clone()).await? {
        return Err(ApiError::field(
            "old_password",
            "Your old password was entered incorrectly. Please enter it again.",
        ));
    }

    let password_hash = hash_password(&state, form.new_password1).await?;
    users::set_password_hash(&state.db, user.id, &password_hash).await?;

    let revoked = sessions::delete_user_sessions(&state.db, user.id).await?;
    let token = sessions::create_session(&state.db, user.id, state.session_ttl).await?;
    info!("User {} changed password, {} session(s) revoked", user.id, revoked);

    Ok((
        [(header::SET_COOKIE, session_cookie(&state, &token))],
        Redirect::to("/accounts/edit_profile/"),
    )
        .into_response())
}

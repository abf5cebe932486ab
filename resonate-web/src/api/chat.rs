//! Chat inbox and two-party threads
//!
//! Every read and write of a thread checks that the caller is one of its two
//! participants. Outsiders are sent back to their inbox without further
//! detail.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use resonate_common::db::{ChatThread, Message, ThreadId, User, UserSummary};
use serde::Serialize;
use tracing::warn;

use super::auth::CurrentUser;
use crate::db::chat::{self, InboxEntry};
use crate::db::users;
use crate::error::{ApiError, ApiResult, FieldErrors};
use crate::forms::{CleanForm, MessageForm};
use crate::AppState;

const INBOX_PATH: &str = "/chats/";

fn thread_url(thread_id: ThreadId) -> String {
    format!("/chats/{}/", thread_id)
}

/// GET /chats/
pub async fn inbox(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<InboxEntry>>> {
    Ok(Json(chat::list_inbox(&state.db, user.id).await?))
}

/// GET /chats/start/:username/
///
/// Opens (creating if needed) the thread with `username`. Starting a chat
/// with yourself lands back on the inbox.
pub async fn start_thread(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> ApiResult<Redirect> {
    let other = users::get_by_username(&state.db, &username).await?;
    if other.id == user.id {
        return Err(ApiError::Redirect(INBOX_PATH.to_string()));
    }

    let thread = chat::get_or_create_thread(&state.db, user.id, other.id).await?;
    Ok(Redirect::to(&thread_url(thread.id)))
}

/// A thread with its messages, oldest first
#[derive(Debug, Serialize)]
pub struct ThreadPage {
    pub thread: ChatThread,
    pub other_user: UserSummary,
    pub messages: Vec<Message>,
    /// Present when a submitted message was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

/// Load a thread the user takes part in
async fn participant_thread(state: &AppState, thread_id: ThreadId, user: &User) -> ApiResult<ChatThread> {
    let thread = chat::find_thread(&state.db, thread_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("chat thread {}", thread_id)))?;

    if !thread.is_participant(user.id) {
        warn!("User {} denied access to chat thread {}", user.id, thread_id);
        return Err(ApiError::Redirect(INBOX_PATH.to_string()));
    }

    Ok(thread)
}

async fn thread_page(state: &AppState, thread: ChatThread, user: &User) -> ApiResult<ThreadPage> {
    let other_user = users::get_user(&state.db, thread.other_participant(user.id))
        .await?
        .summary();
    let messages = chat::list_messages(&state.db, thread.id).await?;

    Ok(ThreadPage {
        thread,
        other_user,
        messages,
        errors: None,
    })
}

/// GET /chats/:thread_id/
pub async fn view_thread(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(thread_id): Path<ThreadId>,
) -> ApiResult<Json<ThreadPage>> {
    let thread = participant_thread(&state, thread_id, &user).await?;
    Ok(Json(thread_page(&state, thread, &user).await?))
}

/// POST /chats/:thread_id/
///
/// A valid message is stored and the client is redirected back to the
/// thread. An empty one re-renders the thread with the form errors.
pub async fn post_message(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(thread_id): Path<ThreadId>,
    Json(form): Json<MessageForm>,
) -> ApiResult<Response> {
    let thread = participant_thread(&state, thread_id, &user).await?;

    let form = match form.clean() {
        Ok(form) => form,
        Err(ApiError::Validation(errors)) => {
            let mut page = thread_page(&state, thread, &user).await?;
            page.errors = Some(errors);
            return Ok((StatusCode::BAD_REQUEST, Json(page)).into_response());
        }
        Err(e) => return Err(e),
    };

    chat::post_message(&state.db, thread.id, user.id, &form.content).await?;
    Ok(Redirect::to(&thread_url(thread.id)).into_response())
}

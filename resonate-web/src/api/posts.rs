//! Timelines, posts, likes and comments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    Extension, Json,
};
use resonate_common::db::{Comment, CommentId, Post, PostId};
use serde::{Deserialize, Serialize};

use super::auth::CurrentUser;
use crate::db::posts::{self, DeleteOutcome};
use crate::error::{ApiError, ApiResult};
use crate::forms::{CleanForm, CommentForm, PostForm};
use crate::pagination::{calculate_pagination, Page, PAGE_SIZE};
use crate::AppState;

fn post_url(post_id: PostId) -> String {
    format!("/accounts/view_post/{}/", post_id)
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// GET /accounts/
///
/// Every post, newest first.
pub async fn home(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Post>>> {
    let total = posts::count_all(&state.db).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let items = posts::list_recent(&state.db, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(pagination.into_page(items, total)))
}

/// GET /accounts/feed/
///
/// Posts by followed users and the viewer, newest first.
pub async fn feed(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<Post>>> {
    let total = posts::count_feed(&state.db, viewer.id).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let items = posts::list_feed(&state.db, viewer.id, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(pagination.into_page(items, total)))
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub post: Post,
    /// Whether the viewer likes this post
    pub liked: bool,
    /// Oldest first
    pub comments: Vec<Comment>,
}

/// GET /accounts/view_post/:post_id/
pub async fn view_post(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<Json<PostView>> {
    let post = posts::get_post(&state.db, post_id).await?;
    let liked = posts::has_liked(&state.db, post_id, viewer.id).await?;
    let comments = posts::list_comments(&state.db, post_id).await?;

    Ok(Json(PostView { post, liked, comments }))
}

/// POST /accounts/posts/create/
pub async fn create_post(
    State(state): State<AppState>,
    Extension(CurrentUser(author)): Extension<CurrentUser>,
    Json(form): Json<PostForm>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    let form = form.clean()?;
    let post = posts::create_post(&state.db, author.id, &form.content, form.media_url.as_deref()).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// POST /accounts/post/:post_id/delete/
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<Redirect> {
    match posts::delete_post(&state.db, post_id, actor.id).await? {
        DeleteOutcome::Deleted => Ok(Redirect::to("/accounts/profile/")),
        DeleteOutcome::NotOwner => Err(ApiError::Redirect(post_url(post_id))),
    }
}

#[derive(Debug, Serialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes: i64,
}

/// POST /accounts/like_toggle/:post_id/
pub async fn like_toggle(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(post_id): Path<PostId>,
) -> ApiResult<Json<LikeState>> {
    let liked = posts::toggle_like(&state.db, post_id, viewer.id).await?;
    let likes = posts::like_count(&state.db, post_id).await?;

    Ok(Json(LikeState { liked, likes }))
}

/// POST /accounts/post/:post_id/comment/
pub async fn add_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(author)): Extension<CurrentUser>,
    Path(post_id): Path<PostId>,
    Json(form): Json<CommentForm>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let form = form.clean()?;
    let comment = posts::add_comment(&state.db, post_id, author.id, &form.content).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

/// POST /accounts/comment/:comment_id/delete/
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(comment_id): Path<CommentId>,
) -> ApiResult<Redirect> {
    match posts::delete_comment(&state.db, comment_id, actor.id).await? {
        (DeleteOutcome::Deleted, post_id) => Ok(Redirect::to(&post_url(post_id))),
        (DeleteOutcome::NotOwner, post_id) => Err(ApiError::Redirect(post_url(post_id))),
    }
}

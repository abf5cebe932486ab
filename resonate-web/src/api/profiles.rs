//! Musician profiles, profile editing, follow toggle and search

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use resonate_common::db::{Post, User, UserId};
use serde::{Deserialize, Serialize};

use super::auth::CurrentUser;
use crate::db::users::{ProfileStats, ProfileUpdate, SearchFilter};
use crate::db::{follows, posts, users};
use crate::error::ApiResult;
use crate::forms::{CleanForm, ProfileForm};
use crate::pagination::{calculate_pagination, Page, PAGE_SIZE};
use crate::AppState;

/// A profile as seen by the current user
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub user: User,
    pub stats: ProfileStats,
    /// Whether the viewer follows this user
    pub is_following: bool,
    pub is_own_profile: bool,
    /// Newest first
    pub posts: Vec<Post>,
}

async fn profile_view(state: &AppState, viewer: UserId, user: User) -> ApiResult<ProfileView> {
    let stats = users::profile_stats(&state.db, user.id).await?;
    let is_following = viewer != user.id && follows::is_following(&state.db, viewer, user.id).await?;
    let posts = posts::list_by_author(&state.db, user.id).await?;

    Ok(ProfileView {
        is_own_profile: viewer == user.id,
        user,
        stats,
        is_following,
        posts,
    })
}

/// GET /accounts/profile/
pub async fn own_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
) -> ApiResult<Json<ProfileView>> {
    let id = viewer.id;
    Ok(Json(profile_view(&state, id, viewer).await?))
}

/// GET /accounts/profile/:username/
pub async fn profile(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> ApiResult<Json<ProfileView>> {
    let user = users::get_by_username(&state.db, &username).await?;
    Ok(Json(profile_view(&state, viewer.id, user).await?))
}

/// GET /accounts/musician/:user_id/
pub async fn musician_detail(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<ProfileView>> {
    let user = users::get_user(&state.db, user_id).await?;
    Ok(Json(profile_view(&state, viewer.id, user).await?))
}

/// Current values of the editable profile fields
#[derive(Debug, Serialize)]
pub struct EditProfileView {
    pub email: String,
    pub bio: String,
    pub instrument: String,
    pub location: String,
    pub genres: String,
    pub avatar_url: Option<String>,
}

/// GET /accounts/edit_profile/
pub async fn edit_profile_form(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<EditProfileView> {
    Json(EditProfileView {
        email: user.email,
        bio: user.bio,
        instrument: user.instrument,
        location: user.location,
        genres: user.genres,
        avatar_url: user.avatar_url,
    })
}

/// POST /accounts/edit_profile/
pub async fn edit_profile(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(form): Json<ProfileForm>,
) -> ApiResult<Json<User>> {
    let form = form.clean()?;

    let update = ProfileUpdate {
        email: form.email.unwrap_or_default(),
        bio: form.bio,
        instrument: form.instrument,
        location: form.location,
        genres: form.genres,
        avatar_url: form.avatar_url,
    };

    Ok(Json(users::update_profile(&state.db, user.id, &update).await?))
}

#[derive(Debug, Serialize)]
pub struct FollowState {
    pub following: bool,
    pub followers: i64,
}

/// POST /accounts/follow_toggle/:username/
pub async fn follow_toggle(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Path(username): Path<String>,
) -> ApiResult<Json<FollowState>> {
    let target = users::get_by_username(&state.db, &username).await?;
    let following = follows::toggle_follow(&state.db, viewer.id, target.id).await?;
    let followers = follows::follower_count(&state.db, target.id).await?;

    Ok(Json(FollowState { following, followers }))
}

/// Query parameters for musician search; all optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
    pub instrument: String,
    pub location: String,
    pub page: Option<i64>,
}

/// One search hit
#[derive(Debug, Serialize)]
pub struct MusicianCard {
    pub id: UserId,
    pub username: String,
    pub instrument: String,
    pub location: String,
    pub genres: String,
    pub avatar_url: Option<String>,
}

impl From<User> for MusicianCard {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            instrument: user.instrument,
            location: user.location,
            genres: user.genres,
            avatar_url: user.avatar_url,
        }
    }
}

/// GET /accounts/search/
pub async fn search(
    State(state): State<AppState>,
    Extension(CurrentUser(viewer)): Extension<CurrentUser>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Page<MusicianCard>>> {
    let filter = SearchFilter {
        query: query.q,
        instrument: query.instrument,
        location: query.location,
        exclude: Some(viewer.id),
    };

    let total = users::count_search(&state.db, &filter).await?;
    let pagination = calculate_pagination(total, query.page.unwrap_or(1));
    let found = users::search(&state.db, &filter, PAGE_SIZE, pagination.offset).await?;

    Ok(Json(pagination.into_page(
        found.into_iter().map(MusicianCard::from).collect(),
        total,
    )))
}

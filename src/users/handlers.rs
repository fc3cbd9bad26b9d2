use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    dto::{ProfilePicResponse, UpdateUserRequest, UserResponse},
    repo_types::User,
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::{context, AppError, AppResult},
    form::{json_body, read_form},
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/profile-pic", post(upload_profile_pic))
}

pub(crate) fn parse_id(raw: &str, what: &str) -> AppResult<i32> {
    raw.parse::<i32>()
        .map_err(|_| AppError::validation(format!("Invalid {what} ID format")))
}

#[instrument(skip(state, _auth))]
pub async fn list_users(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<User>>> {
    let users = state.users.list().await.map_err(context("list users"))?;
    Ok(Json(users))
}

#[instrument(skip(state, _auth))]
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<User>> {
    let id = parse_id(&id, "user")?;
    let user = state.users.get(id).await.map_err(context("get user"))?;
    Ok(Json(user))
}

#[instrument(skip(state, auth, payload), fields(caller = auth.id))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> AppResult<Json<UserResponse>> {
    let id = parse_id(&id, "user")?;
    auth.ensure_self(id, "update your own profile")?;

    let patch = json_body(payload)?.into_patch()?;
    let user = services::update_user(&state, id, patch).await?;
    Ok(Json(UserResponse {
        message: "User updated successfully",
        user,
    }))
}

#[instrument(skip(state, auth, multipart), fields(caller = auth.id))]
pub async fn upload_profile_pic(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ProfilePicResponse>> {
    let id = parse_id(&id, "user")?;
    auth.ensure_self(id, "update your own profile picture")?;

    let upload = read_form(multipart, "profile_pic")
        .await?
        .file
        .ok_or_else(|| AppError::validation("Profile picture file is required"))?;

    let user = services::replace_profile_pic(&state, id, upload).await?;
    Ok(Json(ProfilePicResponse {
        message: "Profile picture updated successfully",
        filename: user.profile_pic.clone().unwrap_or_default(),
        user,
    }))
}

#[instrument(skip(state, auth), fields(caller = auth.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id, "user")?;
    auth.ensure_self(id, "delete your own account")?;

    services::delete_user(&state, id).await?;
    Ok(Json(json!({ "message": "User deleted successfully" })))
}

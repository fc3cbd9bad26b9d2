use tracing::{info, warn};

use super::repo_types::{NewUser, User, UserPatch};
use crate::{
    auth::dto::RegisterRequest,
    cleanup::{spawn_discard, BlobCleanup, CleanupReason},
    error::{context, AppError, AppResult},
    state::AppState,
    storage::{BlobKind, Upload},
};

pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<User> {
    // fast path; the unique index still catches a concurrent registration
    if state
        .users
        .find_by_email(&req.email)
        .await
        .map_err(context("check existing user"))?
        .is_some()
    {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::Conflict("User with this email already exists".into()));
    }

    let password_hash = state
        .passwords
        .hash_blocking(req.password)
        .await
        .map_err(|e| AppError::Internal(e.context("hash password")))?;

    let user = state
        .users
        .create(NewUser {
            name: req.name,
            email: req.email,
            password_hash,
        })
        .await
        .map_err(context("create user"))?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn update_user(state: &AppState, user_id: i32, patch: UserPatch) -> AppResult<User> {
    let user = state
        .users
        .update(user_id, &patch)
        .await
        .map_err(context("update user"))?;
    info!(user_id, "user updated");
    Ok(user)
}

/// Stores a new profile picture and points the user at it.
///
/// The old picture is only removed once the row references the new one, so a
/// failed write leaves the user with the previous, still present, picture.
pub async fn replace_profile_pic(state: &AppState, user_id: i32, upload: Upload) -> AppResult<User> {
    let current = state
        .users
        .get(user_id)
        .await
        .map_err(context("load user before picture update"))?;

    let reference = state
        .storage
        .save(upload, BlobKind::Users)
        .await
        .map_err(context("save profile picture"))?;

    let updated = match state.users.update_profile_pic(user_id, &reference).await {
        Ok(u) => u,
        Err(e) => {
            warn!(user_id, %reference, error = %e, "profile picture update failed; discarding new blob");
            spawn_discard(
                state.storage.clone(),
                state.cleanup,
                reference,
                CleanupReason::Rollback,
            );
            return Err(context("update profile picture")(e));
        }
    };

    if let Some(old) = current.profile_pic.filter(|r| !r.is_empty() && *r != reference) {
        spawn_discard(state.storage.clone(), state.cleanup, old, CleanupReason::Replaced);
    }

    info!(user_id, %reference, "profile picture updated");
    Ok(updated)
}

/// Removes the user's picture, then the user row.
pub async fn delete_user(state: &AppState, user_id: i32) -> AppResult<()> {
    let user = state
        .users
        .get(user_id)
        .await
        .map_err(context("load user before deletion"))?;

    if let Some(pic) = user.profile_pic.as_deref().filter(|r| !r.is_empty()) {
        BlobCleanup::new(state.storage.as_ref(), state.cleanup)
            .discard(pic, CleanupReason::Detach)
            .await;
    }

    state
        .users
        .delete(user_id)
        .await
        .map_err(context("delete user"))?;
    info!(user_id, "user deleted");
    Ok(())
}

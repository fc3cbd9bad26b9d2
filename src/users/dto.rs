use serde::{Deserialize, Serialize};

use super::repo_types::{User, UserPatch};
use crate::{
    auth::dto::{is_valid_email, normalize_email},
    error::AppError,
};

/// Request body for `PUT /users/:id`. Both fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UpdateUserRequest {
    pub fn into_patch(self) -> Result<UserPatch, AppError> {
        let name = match self.name.map(|n| n.trim().to_string()) {
            Some(n) if n.is_empty() => return Err(AppError::validation("Name cannot be empty")),
            other => other,
        };
        let email = match self.email.map(|e| normalize_email(&e)) {
            Some(e) if !is_valid_email(&e) => return Err(AppError::validation("Invalid email")),
            other => other,
        };
        let patch = UserPatch { name, email };
        if patch.is_empty() {
            return Err(AppError::validation("No update fields provided"));
        }
        Ok(patch)
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ProfilePicResponse {
    pub message: &'static str,
    pub filename: String,
    pub user: User,
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{auth::jwt::TokenError, db::RepoError, storage::StorageError};

/// Error returned by every handler. Internal detail never reaches the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Invalid file path")]
    PathTraversal,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

/// Converts a layer error, attaching `what` to internal faults so the log
/// line written by `into_response` says which operation failed.
pub fn context<E: Into<AppError>>(what: &'static str) -> impl FnOnce(E) -> AppError {
    move |e| match e.into() {
        AppError::Internal(inner) => AppError::Internal(inner.context(what)),
        other => other,
    }
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidFileType(_) | AppError::PathTraversal => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::InvalidFileType(ext) => AppError::InvalidFileType(ext),
            StorageError::PathTraversal(_) => AppError::PathTraversal,
            StorageError::Io(io) => AppError::Internal(anyhow::Error::new(io).context("blob storage")),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired | TokenError::Invalid => AppError::Unauthorized(e.to_string()),
            TokenError::Signing(err) => AppError::Internal(anyhow::Error::new(err).context("sign token")),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(_) => AppError::NotFound(e.to_string()),
            RepoError::Conflict(msg) => AppError::Conflict(msg),
            RepoError::Database(err) => AppError::Internal(anyhow::Error::new(err).context("database")),
        }
    }
}

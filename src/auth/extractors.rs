use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::error::AppError;

/// Identity of a caller that passed the bearer-token check.
///
/// Handlers that take this extractor only run for authenticated requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub email: String,
}

impl AuthUser {
    /// Self-service guard: the token must belong to the addressed user.
    pub fn ensure_self(&self, user_id: i32, action: &str) -> Result<(), AppError> {
        if self.id == user_id {
            Ok(())
        } else {
            warn!(
                caller = self.id,
                caller_email = %self.email,
                target = user_id,
                action,
                "forbidden self-service request"
            );
            Err(AppError::Forbidden(format!("You can only {action}")))
        }
    }
}

/// Extracts the token from an `Authorization` header value.
pub(crate) fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    let header = header
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Authorization header required".into()))?;

    let parts: Vec<&str> = header.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") => Ok(*token),
        _ => Err(AppError::Unauthorized(
            "Authorization header format must be Bearer {token}".into(),
        )),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.validate_token(token).map_err(|e| {
            warn!(error = %e, "rejected bearer token");
            AppError::from(e)
        })?;

        Ok(AuthUser {
            id: claims.user_id,
            email: claims.email,
        })
    }
}

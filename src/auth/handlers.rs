use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::dto::{is_valid_email, normalize_email, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::{
    error::{context, AppError, AppResult},
    form::json_body,
    state::AppState,
    users,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid email or password".into())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let req = json_body(payload)?.validate().map_err(|e| {
        warn!(error = %e, "invalid registration");
        e
    })?;

    let user = users::register(&state, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User registered successfully",
            user,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    let mut req = json_body(payload)?;
    req.email = normalize_email(&req.email);
    if !is_valid_email(&req.email) || req.password.is_empty() {
        return Err(AppError::validation("Invalid email or password format"));
    }

    let user = match state
        .users
        .find_by_email(&req.email)
        .await
        .map_err(context("find user by email"))?
    {
        Some(u) => u,
        None => {
            warn!(email = %req.email, "login unknown email");
            return Err(invalid_credentials());
        }
    };

    let ok = state
        .passwords
        .verify_blocking(req.password, user.password_hash.clone())
        .await
        .map_err(|e| AppError::Internal(e.context("verify password")))?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let token = state
        .jwt
        .issue_token(user.id, &user.email)
        .map_err(context("issue token"))?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse { token }))
}

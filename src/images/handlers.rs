use axum::{
    extract::{Path, Request, State},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{instrument, warn};

use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

pub fn image_routes() -> Router<AppState> {
    Router::new().route("/images/*path", get(serve_image))
}

/// GET /images/<subdir>/<file>; content type follows the extension.
#[instrument(skip(state, req))]
pub async fn serve_image(
    State(state): State<AppState>,
    Path(path): Path<String>,
    req: Request,
) -> AppResult<Response> {
    if path.contains("..") {
        warn!(%path, "path traversal attempt");
        return Err(AppError::PathTraversal);
    }
    let full = state.storage.resolve(&path).ok_or(AppError::PathTraversal)?;

    match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_file() => {}
        _ => {
            warn!(%path, "image not found");
            return Err(AppError::NotFound("Image not found".into()));
        }
    }

    match ServeFile::new(full).oneshot(req).await {
        Ok(resp) => Ok(resp.into_response()),
        Err(never) => match never {},
    }
}

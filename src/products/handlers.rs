use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    dto::{patch_from_form, CreateProductFields, ProductResponse},
    repo_types::Product,
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::{context, AppError, AppResult},
    form::read_form,
    state::AppState,
    users::handlers::parse_id,
};

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

#[instrument(skip(state))]
pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    let products = state.products.list().await.map_err(context("list products"))?;
    Ok(Json(products))
}

#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Product>> {
    let id = parse_id(&id, "product")?;
    let product = state.products.get(id).await.map_err(context("get product"))?;
    Ok(Json(product))
}

/// POST /products (multipart: description, value, quantity, optional image)
#[instrument(skip(state, auth, multipart), fields(caller = auth.id))]
pub async fn create_product(
    State(state): State<AppState>,
    auth: AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, HeaderMap, Json<Product>)> {
    let mut form = read_form(multipart, "image").await?;
    let fields = CreateProductFields::from_form(&mut form)?;

    let product = services::create_product(&state, fields, form.file).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/products/{}", product.id)) {
        headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(product)))
}

/// PUT /products/:id (multipart, every field optional, at least one required)
#[instrument(skip(state, auth, multipart), fields(caller = auth.id))]
pub async fn update_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<ProductResponse>> {
    let id = parse_id(&id, "product")?;
    let mut form = read_form(multipart, "image").await?;
    let patch = patch_from_form(&mut form)?;
    if patch.is_empty() && form.file.is_none() {
        return Err(AppError::validation("No update fields provided"));
    }

    let product = services::update_product(&state, id, patch, form.file).await?;
    Ok(Json(ProductResponse {
        message: "Product updated successfully",
        product,
    }))
}

#[instrument(skip(state, auth), fields(caller = auth.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    let id = parse_id(&id, "product")?;
    services::delete_product(&state, id).await?;
    Ok(Json(json!({ "message": "Product deleted successfully" })))
}

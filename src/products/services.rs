use tracing::{info, warn};

use super::{
    dto::CreateProductFields,
    repo_types::{NewProduct, Product, ProductPatch},
};
use crate::{
    cleanup::{spawn_discard, BlobCleanup, CleanupReason},
    error::{context, AppResult},
    state::AppState,
    storage::{BlobKind, Upload},
};

/// Saves the optional image, then inserts the row referencing it.
pub async fn create_product(
    state: &AppState,
    fields: CreateProductFields,
    image: Option<Upload>,
) -> AppResult<Product> {
    let image = match image {
        Some(upload) => Some(
            state
                .storage
                .save(upload, BlobKind::Products)
                .await
                .map_err(context("save product image"))?,
        ),
        None => None,
    };

    let new = NewProduct {
        description: fields.description,
        value: fields.value,
        quantity: fields.quantity,
        image: image.clone(),
    };

    match state.products.create(new).await {
        Ok(product) => {
            info!(product_id = product.id, image = ?product.image, "product created");
            Ok(product)
        }
        Err(e) => {
            if let Some(reference) = image {
                warn!(%reference, error = %e, "product insert failed; discarding image");
                spawn_discard(
                    state.storage.clone(),
                    state.cleanup,
                    reference,
                    CleanupReason::Rollback,
                );
            }
            Err(context("create product")(e))
        }
    }
}

/// Applies the patch and, when given, swaps the product image.
///
/// Order: save new blob, write row, then drop the old blob. A failed row write
/// discards the new blob and leaves the product on its original image.
pub async fn update_product(
    state: &AppState,
    product_id: i32,
    patch: ProductPatch,
    image: Option<Upload>,
) -> AppResult<Product> {
    let current = state
        .products
        .get(product_id)
        .await
        .map_err(context("load product before update"))?;

    let new_image = match image {
        Some(upload) => Some(
            state
                .storage
                .save(upload, BlobKind::Products)
                .await
                .map_err(context("save product image"))?,
        ),
        None => None,
    };

    let updated = match state
        .products
        .update(product_id, &patch, new_image.as_deref())
        .await
    {
        Ok(p) => p,
        Err(e) => {
            if let Some(reference) = new_image {
                warn!(product_id, %reference, error = %e, "product update failed; discarding new image");
                spawn_discard(
                    state.storage.clone(),
                    state.cleanup,
                    reference,
                    CleanupReason::Rollback,
                );
            }
            return Err(context("update product")(e));
        }
    };

    if new_image.is_some() {
        if let Some(old) = current.image.filter(|r| !r.is_empty()) {
            spawn_discard(state.storage.clone(), state.cleanup, old, CleanupReason::Replaced);
        }
    }

    info!(product_id, image = ?updated.image, "product updated");
    Ok(updated)
}

/// Removes the product image, then the product row.
pub async fn delete_product(state: &AppState, product_id: i32) -> AppResult<()> {
    let product = state
        .products
        .get(product_id)
        .await
        .map_err(context("load product before deletion"))?;

    if let Some(image) = product.image.as_deref().filter(|r| !r.is_empty()) {
        BlobCleanup::new(state.storage.as_ref(), state.cleanup)
            .discard(image, CleanupReason::Detach)
            .await;
    }

    state
        .products
        .delete(product_id)
        .await
        .map_err(context("delete product"))?;
    info!(product_id, "product deleted");
    Ok(())
}

use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Product record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: i32,
    pub description: String,
    pub value: f64,
    pub quantity: i32,
    pub image: Option<String>, // blob reference, e.g. "products/<uuid>.png"
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated fields for a new product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub description: String,
    pub value: f64,
    pub quantity: i32,
    pub image: Option<String>,
}

/// Partial update of the general product fields. The image is not part of the
/// patch; it only changes when a new blob was stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub description: Option<String>,
    pub value: Option<f64>,
    pub quantity: Option<i32>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.value.is_none() && self.quantity.is_none()
    }
}

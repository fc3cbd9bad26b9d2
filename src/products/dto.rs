use serde::Serialize;

use super::repo_types::{Product, ProductPatch};
use crate::{error::AppError, form::MultipartForm};

fn parse_description(raw: String) -> Result<String, AppError> {
    let description = raw.trim().to_string();
    if description.is_empty() {
        return Err(AppError::validation("Description is required"));
    }
    Ok(description)
}

fn parse_value(raw: &str) -> Result<f64, AppError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(AppError::validation("Invalid or non-positive value")),
    }
}

fn parse_quantity(raw: &str) -> Result<i32, AppError> {
    match raw.trim().parse::<i32>() {
        Ok(q) if q >= 0 => Ok(q),
        _ => Err(AppError::validation("Invalid or negative quantity")),
    }
}

/// Validated fields of `POST /products`, image excluded.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateProductFields {
    pub description: String,
    pub value: f64,
    pub quantity: i32,
}

impl CreateProductFields {
    pub fn from_form(form: &mut MultipartForm) -> Result<Self, AppError> {
        let description = parse_description(form.take("description").unwrap_or_default())?;
        let value = parse_value(&form.take("value").unwrap_or_default())?;
        let quantity = parse_quantity(&form.take("quantity").unwrap_or_default())?;
        Ok(Self {
            description,
            value,
            quantity,
        })
    }
}

/// Builds a patch from the fields present in a `PUT /products/:id` form.
pub fn patch_from_form(form: &mut MultipartForm) -> Result<ProductPatch, AppError> {
    Ok(ProductPatch {
        description: form.take("description").map(parse_description).transpose()?,
        value: form.take("value").as_deref().map(parse_value).transpose()?,
        quantity: form.take("quantity").as_deref().map(parse_quantity).transpose()?,
    })
}

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub message: &'static str,
    pub product: Product,
}

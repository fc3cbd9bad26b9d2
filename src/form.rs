use std::collections::HashMap;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        Multipart,
    },
    Json,
};

use crate::{error::AppError, storage::Upload};

/// Text fields plus at most one file from a multipart body.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub file: Option<Upload>,
}

impl MultipartForm {
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

fn bad_form(e: MultipartError) -> AppError {
    AppError::validation(format!("Error processing form: {}", e.body_text()))
}

/// Reads the whole form; `file_field` names the part holding the upload.
pub async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
    file_field: &str,
) -> Result<MultipartForm, AppError> {
    let mut mp = multipart
        .map_err(|e| AppError::validation(format!("Expected multipart form: {}", e.body_text())))?;

    let mut form = MultipartForm::default();
    while let Some(field) = mp.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let body = field.bytes().await.map_err(bad_form)?;
            // browsers send an empty part when no file was picked
            if file_name.is_empty() && body.is_empty() {
                continue;
            }
            form.file = Some(Upload { file_name, body });
        } else {
            let value = field.text().await.map_err(bad_form)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Unwraps a JSON body, turning extractor rejections into validation errors.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|e| AppError::validation(format!("Invalid input: {}", e.body_text())))
}

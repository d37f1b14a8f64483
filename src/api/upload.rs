//! Upload API endpoint
//!
//! POST /api/v1/upload (ADMIN, EDITOR) stores one image from the multipart
//! field `file` under the configured upload directory and answers with the
//! URL it is served at.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::{authorize, ApiError, AppState, MaybeSession};
use crate::config::UploadConfig;
use crate::models::Role;

/// Response for successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// Build the upload router
pub fn router(config: &UploadConfig) -> Router<AppState> {
    // Leave room for multipart framing around the file itself
    let body_limit = config.max_file_size as usize + 64 * 1024;
    Router::new()
        .route("/upload", post(upload_file))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// POST /api/v1/upload
async fn upload_file(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    let config = &state.config.upload;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        if !config.is_type_allowed(&content_type) {
            return Err(ApiError::validation_error(format!(
                "Invalid file type: {}. Allowed types: {}",
                content_type,
                config.allowed_types.join(", ")
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        if data.len() as u64 > config.max_file_size {
            return Err(ApiError::validation_error(format!(
                "File too large. Maximum size: {} MB",
                config.max_file_size / 1024 / 1024
            )));
        }

        ensure_upload_dir(&config.path).await?;

        let filename = format!("{}.{}", Uuid::new_v4(), config.get_extension(&content_type));
        fs::write(config.path.join(&filename), &data)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to save file: {}", e)))?;

        tracing::info!(%filename, size = data.len(), "File uploaded");

        return Ok(Json(UploadResponse {
            url: public_url(&config.public_prefix, &filename),
            filename,
            size: data.len() as u64,
            content_type,
        }));
    }

    Err(ApiError::validation_error("No file provided"))
}

async fn ensure_upload_dir(path: &Path) -> Result<(), ApiError> {
    if !path.exists() {
        fs::create_dir_all(path)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create upload directory: {}", e)))?;
    }
    Ok(())
}

/// URL a stored file is served at
pub fn public_url(prefix: &str, filename: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url() {
        assert_eq!(public_url("/uploads", "a.png"), "/uploads/a.png");
        assert_eq!(public_url("/uploads/", "a.png"), "/uploads/a.png");
    }
}

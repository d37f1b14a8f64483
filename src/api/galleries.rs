//! Gallery API endpoints
//!
//! - GET /api/v1/galleries - All galleries
//! - GET /api/v1/galleries/{id} - Gallery with its photos
//! - POST /api/v1/galleries, PATCH /api/v1/galleries/{id} (ADMIN, EDITOR)
//! - POST /api/v1/galleries/{id}/photos (ADMIN, EDITOR)
//! - DELETE /api/v1/galleries/{id}, DELETE /api/v1/photos/{id} (ADMIN)

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;

use crate::api::middleware::{authorize, ApiError, ApiJson, ApiPath, AppState, MaybeSession};
use crate::models::{AddPhotoInput, CreateGalleryInput, Gallery, Photo, Role, UpdateGalleryInput};

#[derive(Debug, Serialize)]
pub struct GalleryWithPhotos {
    #[serde(flatten)]
    pub gallery: Gallery,
    pub photos: Vec<Photo>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/galleries", get(list_galleries).post(create_gallery))
        .route(
            "/galleries/{id}",
            get(get_gallery).patch(update_gallery).delete(delete_gallery),
        )
        .route("/galleries/{id}/photos", post(add_photo))
        .route("/photos/{id}", delete(delete_photo))
}

fn required_title(title: &str) -> Result<String, ApiError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::validation_error("title is required"));
    }
    Ok(title.to_string())
}

async fn find_gallery(state: &AppState, id: i64) -> Result<Gallery, ApiError> {
    state
        .gallery_repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Gallery not found"))
}

async fn list_galleries(State(state): State<AppState>) -> Result<Json<Vec<Gallery>>, ApiError> {
    Ok(Json(state.gallery_repo.list().await?))
}

async fn get_gallery(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<GalleryWithPhotos>, ApiError> {
    let gallery = find_gallery(&state, id).await?;
    let photos = state.gallery_repo.list_photos(id).await?;
    Ok(Json(GalleryWithPhotos { gallery, photos }))
}

async fn create_gallery(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiJson(body): ApiJson<CreateGalleryInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ELEVATED)?;

    let gallery = Gallery {
        id: 0,
        title: required_title(&body.title)?,
        description: body.description,
        cover_image: body.cover_image.filter(|c| !c.trim().is_empty()),
        created_at: Utc::now(),
    };
    let gallery = state.gallery_repo.create(&gallery).await?;
    Ok((StatusCode::CREATED, Json(gallery)))
}

async fn update_gallery(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateGalleryInput>,
) -> Result<Json<Gallery>, ApiError> {
    authorize(session, Role::ELEVATED)?;

    let mut gallery = find_gallery(&state, id).await?;
    if let Some(title) = body.title {
        gallery.title = required_title(&title)?;
    }
    if let Some(description) = body.description {
        gallery.description = description;
    }
    if body.cover_image.is_some() {
        gallery.cover_image = body.cover_image.filter(|c| !c.trim().is_empty());
    }

    Ok(Json(state.gallery_repo.update(&gallery).await?))
}

async fn delete_gallery(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    if !state.gallery_repo.delete(id).await? {
        return Err(ApiError::not_found("Gallery not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn add_photo(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<AddPhotoInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ELEVATED)?;
    find_gallery(&state, id).await?;

    let url = body.url.trim().to_string();
    if url.is_empty() {
        return Err(ApiError::validation_error("url is required"));
    }

    // New photos go last unless placed explicitly
    let position = match body.position {
        Some(p) => p,
        None => state.gallery_repo.list_photos(id).await?.len() as i32,
    };

    let photo = state
        .gallery_repo
        .add_photo(&Photo {
            id: 0,
            gallery_id: id,
            url,
            caption: body.caption.filter(|c| !c.trim().is_empty()),
            position,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(photo)))
}

async fn delete_photo(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    if !state.gallery_repo.delete_photo(id).await? {
        return Err(ApiError::not_found("Photo not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

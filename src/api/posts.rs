//! Post API endpoints
//!
//! - GET /api/v1/posts - Published posts, pinned first
//! - GET /api/v1/posts/{slug} - A published post
//! - POST /api/v1/posts - Create (ADMIN, EDITOR)
//! - PATCH /api/v1/posts/{id} - Update (ADMIN, EDITOR)
//! - DELETE /api/v1/posts/{id} - Delete (ADMIN)
//! - GET /api/v1/admin/posts - All posts including drafts (ADMIN, EDITOR)
//! - GET /api/v1/admin/posts/{id} - Any post by ID (ADMIN, EDITOR)

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::common::PaginationQuery;
use crate::api::middleware::{
    authorize, ApiError, ApiJson, ApiPath, ApiQuery, AppState, MaybeSession,
};
use crate::models::{CreatePostInput, PagedResult, Post, Role, UpdatePostInput};

pub fn router() -> Router<AppState> {
    // `{id}` is the slug for GET and the numeric ID for writes
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/{id}", get(get_post).patch(update_post).delete(delete_post))
        .route("/admin/posts", get(list_all_posts))
        .route("/admin/posts/{id}", get(get_post_by_id))
}

async fn list_posts(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> Result<Json<PagedResult<Post>>, ApiError> {
    Ok(Json(state.post_service.list_public(&query.into()).await?))
}

async fn get_post(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Post>, ApiError> {
    Ok(Json(state.post_service.get_public(&slug).await?))
}

async fn create_post(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiJson(body): ApiJson<CreatePostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = authorize(session, Role::ELEVATED)?;
    let post = state.post_service.create(body, session.user_id).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn update_post(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdatePostInput>,
) -> Result<Json<Post>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.post_service.update(id, body).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    state.post_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_all_posts(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> Result<Json<PagedResult<Post>>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.post_service.list_all(&query.into()).await?))
}

async fn get_post_by_id(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Post>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.post_service.get_by_id(id).await?))
}

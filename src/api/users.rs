//! Admin user management
//!
//! - GET /api/v1/admin/users - Paginated users with online status
//! - PATCH /api/v1/admin/users/{id} - Change role
//! - DELETE /api/v1/admin/users/{id} - Delete account

use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{
    authorize, ApiError, ApiJson, ApiPath, ApiQuery, AppState, MaybeSession,
};
use crate::models::{PagedResult, Role, User};
use crate::services::user::UserSummary;

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", axum::routing::patch(set_role).delete(delete_user))
}

async fn list_users(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiQuery(query): ApiQuery<PaginationQuery>,
) -> Result<Json<PagedResult<UserSummary>>, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    Ok(Json(state.user_service.list_users(&query.into()).await?))
}

async fn set_role(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<SetRoleRequest>,
) -> Result<Json<User>, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    Ok(Json(state.user_service.set_role(id, body.role).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let admin = authorize(session, Role::ADMIN_ONLY)?;
    state.user_service.delete_user(admin.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

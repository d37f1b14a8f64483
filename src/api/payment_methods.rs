//! Payment method API endpoints
//!
//! - GET /api/v1/payment-methods - Active methods, by position
//! - GET /api/v1/admin/payment-methods - All methods (ADMIN)
//! - POST /api/v1/admin/payment-methods (ADMIN)
//! - PATCH/DELETE /api/v1/admin/payment-methods/{id} (ADMIN)

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};

use crate::api::middleware::{authorize, ApiError, ApiJson, ApiPath, AppState, MaybeSession};
use crate::models::{CreatePaymentMethodInput, PaymentMethod, Role, UpdatePaymentMethodInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payment-methods", get(list_active))
        .route("/admin/payment-methods", get(list_all).post(create_method))
        .route(
            "/admin/payment-methods/{id}",
            patch(update_method).delete(delete_method),
        )
}

fn required_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::validation_error("name is required"));
    }
    Ok(name.to_string())
}

async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<PaymentMethod>>, ApiError> {
    Ok(Json(state.payment_method_repo.list(false).await?))
}

async fn list_all(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<Vec<PaymentMethod>>, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    Ok(Json(state.payment_method_repo.list(true).await?))
}

async fn create_method(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiJson(body): ApiJson<CreatePaymentMethodInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;

    let method = PaymentMethod {
        id: 0,
        name: required_name(&body.name)?,
        details: body.details,
        logo: body.logo.filter(|l| !l.trim().is_empty()),
        is_active: body.is_active,
        position: body.position,
    };
    let method = state.payment_method_repo.create(&method).await?;
    Ok((StatusCode::CREATED, Json(method)))
}

async fn update_method(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdatePaymentMethodInput>,
) -> Result<Json<PaymentMethod>, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;

    let mut method = state
        .payment_method_repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Payment method not found"))?;

    if let Some(name) = body.name {
        method.name = required_name(&name)?;
    }
    if let Some(details) = body.details {
        method.details = details;
    }
    if body.logo.is_some() {
        method.logo = body.logo.filter(|l| !l.trim().is_empty());
    }
    if let Some(is_active) = body.is_active {
        method.is_active = is_active;
    }
    if let Some(position) = body.position {
        method.position = position;
    }

    Ok(Json(state.payment_method_repo.update(&method).await?))
}

async fn delete_method(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    if !state.payment_method_repo.delete(id).await? {
        return Err(ApiError::not_found("Payment method not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

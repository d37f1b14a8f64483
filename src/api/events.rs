//! Event API endpoints
//!
//! - GET /api/v1/events - Events with seat counts (`?upcoming=true`)
//! - GET /api/v1/events/{id} - Single event
//! - POST /api/v1/events, PATCH/DELETE /api/v1/events/{id} - Management
//! - POST/DELETE /api/v1/events/{id}/rsvp - Reserve or release a seat
//! - GET /api/v1/events/{id}/rsvps - Attendee list (ADMIN, EDITOR)
//! - GET /api/v1/me/rsvps - The caller's reservations

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{
    authorize, ApiError, ApiJson, ApiPath, ApiQuery, AppState, MaybeSession,
};
use crate::models::{Attendee, CreateEventInput, Event, EventWithRsvps, Role, UpdateEventInput};

#[derive(Debug, Default, Deserialize)]
pub struct EventListQuery {
    #[serde(default)]
    pub upcoming: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/{id}", get(get_event).patch(update_event).delete(delete_event))
        .route("/events/{id}/rsvp", axum::routing::post(reserve).delete(release))
        .route("/events/{id}/rsvps", get(list_attendees))
        .route("/me/rsvps", get(my_reservations))
}

async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventListQuery>,
) -> Result<Json<Vec<EventWithRsvps>>, ApiError> {
    Ok(Json(state.event_service.list(query.upcoming).await?))
}

async fn get_event(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<EventWithRsvps>, ApiError> {
    Ok(Json(state.event_service.get(id).await?))
}

async fn create_event(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiJson(body): ApiJson<CreateEventInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ELEVATED)?;
    let event = state.event_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateEventInput>,
) -> Result<Json<Event>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.event_service.update(id, body).await?))
}

async fn delete_event(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    state.event_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/events/{id}/rsvp
async fn reserve(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let session = authorize(session, Role::ANY)?;
    let rsvp = state.event_service.try_reserve(id, session.user_id).await?;
    Ok((StatusCode::CREATED, Json(rsvp)))
}

/// DELETE /api/v1/events/{id}/rsvp
async fn release(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    let session = authorize(session, Role::ANY)?;
    state.event_service.release(id, session.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_attendees(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<Attendee>>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.event_service.attendees(id).await?))
}

async fn my_reservations(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<Vec<EventWithRsvps>>, ApiError> {
    let session = authorize(session, Role::ANY)?;
    Ok(Json(state.event_service.reservations_of(session.user_id).await?))
}

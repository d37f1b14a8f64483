//! API layer - HTTP handlers and routing
//!
//! This module contains all HTTP API endpoints for Cohort, mounted under
//! `/api/v1`:
//! - Auth and profile endpoints
//! - Admin user management
//! - Posts, events and RSVPs
//! - Courses, lessons, enrollment and certificates
//! - Quizzes
//! - Galleries and payment methods
//! - Upload and health
//!
//! Handlers receive the session through `MaybeSession` and check roles
//! with `authorize` themselves.

pub mod auth;
pub mod common;
pub mod courses;
pub mod events;
pub mod galleries;
pub mod health;
pub mod middleware;
pub mod payment_methods;
pub mod posts;
pub mod quizzes;
pub mod upload;
pub mod users;


use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub use middleware::{authorize, ApiError, AppState, AuthDenied, MaybeSession};

/// Build the `/api/v1` router
pub fn build_api_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .merge(users::router())
        .merge(posts::router())
        .merge(events::router())
        .merge(courses::router())
        .merge(quizzes::router())
        .merge(galleries::router())
        .merge(payment_methods::router())
        .merge(upload::router(&state.config.upload))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let server = &state.config.server;

    // Credentialed CORS needs an explicit origin
    let origin = match server.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            tracing::warn!("Invalid CORS origin '{}', allowing none", server.cors_origin);
            AllowOrigin::list(std::iter::empty())
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let upload = state.config.upload.clone();

    Router::new()
        .nest("/api/v1", build_api_router(&state))
        .nest_service(&upload.public_prefix, ServeDir::new(&upload.path))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

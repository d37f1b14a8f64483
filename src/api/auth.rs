//! Authentication API endpoints
//!
//! Handles HTTP requests for user authentication:
//! - POST /api/v1/auth/register - Account registration
//! - POST /api/v1/auth/login - Login
//! - POST /api/v1/auth/logout - Logout
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/profile - Update profile
//! - PUT /api/v1/auth/password - Change password
//! - POST /api/v1/auth/heartbeat - Online status ping

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::ClientIp;
use crate::api::middleware::{
    authorize, ApiError, ApiJson, AppState, MaybeSession, SESSION_COOKIE,
};
use crate::config::AuthConfig;
use crate::models::{CreateUserInput, Role, Session, UpdateProfileInput, User};
use crate::services::user::{LoginInput, UserServiceError};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
}

/// Request body for changing password
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub last_seen_at: chrono::DateTime<chrono::Utc>,
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
        .route("/heartbeat", post(heartbeat))
}

/// `Set-Cookie` value carrying a session token
pub fn session_cookie(token: &str, max_age: i64, auth: &AuthConfig) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age
    );
    if auth.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value clearing the session on `path`
pub fn clear_cookie(path: &str, auth: &AuthConfig) -> String {
    let mut cookie = format!(
        "{}=; Path={}; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE, path
    );
    if auth.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Sign a session for `user` and return the headers setting it
fn issue_session(state: &AppState, user: &User) -> Result<HeaderMap, ApiError> {
    let auth = &state.config.auth;
    let ttl = chrono::Duration::days(auth.session_ttl_days);
    let session = Session::for_user(user, ttl);
    let token = state.codec.encode(&session)?;

    let cookie = session_cookie(&token, ttl.num_seconds(), auth);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(ApiError::internal)?,
    );
    Ok(headers)
}

/// POST /api/v1/auth/register - Account registration
///
/// The first account becomes ADMIN; the new user is signed in.
async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateUserInput>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.user_service.register(body).await?;
    let headers = issue_session(&state, &user)?;

    Ok((StatusCode::CREATED, headers, Json(AuthResponse { user })))
}

/// POST /api/v1/auth/login - Login
///
/// Requests are limited per client IP, and failed attempts per account.
async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(ip) = ip {
        if state.rate_limiter.check_ip(ip).await {
            tracing::warn!(%ip, "Login rate limit exceeded");
            return Err(ApiError::with_details(
                "RATE_LIMIT",
                "Too many requests, please try again later",
                serde_json::json!({ "retry_after": 60 }),
            ));
        }
    }

    if state.rate_limiter.is_email_limited(&body.email).await {
        return Err(ApiError::with_details(
            "RATE_LIMIT",
            "Too many failed attempts, please try again in 15 minutes",
            serde_json::json!({ "retry_after": 900 }),
        ));
    }

    let user = match state.user_service.login(&body).await {
        Ok(user) => user,
        Err(UserServiceError::AuthenticationError(msg)) => {
            state.rate_limiter.record_failure(&body.email).await;
            return Err(ApiError::unauthorized(msg));
        }
        Err(e) => return Err(e.into()),
    };

    state.rate_limiter.clear_failures(&body.email).await;
    let response_headers = issue_session(&state, &user)?;
    tracing::info!(user_id = user.id, "User logged in");

    Ok((response_headers, Json(AuthResponse { user })))
}

/// POST /api/v1/auth/logout - Logout
///
/// Sessions are stateless, so logging out only clears the cookie, on
/// every path it may have been set on.
async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let auth = &state.config.auth;
    let mut response_headers = HeaderMap::new();
    for path in &auth.logout_cookie_paths {
        response_headers.append(
            header::SET_COOKIE,
            HeaderValue::from_str(&clear_cookie(path, auth)).map_err(ApiError::internal)?,
        );
    }

    Ok((StatusCode::NO_CONTENT, response_headers))
}

/// The signed-in user, reloaded so profile edits show up immediately
async fn current_user(state: &AppState, session: Option<Session>) -> Result<User, ApiError> {
    let session = authorize(session, Role::ANY)?;
    state
        .user_service
        .get_by_id(session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Please sign in again"))
}

/// GET /api/v1/auth/me - Current user
async fn get_current_user(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<User>, ApiError> {
    Ok(Json(current_user(&state, session).await?))
}

/// PUT /api/v1/auth/profile - Update current user's profile
async fn update_profile(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiJson(body): ApiJson<UpdateProfileInput>,
) -> Result<Json<User>, ApiError> {
    let session = authorize(session, Role::ANY)?;
    let user = state.user_service.update_profile(session.user_id, body).await?;
    Ok(Json(user))
}

/// PUT /api/v1/auth/password - Change password
async fn change_password(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiJson(body): ApiJson<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let session = authorize(session, Role::ANY)?;
    state
        .user_service
        .change_password(session.user_id, &body.current_password, &body.new_password)
        .await
        .map_err(|e| match e {
            // A wrong current password must not look like an expired session
            UserServiceError::AuthenticationError(msg) => ApiError::validation_error(msg),
            other => other.into(),
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/auth/heartbeat - Record that the user is online
async fn heartbeat(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let session = authorize(session, Role::ANY)?;
    let last_seen_at = state.user_service.heartbeat(session.user_id).await?;
    Ok(Json(HeartbeatResponse { last_seen_at }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let mut auth = AuthConfig::default();
        let cookie = session_cookie("tok", 60, &auth);
        assert_eq!(cookie, "session=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=60");

        auth.cookie_secure = true;
        assert!(session_cookie("tok", 60, &auth).ends_with("; Secure"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let auth = AuthConfig::default();
        let cookie = clear_cookie("/admin", &auth);
        assert!(cookie.starts_with("session=;"));
        assert!(cookie.contains("Path=/admin"));
        assert!(cookie.contains("Max-Age=0"));
    }
}

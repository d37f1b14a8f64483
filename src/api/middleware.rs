//! API middleware
//!
//! Shared request plumbing:
//! - `AppState`, built once at startup and cloned into every handler
//! - `ApiError`, the single JSON error body and its status mapping
//! - `ApiJson`, `ApiPath` and `ApiQuery`, extractors that reject with `ApiError`
//! - `MaybeSession`, the session decoded from the request's cookie
//! - `authorize`, the role guard handlers call explicitly

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::cache::MemoryCache;
use crate::config::Config;
use crate::db::repositories::{
    GalleryRepository, PaymentMethodRepository, SqlxCourseRepository, SqlxEnrollmentRepository,
    SqlxEventRepository, SqlxGalleryRepository, SqlxPaymentMethodRepository, SqlxPostRepository,
    SqlxQuizRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{Role, Session};
use crate::services::{
    CertificateError, CertificateService, CourseService, CourseServiceError, EventService,
    EventServiceError, LoginRateLimiter, PostService, PostServiceError, QuizService,
    QuizServiceError, RsvpError, SessionCodec, UserService, UserServiceError,
};

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub codec: Arc<SessionCodec>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub user_service: Arc<UserService>,
    pub post_service: Arc<PostService>,
    pub event_service: Arc<EventService>,
    pub course_service: Arc<CourseService>,
    pub quiz_service: Arc<QuizService>,
    pub certificate_service: Arc<CertificateService>,
    pub gallery_repo: Arc<dyn GalleryRepository>,
    pub payment_method_repo: Arc<dyn PaymentMethodRepository>,
}

impl AppState {
    /// Wire repositories and services around one pool
    pub fn new(pool: DynDatabasePool, config: Config, codec: SessionCodec) -> Self {
        let cache = Arc::new(MemoryCache::new());

        let users = SqlxUserRepository::boxed(pool.clone());
        let courses = SqlxCourseRepository::boxed(pool.clone());
        let enrollments = SqlxEnrollmentRepository::boxed(pool.clone());
        let quizzes = SqlxQuizRepository::boxed(pool.clone());

        let online_window = chrono::Duration::seconds(config.auth.online_window_seconds);

        Self {
            user_service: Arc::new(UserService::with_online_window(users.clone(), online_window)),
            post_service: Arc::new(PostService::new(SqlxPostRepository::boxed(pool.clone()), cache.clone())),
            event_service: Arc::new(EventService::new(SqlxEventRepository::boxed(pool.clone()), cache)),
            course_service: Arc::new(CourseService::new(
                courses.clone(),
                enrollments.clone(),
                quizzes.clone(),
            )),
            quiz_service: Arc::new(QuizService::new(quizzes.clone(), courses.clone())),
            certificate_service: Arc::new(CertificateService::new(users, courses, enrollments, quizzes)),
            gallery_repo: SqlxGalleryRepository::boxed(pool.clone()),
            payment_method_repo: SqlxPaymentMethodRepository::boxed(pool.clone()),
            rate_limiter: Arc::new(LoginRateLimiter::new()),
            codec: Arc::new(codec),
            config: Arc::new(config),
            pool,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the cause and answer with a generic message
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "NOT_ENROLLED" | "NOT_COMPLETED" | "QUIZZES_NOT_PASSED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" | "NOT_RESERVED" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "CONFLICT" | "EVENT_ENDED" | "EVENT_FULL" | "ALREADY_RESERVED" => {
                StatusCode::BAD_REQUEST
            }
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", err))
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::UserExists(msg) => Self::conflict(msg),
            UserServiceError::NotFound => Self::not_found("User not found"),
            UserServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<PostServiceError> for ApiError {
    fn from(err: PostServiceError) -> Self {
        match err {
            PostServiceError::ValidationError(msg) => Self::validation_error(msg),
            PostServiceError::NotFound => Self::not_found("Post not found"),
            PostServiceError::SlugExists(_) => Self::conflict(err.to_string()),
            PostServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<EventServiceError> for ApiError {
    fn from(err: EventServiceError) -> Self {
        match err {
            EventServiceError::ValidationError(msg) => Self::validation_error(msg),
            EventServiceError::NotFound => Self::not_found("Event not found"),
            EventServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<RsvpError> for ApiError {
    fn from(err: RsvpError) -> Self {
        let code = match &err {
            RsvpError::NotFound => "NOT_FOUND",
            RsvpError::EventEnded => "EVENT_ENDED",
            RsvpError::Full => "EVENT_FULL",
            RsvpError::AlreadyReserved => "ALREADY_RESERVED",
            RsvpError::NotReserved => "NOT_RESERVED",
            RsvpError::Internal(_) => return Self::internal(&err),
        };
        Self::new(code, err.to_string())
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::ValidationError(msg) => Self::validation_error(msg),
            CourseServiceError::NotFound(_) => Self::not_found(err.to_string()),
            CourseServiceError::SlugExists(_) => Self::conflict(err.to_string()),
            CourseServiceError::NotEnrolled => Self::new("NOT_ENROLLED", err.to_string()),
            CourseServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<QuizServiceError> for ApiError {
    fn from(err: QuizServiceError) -> Self {
        match err {
            QuizServiceError::ValidationError(msg) => Self::validation_error(msg),
            QuizServiceError::NotFound(_) => Self::not_found(err.to_string()),
            QuizServiceError::InternalError(e) => e.into(),
        }
    }
}

impl From<CertificateError> for ApiError {
    fn from(err: CertificateError) -> Self {
        match err {
            CertificateError::UserNotFound => Self::unauthorized("Please sign in again"),
            CertificateError::NotFound => Self::not_found(err.to_string()),
            CertificateError::NotCompleted => Self::new("NOT_COMPLETED", err.to_string()),
            CertificateError::QuizzesNotPassed { passed, total } => Self::with_details(
                "QUIZZES_NOT_PASSED",
                err.to_string(),
                serde_json::json!({ "passed": passed, "total": total }),
            ),
            CertificateError::Internal(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// JSON request body whose rejection is a `VALIDATION_ERROR`
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejection is a `VALIDATION_ERROR`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string whose rejection is a `VALIDATION_ERROR`
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

// ============================================================================
// Session extraction and authorization
// ============================================================================

/// Extract the session token from the `session` cookie, falling back to a
/// `Bearer` authorization header
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        });

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

/// The request's session, if it carries a valid one.
///
/// Extraction never fails: a missing, forged or expired token yields
/// `MaybeSession(None)` and the handler decides what that means.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = extract_session_token(&parts.headers).and_then(|token| state.codec.decode(&token));
        Ok(MaybeSession(session))
    }
}

/// Why the guard refused a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthDenied {
    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient privileges")]
    Forbidden,
}

impl From<AuthDenied> for ApiError {
    fn from(denied: AuthDenied) -> Self {
        match denied {
            AuthDenied::Unauthenticated => Self::unauthorized(denied.to_string()),
            AuthDenied::Forbidden => Self::forbidden(denied.to_string()),
        }
    }
}

/// Admit a session whose role is in `allowed`.
///
/// ```ignore
/// let session = authorize(session, Role::ELEVATED)?;
/// ```
pub fn authorize(session: Option<Session>, allowed: &[Role]) -> Result<Session, AuthDenied> {
    let session = session.ok_or(AuthDenied::Unauthenticated)?;
    if !allowed.contains(&session.role) {
        return Err(AuthDenied::Forbidden);
    }
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    fn session(role: Role) -> Session {
        Session {
            user_id: 1,
            role,
            email: "a@x.io".to_string(),
            name: "A".to_string(),
            expires_at: i64::MAX,
        }
    }

    #[test]
    fn test_authorize() {
        assert_eq!(authorize(None, Role::ANY), Err(AuthDenied::Unauthenticated));
        assert_eq!(
            authorize(Some(session(Role::Member)), Role::ELEVATED),
            Err(AuthDenied::Forbidden)
        );
        assert_eq!(
            authorize(Some(session(Role::Editor)), Role::ADMIN_ONLY),
            Err(AuthDenied::Forbidden)
        );
        assert!(authorize(Some(session(Role::Editor)), Role::ELEVATED).is_ok());
        assert!(authorize(Some(session(Role::Admin)), Role::ADMIN_ONLY).is_ok());
    }

    #[test]
    fn test_extract_token_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def; lang=ar"),
        );
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_extract_token_from_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(header::COOKIE, HeaderValue::from_static("session=from.cookie"));
        assert_eq!(extract_session_token(&headers).as_deref(), Some("from.cookie"));
    }

    #[test]
    fn test_extract_token_ignores_similar_names() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("mysession=x; session="));
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::new("RATE_LIMIT", "x").status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::from(RsvpError::Full).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(RsvpError::NotReserved).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_error_hides_details() {
        let err = ApiError::from(anyhow::anyhow!("password=hunter2"));
        assert_eq!(err.error.message, "Internal server error");
    }

    fn arb_role() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Admin), Just(Role::Editor), Just(Role::Member)]
    }

    proptest! {
        #[test]
        fn prop_authorize_admits_exactly_allowed_roles(
            role in arb_role(),
            allowed in prop::collection::vec(arb_role(), 0..4),
        ) {
            let result = authorize(Some(session(role)), &allowed);
            if allowed.contains(&role) {
                prop_assert_eq!(result.map(|s| s.role), Ok(role));
            } else {
                prop_assert_eq!(result, Err(AuthDenied::Forbidden));
            }
        }

        #[test]
        fn prop_anonymous_is_always_unauthenticated(
            allowed in prop::collection::vec(arb_role(), 0..4),
        ) {
            prop_assert_eq!(authorize(None, &allowed), Err(AuthDenied::Unauthenticated));
        }
    }
}

//! Course API endpoints
//!
//! Public catalogue:
//! - GET /api/v1/courses - Published courses
//! - GET /api/v1/courses/{slug} - Outline, with the caller's enrollment state
//!
//! Learners (any signed-in role):
//! - POST /api/v1/courses/{slug}/enroll
//! - GET /api/v1/lessons/{id}
//! - POST /api/v1/lessons/{id}/complete
//! - GET /api/v1/courses/{slug}/certificate?lang=en
//! - GET /api/v1/me/enrollments
//!
//! Authoring (ADMIN, EDITOR; deletes ADMIN only):
//! - GET /api/v1/admin/courses
//! - POST /api/v1/courses, PATCH/DELETE /api/v1/courses/{id}
//! - POST /api/v1/courses/{id}/units, PATCH/DELETE /api/v1/units/{id}
//! - POST /api/v1/units/{id}/lessons, PATCH/DELETE /api/v1/lessons/{id}

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::common::LangQuery;
use crate::api::middleware::{
    authorize, ApiError, ApiJson, ApiPath, ApiQuery, AppState, MaybeSession,
};
use crate::models::{
    Course, CreateCourseInput, CreateLessonInput, Enrollment, EnrollmentState, EnrollmentSummary,
    Lesson, Role, Unit, UnitInput, UpdateCourseInput, UpdateLessonInput, UpdateUnitInput,
};
use crate::services::certificate::Certificate;
use crate::services::course::CourseOutline;

/// Course page payload
#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub outline: CourseOutline,
    /// Absent for anonymous visitors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<EnrollmentState>,
}

pub fn router() -> Router<AppState> {
    // `{course}` is the slug for learner routes and the numeric ID for authoring
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/{course}",
            get(get_course).patch(update_course).delete(delete_course),
        )
        .route("/courses/{course}/units", post(create_unit))
        .route("/courses/{course}/enroll", post(enroll))
        .route("/courses/{course}/certificate", get(certificate))
        .route("/admin/courses", get(list_all_courses))
        .route("/units/{id}", patch(update_unit).delete(delete_unit))
        .route("/units/{id}/lessons", post(create_lesson))
        .route("/lessons/{id}", get(get_lesson).patch(update_lesson).delete(delete_lesson))
        .route("/lessons/{id}/complete", post(complete_lesson))
        .route("/me/enrollments", get(my_enrollments))
}

// ============================================================================
// Catalogue
// ============================================================================

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, ApiError> {
    Ok(Json(state.course_service.list(true).await?))
}

async fn list_all_courses(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<Vec<Course>>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.course_service.list(false).await?))
}

async fn get_course(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<CourseDetail>, ApiError> {
    let elevated = session
        .as_ref()
        .is_some_and(|s| Role::ELEVATED.contains(&s.role));
    let outline = state.course_service.outline(&slug, elevated).await?;

    let enrollment = match &session {
        Some(s) => Some(
            state
                .course_service
                .enrollment_state(s.user_id, outline.course.id)
                .await?,
        ),
        None => None,
    };

    Ok(Json(CourseDetail { outline, enrollment }))
}

// ============================================================================
// Learners
// ============================================================================

async fn enroll(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<Enrollment>, ApiError> {
    let session = authorize(session, Role::ANY)?;
    Ok(Json(state.course_service.enroll(session.user_id, &slug).await?))
}

async fn get_lesson(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Lesson>, ApiError> {
    authorize(session, Role::ANY)?;
    Ok(Json(state.course_service.get_lesson(id).await?))
}

async fn complete_lesson(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Enrollment>, ApiError> {
    let session = authorize(session, Role::ANY)?;
    Ok(Json(state.course_service.complete_lesson(session.user_id, id).await?))
}

/// GET /api/v1/courses/{slug}/certificate
async fn certificate(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(slug): ApiPath<String>,
    ApiQuery(query): ApiQuery<LangQuery>,
) -> Result<Json<Certificate>, ApiError> {
    let session = authorize(session, Role::ANY)?;
    let cert = state
        .certificate_service
        .check_eligible(session.user_id, &slug, query.lang.as_deref())
        .await?;
    Ok(Json(cert))
}

async fn my_enrollments(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Result<Json<Vec<EnrollmentSummary>>, ApiError> {
    let session = authorize(session, Role::ANY)?;
    Ok(Json(state.course_service.enrollments_of(session.user_id).await?))
}

// ============================================================================
// Authoring
// ============================================================================

async fn create_course(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiJson(body): ApiJson<CreateCourseInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ELEVATED)?;
    let course = state.course_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn update_course(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateCourseInput>,
) -> Result<Json<Course>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.course_service.update(id, body).await?))
}

async fn delete_course(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    state.course_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_unit(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(course_id): ApiPath<i64>,
    ApiJson(body): ApiJson<UnitInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ELEVATED)?;
    let unit = state.course_service.create_unit(course_id, body).await?;
    Ok((StatusCode::CREATED, Json(unit)))
}

async fn update_unit(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateUnitInput>,
) -> Result<Json<Unit>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.course_service.update_unit(id, body).await?))
}

async fn delete_unit(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    state.course_service.delete_unit(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_lesson(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(unit_id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateLessonInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ELEVATED)?;
    let lesson = state.course_service.create_lesson(unit_id, body).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

async fn update_lesson(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateLessonInput>,
) -> Result<Json<Lesson>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.course_service.update_lesson(id, body).await?))
}

async fn delete_lesson(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    state.course_service.delete_lesson(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//! Quiz API endpoints
//!
//! - POST /api/v1/units/{id}/quizzes - Attach a quiz to a unit
//! - GET /api/v1/quizzes/{id} - Quiz for a learner, answers withheld
//! - PATCH/DELETE /api/v1/quizzes/{id}
//! - GET/POST /api/v1/quizzes/{id}/questions - Questions with answers, add one
//! - PATCH/DELETE /api/v1/questions/{id}
//! - POST /api/v1/quizzes/{id}/attempts - Submit answers

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};

use crate::api::middleware::{authorize, ApiError, ApiJson, ApiPath, AppState, MaybeSession};
use crate::models::{
    CreateQuestionInput, CreateQuizInput, Question, Quiz, Role, SubmitAttemptInput,
    UpdateQuestionInput, UpdateQuizInput,
};
use crate::services::quiz::{AttemptResult, QuizView};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/units/{id}/quizzes", post(create_quiz))
        .route("/quizzes/{id}", get(get_quiz).patch(update_quiz).delete(delete_quiz))
        .route("/quizzes/{id}/questions", get(list_questions).post(add_question))
        .route("/quizzes/{id}/attempts", post(submit_attempt))
        .route("/questions/{id}", patch(update_question).delete(delete_question))
}

async fn create_quiz(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(unit_id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateQuizInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ELEVATED)?;
    let quiz = state.quiz_service.create_quiz(unit_id, body).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

async fn get_quiz(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<QuizView>, ApiError> {
    authorize(session, Role::ANY)?;
    Ok(Json(state.quiz_service.view(id).await?))
}

async fn update_quiz(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateQuizInput>,
) -> Result<Json<Quiz>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.quiz_service.update_quiz(id, body).await?))
}

async fn delete_quiz(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    state.quiz_service.delete_quiz(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_questions(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Vec<Question>>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.quiz_service.questions(id).await?))
}

async fn add_question(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateQuestionInput>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(session, Role::ELEVATED)?;
    let question = state.quiz_service.add_question(id, body).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn update_question(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<UpdateQuestionInput>,
) -> Result<Json<Question>, ApiError> {
    authorize(session, Role::ELEVATED)?;
    Ok(Json(state.quiz_service.update_question(id, body).await?))
}

async fn delete_question(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(session, Role::ADMIN_ONLY)?;
    state.quiz_service.delete_question(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/quizzes/{id}/attempts
async fn submit_attempt(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<SubmitAttemptInput>,
) -> Result<Json<AttemptResult>, ApiError> {
    let session = authorize(session, Role::ANY)?;
    let result = state
        .quiz_service
        .submit_attempt(id, session.user_id, &body.answers)
        .await?;
    Ok(Json(result))
}

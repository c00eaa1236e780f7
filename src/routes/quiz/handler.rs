use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    database::Store,
    error::AppError,
    middleware::CurrentUser,
    models::{Quiz, QuizAttempt},
    result::ApiResponse,
    services::{AttemptResult, CreateQuizRequest, QuizWithQuestions, SubmitAttemptRequest},
    utils::success_to_api_response,
};

use super::model::QuizListQuery;

pub async fn create_quiz<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<CreateQuizRequest>,
) -> Result<(StatusCode, Json<ApiResponse<QuizWithQuestions>>), AppError> {
    let quiz = state.quizzes.create_quiz(req, user.id).await?;
    Ok((StatusCode::CREATED, success_to_api_response(quiz)))
}

pub async fn list_quizzes<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<QuizListQuery>,
) -> Result<Json<ApiResponse<Vec<Quiz>>>, AppError> {
    let quizzes = state
        .quizzes
        .list_active_quizzes(query.subject.as_deref())
        .await?;
    Ok(success_to_api_response(quizzes))
}

pub async fn get_quiz<S: Store>(
    State(state): State<AppState<S>>,
    Path(quiz_id): Path<i64>,
) -> Result<Json<ApiResponse<QuizWithQuestions>>, AppError> {
    let quiz = state.quizzes.get_quiz(quiz_id).await?;
    Ok(success_to_api_response(quiz))
}

pub async fn submit_attempt<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(quiz_id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AttemptResult>>), AppError> {
    let result = state.quizzes.submit_attempt(quiz_id, user.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(result)))
}

pub async fn list_my_attempts<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<QuizAttempt>>>, AppError> {
    let attempts = state.quizzes.list_user_attempts(user.id).await?;
    Ok(success_to_api_response(attempts))
}

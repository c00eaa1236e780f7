use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};

use crate::{
    AppState,
    database::Store,
    error::AppError,
    middleware::CurrentUser,
    models::UserSummary,
    result::ApiResponse,
    routes::MessageResponse,
    services::{LoginOutcome, RegisterOutcome, RegisterRequest, VerifyOutcome},
    utils::success_to_api_response,
};

use super::model::{LoginRequest, VerifyEmailRequest};

pub async fn register<S: Store>(
    State(state): State<AppState<S>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RegisterOutcome>>), AppError> {
    let outcome = state.auth.register(req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(outcome)))
}

pub async fn verify_email<S: Store>(
    State(state): State<AppState<S>>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<VerifyOutcome>>, AppError> {
    let outcome = state.auth.verify_email(&req.token).await?;
    Ok(success_to_api_response(outcome))
}

pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginOutcome>>, AppError> {
    let outcome = state.auth.login(&req.username, &req.password).await?;
    Ok(success_to_api_response(outcome))
}

pub async fn current_user(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ApiResponse<UserSummary>> {
    success_to_api_response(UserSummary::from(&user))
}

// Tokens are stateless; the client discards its copy.
pub async fn logout(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ApiResponse<MessageResponse>> {
    tracing::info!("User {} logged out", user.username);
    success_to_api_response(MessageResponse::new("Successfully logged out"))
}

pub async fn deactivate<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.auth.deactivate_account(user.id).await?;
    Ok(success_to_api_response(MessageResponse::new(
        "Account deactivated",
    )))
}

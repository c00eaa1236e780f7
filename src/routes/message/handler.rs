use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};

use crate::{
    AppState,
    database::Store,
    error::AppError,
    middleware::CurrentUser,
    models::{Message, MessageReaction},
    result::ApiResponse,
    routes::MessageResponse,
    services::PostMessageRequest,
    utils::success_to_api_response,
};

use super::model::{EditMessageRequest, ReactionRemoved, ReactionRequest};

pub async fn post_message<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(room_id): Path<i64>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Message>>), AppError> {
    let message = state.messages.post_message(room_id, user.id, req).await?;
    Ok((StatusCode::CREATED, success_to_api_response(message)))
}

pub async fn list_room_messages<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(room_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Message>>>, AppError> {
    let messages = state.messages.list_room_messages(room_id, user.id).await?;
    Ok(success_to_api_response(messages))
}

pub async fn list_replies<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(message_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Message>>>, AppError> {
    let replies = state.messages.get_replies_to(message_id, user.id).await?;
    Ok(success_to_api_response(replies))
}

pub async fn edit_message<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(message_id): Path<i64>,
    Json(req): Json<EditMessageRequest>,
) -> Result<Json<ApiResponse<Message>>, AppError> {
    let message = state
        .messages
        .edit_message(message_id, user.id, &req.content)
        .await?;
    Ok(success_to_api_response(message))
}

pub async fn delete_message<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(message_id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.messages.delete_message(message_id, user.id).await?;
    Ok(success_to_api_response(MessageResponse::new(
        "Message deleted",
    )))
}

pub async fn list_reactions<S: Store>(
    State(state): State<AppState<S>>,
    Path(message_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<MessageReaction>>>, AppError> {
    let reactions = state.messages.list_reactions(message_id).await?;
    Ok(success_to_api_response(reactions))
}

pub async fn add_reaction<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(message_id): Path<i64>,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<ApiResponse<MessageReaction>>, AppError> {
    let reaction = state
        .messages
        .add_reaction(message_id, user.id, &req.emoji)
        .await?;
    Ok(success_to_api_response(reaction))
}

pub async fn remove_reaction<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((message_id, emoji)): Path<(i64, String)>,
) -> Result<Json<ApiResponse<ReactionRemoved>>, AppError> {
    let removed = state
        .messages
        .remove_reaction(message_id, user.id, &emoji)
        .await?;
    Ok(success_to_api_response(ReactionRemoved { removed }))
}

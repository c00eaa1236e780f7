use axum::extract::{Extension, Json, Path, Query, State};

use crate::{
    AppState,
    database::Store,
    error::AppError,
    middleware::CurrentUser,
    models::Notification,
    result::ApiResponse,
    routes::MessageResponse,
    utils::success_to_api_response,
};

use super::model::{MarkedRead, NotificationQuery};

pub async fn list_notifications<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, AppError> {
    let notifications = state
        .notifications
        .list(user.id, query.unread_only)
        .await?;
    Ok(success_to_api_response(notifications))
}

pub async fn mark_read<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(notification_id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    state.notifications.mark_read(notification_id, user.id).await?;
    Ok(success_to_api_response(MessageResponse::new(
        "Notification marked as read",
    )))
}

pub async fn mark_all_read<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<MarkedRead>>, AppError> {
    let updated = state.notifications.mark_all_read(user.id).await?;
    Ok(success_to_api_response(MarkedRead { updated }))
}

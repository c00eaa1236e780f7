use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    database::Store,
    error::AppError,
    middleware::CurrentUser,
    models::{Room, RoomMembership},
    result::ApiResponse,
    services::{CreateRoomRequest, JoinOutcome, LeaveOutcome, MemberUpdate, RoomDetail},
    utils::success_to_api_response,
};

use super::model::PublicRoomsQuery;

pub async fn create_room<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Room>>), AppError> {
    let room = state.rooms.create_room(req, user.id).await?;
    Ok((StatusCode::CREATED, success_to_api_response(room)))
}

pub async fn list_public_rooms<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<PublicRoomsQuery>,
) -> Result<Json<ApiResponse<Vec<Room>>>, AppError> {
    let rooms = state
        .rooms
        .list_public_rooms(query.university_domain.as_deref())
        .await?;
    Ok(success_to_api_response(rooms))
}

pub async fn list_my_rooms<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<Room>>>, AppError> {
    let rooms = state.rooms.list_user_rooms(user.id).await?;
    Ok(success_to_api_response(rooms))
}

pub async fn get_room<S: Store>(
    State(state): State<AppState<S>>,
    Path(room_id): Path<i64>,
) -> Result<Json<ApiResponse<RoomDetail>>, AppError> {
    let detail = state.rooms.get_room(room_id).await?;
    Ok(success_to_api_response(detail))
}

pub async fn list_members<S: Store>(
    State(state): State<AppState<S>>,
    Path(room_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<RoomMembership>>>, AppError> {
    let members = state.rooms.list_members(room_id).await?;
    Ok(success_to_api_response(members))
}

pub async fn join_room<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(room_id): Path<i64>,
) -> Result<Json<ApiResponse<JoinOutcome>>, AppError> {
    let outcome = state.rooms.join_room(room_id, user.id).await?;
    Ok(success_to_api_response(outcome))
}

pub async fn leave_room<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(room_id): Path<i64>,
) -> Result<Json<ApiResponse<LeaveOutcome>>, AppError> {
    let outcome = state.rooms.leave_room(room_id, user.id).await?;
    Ok(success_to_api_response(outcome))
}

pub async fn update_member<S: Store>(
    State(state): State<AppState<S>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path((room_id, target_user_id)): Path<(i64, i64)>,
    Json(update): Json<MemberUpdate>,
) -> Result<Json<ApiResponse<RoomMembership>>, AppError> {
    let membership = state
        .rooms
        .update_member(room_id, user.id, target_user_id, update)
        .await?;
    Ok(success_to_api_response(membership))
}

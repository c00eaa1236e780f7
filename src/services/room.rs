//! Rooms and their memberships.
//!
//! Invariant: an active room that has members always has at least one admin.
//! `create_room` inserts the founding admin with the room, `leave_room` hands
//! the admin role on before the last admin goes (or deactivates an emptied
//! room), and `update_member` refuses to demote the only admin. Every
//! membership change locks the room row first, so capacity checks and admin
//! counts are never evaluated against a stale member set.

use serde::{Deserialize, Serialize};

use crate::database::{Store, StoreTx};
use crate::error::AppError;
use crate::models::room::DEFAULT_MAX_MEMBERS;
use crate::models::{MemberRole, NewRoom, Room, RoomMembership, RoomType};
use crate::services::notification;
use crate::utils::ensure_max_chars;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub room_type: RoomType,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub max_members: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinOutcome {
    pub message: String,
    pub room_id: i64,
    pub role: MemberRole,
}

/// What happened to the admin role when a member left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Succession {
    NotNeeded,
    Promoted { membership_id: i64, user_id: i64 },
    RoomDeactivated,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaveOutcome {
    pub message: String,
    pub succession: Succession,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomDetail {
    #[serde(flatten)]
    pub room: Room,
    pub member_count: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberUpdate {
    #[serde(default)]
    pub role: Option<MemberRole>,
    #[serde(default)]
    pub is_muted: Option<bool>,
}

/// Decides admin succession for `departing` given the room's current members
/// (ordered by join time). Only a sole admin triggers succession: the
/// longest-standing other member is promoted, or the room is deactivated
/// when nobody else is left.
pub fn plan_succession(departing: &RoomMembership, members: &[RoomMembership]) -> Succession {
    if !departing.is_admin() {
        return Succession::NotNeeded;
    }

    let admins = members.iter().filter(|m| m.is_admin()).count();
    if admins > 1 {
        return Succession::NotNeeded;
    }

    match members.iter().find(|m| m.user_id != departing.user_id) {
        Some(next) => Succession::Promoted {
            membership_id: next.id,
            user_id: next.user_id,
        },
        None => Succession::RoomDeactivated,
    }
}

#[derive(Clone)]
pub struct RoomService<S> {
    store: S,
}

impl<S: Store> RoomService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a room scoped to the creator's university with the creator as
    /// its admin. Room and membership are committed together.
    pub async fn create_room(
        &self,
        data: CreateRoomRequest,
        creator_id: i64,
    ) -> Result<Room, AppError> {
        let name = data.name.trim();
        if name.is_empty() || name.chars().count() > 100 {
            return Err(AppError::Validation(
                "Room name must be between 1 and 100 characters".to_string(),
            ));
        }
        let max_members = data.max_members.unwrap_or(DEFAULT_MAX_MEMBERS);
        if max_members < 1 {
            return Err(AppError::Validation(
                "max_members must be at least 1".to_string(),
            ));
        }
        if let Some(subject) = &data.subject {
            ensure_max_chars("Subject", subject, 100)?;
        }

        let mut tx = self.store.begin().await?;
        let creator = tx
            .find_user_by_id(creator_id)
            .await?
            .ok_or(AppError::CreatorNotFound)?;

        let room = tx
            .insert_room(NewRoom {
                name: name.to_string(),
                description: data.description,
                room_type: data.room_type,
                subject: data.subject,
                university_domain: Some(creator.university_domain),
                max_members,
                created_by: creator_id,
            })
            .await?;
        tx.insert_membership(room.id, creator_id, MemberRole::Admin)
            .await?;
        tx.commit().await?;

        tracing::info!("User {} created room {} ({})", creator_id, room.id, room.name);
        Ok(room)
    }

    pub async fn join_room(&self, room_id: i64, user_id: i64) -> Result<JoinOutcome, AppError> {
        let mut tx = self.store.begin().await?;

        let room = tx
            .lock_room(room_id)
            .await?
            .filter(|room| room.is_active)
            .ok_or(AppError::RoomNotFound)?;
        let user = tx
            .find_user_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        if tx.find_membership(room_id, user_id).await?.is_some() {
            return Err(AppError::AlreadyMember);
        }
        if !room.admits_domain(&user.university_domain) {
            return Err(AppError::DomainRestricted);
        }
        // Every membership row counts toward capacity, muted ones included.
        let current = tx.count_memberships(room_id).await?;
        if current >= i64::from(room.max_members) {
            return Err(AppError::RoomFull);
        }

        tx.insert_membership(room_id, user_id, MemberRole::Member)
            .await?;
        tx.commit().await?;

        tracing::info!("User {} joined room {}", user_id, room_id);
        Ok(JoinOutcome {
            message: format!("Successfully joined {}", room.name),
            room_id,
            role: MemberRole::Member,
        })
    }

    pub async fn leave_room(&self, room_id: i64, user_id: i64) -> Result<LeaveOutcome, AppError> {
        let mut tx = self.store.begin().await?;

        let room = tx.lock_room(room_id).await?;
        let membership = tx
            .find_membership(room_id, user_id)
            .await?
            .ok_or(AppError::NotAMember)?;
        let members = tx.list_memberships(room_id).await?;

        let succession = plan_succession(&membership, &members);
        match succession {
            Succession::Promoted {
                membership_id,
                user_id: successor,
            } => {
                let muted = members
                    .iter()
                    .find(|m| m.id == membership_id)
                    .is_some_and(|m| m.is_muted);
                tx.update_membership(membership_id, MemberRole::Admin, muted)
                    .await?;
                let room_name = room.as_ref().map_or("a room", |r| r.name.as_str());
                tx.insert_notification(notification::promoted_to_admin(
                    successor, room_id, room_name,
                ))
                .await?;
                tracing::info!(
                    "Admin {} left room {}, promoted user {}",
                    user_id,
                    room_id,
                    successor
                );
            }
            Succession::RoomDeactivated => {
                tx.deactivate_room(room_id).await?;
                tracing::info!("Last member {} left room {}, room deactivated", user_id, room_id);
            }
            Succession::NotNeeded => {}
        }

        tx.delete_membership(membership.id).await?;
        tx.commit().await?;

        tracing::info!("User {} left room {}", user_id, room_id);
        Ok(LeaveOutcome {
            message: "Successfully left the room".to_string(),
            succession,
        })
    }

    /// Active rooms the user belongs to.
    pub async fn list_user_rooms(&self, user_id: i64) -> Result<Vec<Room>, AppError> {
        let mut tx = self.store.begin().await?;
        let rooms = tx.list_rooms_for_user(user_id).await?;
        tx.commit().await?;
        Ok(rooms)
    }

    /// Active public rooms. A domain filter keeps rooms of that domain plus
    /// unrestricted ones.
    pub async fn list_public_rooms(&self, domain: Option<&str>) -> Result<Vec<Room>, AppError> {
        let domain = domain.map(str::trim).filter(|d| !d.is_empty());
        let mut tx = self.store.begin().await?;
        let rooms = tx.list_public_rooms(domain).await?;
        tx.commit().await?;
        Ok(rooms)
    }

    pub async fn get_room(&self, room_id: i64) -> Result<RoomDetail, AppError> {
        let mut tx = self.store.begin().await?;
        let room = tx.find_room(room_id).await?.ok_or(AppError::RoomNotFound)?;
        let member_count = tx.count_memberships(room_id).await?;
        tx.commit().await?;
        Ok(RoomDetail { room, member_count })
    }

    pub async fn list_members(&self, room_id: i64) -> Result<Vec<RoomMembership>, AppError> {
        let mut tx = self.store.begin().await?;
        if tx.find_room(room_id).await?.is_none() {
            return Err(AppError::RoomNotFound);
        }
        let members = tx.list_memberships(room_id).await?;
        tx.commit().await?;
        Ok(members)
    }

    /// Changes a member's role or mute flag. Only room admins may do this.
    pub async fn update_member(
        &self,
        room_id: i64,
        actor_id: i64,
        target_user_id: i64,
        update: MemberUpdate,
    ) -> Result<RoomMembership, AppError> {
        let mut tx = self.store.begin().await?;

        let room = tx.lock_room(room_id).await?.ok_or(AppError::RoomNotFound)?;
        let actor = tx.find_membership(room_id, actor_id).await?;
        if !actor.as_ref().is_some_and(RoomMembership::is_admin) {
            return Err(AppError::Forbidden(
                "Only room admins can manage members".to_string(),
            ));
        }
        let target = tx
            .find_membership(room_id, target_user_id)
            .await?
            .ok_or(AppError::NotAMember)?;

        let role = update.role.unwrap_or(target.role);
        let is_muted = update.is_muted.unwrap_or(target.is_muted);

        if target.is_admin() && role != MemberRole::Admin {
            let members = tx.list_memberships(room_id).await?;
            if members.iter().filter(|m| m.is_admin()).count() <= 1 {
                return Err(AppError::LastAdmin);
            }
        }

        let updated = tx.update_membership(target.id, role, is_muted).await?;
        if role != target.role {
            tx.insert_notification(notification::role_changed(
                target_user_id,
                room_id,
                &room.name,
                role,
            ))
            .await?;
        }
        tx.commit().await?;

        tracing::info!(
            "User {} updated member {} in room {}: role={:?} muted={}",
            actor_id,
            target_user_id,
            room_id,
            role,
            is_muted
        );
        Ok(updated)
    }
}

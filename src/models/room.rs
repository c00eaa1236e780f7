use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const DEFAULT_MAX_MEMBERS: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "room_type", rename_all = "snake_case")]
pub enum RoomType {
    #[default]
    Public,
    Private,
    StudyGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "member_role", rename_all = "snake_case")]
pub enum MemberRole {
    Admin,
    Moderator,
    Member,
}

impl MemberRole {
    /// Admins and moderators may remove other people's messages.
    pub fn can_moderate(self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Moderator)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub room_type: RoomType,
    pub subject: Option<String>,
    /// `None` means the room admits users from any university.
    pub university_domain: Option<String>,
    pub max_members: i32,
    pub is_active: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    pub fn admits_domain(&self, domain: &str) -> bool {
        match &self.university_domain {
            Some(restricted) => restricted == domain,
            None => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub description: Option<String>,
    pub room_type: RoomType,
    pub subject: Option<String>,
    pub university_domain: Option<String>,
    pub max_members: i32,
    pub created_by: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoomMembership {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub is_muted: bool,
}

impl RoomMembership {
    pub fn is_admin(&self) -> bool {
        self.role == MemberRole::Admin
    }
}

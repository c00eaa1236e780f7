//! Transactional store.
//!
//! Every service operation opens one [`StoreTx`], performs all of its reads and
//! writes through it, and finishes with [`StoreTx::commit`]. Dropping a
//! transaction without committing discards its writes, so a failed validation
//! halfway through an operation never leaves partial effects behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    MemberRole, Message, MessageReaction, NewAttempt, NewMessage, NewNotification, NewQuestion,
    NewQuiz, NewRoom, NewUser, Notification, Quiz, QuizAttempt, QuizQuestion, Room,
    RoomMembership, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// A uniqueness constraint rejected a write. Carries the constraint name.
    #[error("constraint violated: {0}")]
    Conflict(String),

    /// A write referenced a row that does not exist.
    #[error("{0} {1} does not exist")]
    NotFound(&'static str, i64),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Whether running the same operation again may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Database(_) | StoreError::Conflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::Conflict(db_err.constraint().unwrap_or("unique").to_string());
            }
        }
        StoreError::Database(err)
    }
}

#[async_trait]
pub trait Store: Clone + Send + Sync + 'static {
    type Tx: StoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self) -> Result<(), StoreError>;

    // users
    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError>;
    async fn find_user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&mut self, username: &str)
    -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_verification_token(
        &mut self,
        token: &str,
    ) -> Result<Option<User>, StoreError>;
    /// Sets `is_verified` and clears the verification token.
    async fn mark_user_verified(&mut self, id: i64) -> Result<(), StoreError>;
    async fn update_last_seen(&mut self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError>;
    async fn set_user_active(&mut self, id: i64, active: bool) -> Result<(), StoreError>;

    // rooms
    async fn insert_room(&mut self, room: NewRoom) -> Result<Room, StoreError>;
    async fn find_room(&mut self, id: i64) -> Result<Option<Room>, StoreError>;
    /// Like `find_room`, but holds the room row exclusively until the
    /// transaction ends. Membership changes go through this.
    async fn lock_room(&mut self, id: i64) -> Result<Option<Room>, StoreError>;
    async fn deactivate_room(&mut self, id: i64) -> Result<(), StoreError>;
    async fn list_rooms_for_user(&mut self, user_id: i64) -> Result<Vec<Room>, StoreError>;
    /// Active public rooms. With a domain, only rooms of that domain or unrestricted ones.
    async fn list_public_rooms(&mut self, domain: Option<&str>) -> Result<Vec<Room>, StoreError>;

    // memberships
    async fn insert_membership(
        &mut self,
        room_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<RoomMembership, StoreError>;
    async fn find_membership(
        &mut self,
        room_id: i64,
        user_id: i64,
    ) -> Result<Option<RoomMembership>, StoreError>;
    /// Ordered by `joined_at`, then id.
    async fn list_memberships(&mut self, room_id: i64) -> Result<Vec<RoomMembership>, StoreError>;
    async fn count_memberships(&mut self, room_id: i64) -> Result<i64, StoreError>;
    async fn update_membership(
        &mut self,
        membership_id: i64,
        role: MemberRole,
        is_muted: bool,
    ) -> Result<RoomMembership, StoreError>;
    async fn delete_membership(&mut self, membership_id: i64) -> Result<(), StoreError>;

    // messages
    async fn insert_message(&mut self, message: NewMessage) -> Result<Message, StoreError>;
    async fn find_message(&mut self, id: i64) -> Result<Option<Message>, StoreError>;
    /// Non-deleted messages, oldest first.
    async fn list_room_messages(&mut self, room_id: i64) -> Result<Vec<Message>, StoreError>;
    /// Non-deleted direct replies, oldest first.
    async fn list_replies(&mut self, parent_id: i64) -> Result<Vec<Message>, StoreError>;
    async fn update_message_content(
        &mut self,
        id: i64,
        content: &str,
    ) -> Result<Message, StoreError>;
    async fn soft_delete_message(&mut self, id: i64) -> Result<(), StoreError>;
    async fn insert_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<MessageReaction, StoreError>;
    async fn find_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<Option<MessageReaction>, StoreError>;
    async fn delete_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<bool, StoreError>;
    async fn list_reactions(&mut self, message_id: i64) -> Result<Vec<MessageReaction>, StoreError>;

    // quizzes
    async fn insert_quiz(&mut self, quiz: NewQuiz) -> Result<Quiz, StoreError>;
    async fn insert_question(
        &mut self,
        quiz_id: i64,
        question: NewQuestion,
    ) -> Result<QuizQuestion, StoreError>;
    async fn find_quiz(&mut self, id: i64) -> Result<Option<Quiz>, StoreError>;
    /// Ordered by `order_index`, then id.
    async fn list_questions(&mut self, quiz_id: i64) -> Result<Vec<QuizQuestion>, StoreError>;
    async fn list_active_quizzes(&mut self, subject: Option<&str>)
    -> Result<Vec<Quiz>, StoreError>;
    async fn insert_attempt(&mut self, attempt: NewAttempt) -> Result<QuizAttempt, StoreError>;
    async fn list_attempts_for_user(&mut self, user_id: i64)
    -> Result<Vec<QuizAttempt>, StoreError>;

    // notifications
    async fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError>;
    /// Newest first.
    async fn list_notifications(
        &mut self,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError>;
    async fn mark_notification_read(&mut self, id: i64, user_id: i64) -> Result<bool, StoreError>;
    async fn mark_all_notifications_read(&mut self, user_id: i64) -> Result<u64, StoreError>;
}

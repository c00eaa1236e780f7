use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Executor, Postgres, Transaction};

use super::{Store, StoreError, StoreTx};
use crate::config::Config;
use crate::models::{
    MemberRole, Message, MessageReaction, NewAttempt, NewMessage, NewNotification, NewQuestion,
    NewQuiz, NewRoom, NewUser, Notification, Quiz, QuizAttempt, QuizQuestion, Room,
    RoomMembership, User,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, first_name, last_name, \
    university_domain, university_badge, is_verified, verification_token, is_active, \
    last_seen, created_at, updated_at";

const ROOM_COLUMNS: &str = "id, name, description, room_type, subject, university_domain, \
    max_members, is_active, created_by, created_at, updated_at";

const MEMBERSHIP_COLUMNS: &str = "id, room_id, user_id, role, joined_at, is_muted";

const MESSAGE_COLUMNS: &str = "id, room_id, user_id, content, message_type, file_url, \
    metadata, parent_id, is_edited, is_deleted, created_at, updated_at";

const REACTION_COLUMNS: &str = "id, message_id, user_id, emoji, created_at";

const QUIZ_COLUMNS: &str = "id, title, description, subject, difficulty, time_limit, \
    total_questions, total_points, is_active, start_time, end_time, created_by, created_at";

const QUESTION_COLUMNS: &str = "id, quiz_id, question_text, question_type, options, \
    correct_answer, explanation, points, order_index";

const ATTEMPT_COLUMNS: &str = "id, quiz_id, user_id, answers, score, total_points, \
    time_taken, is_completed, started_at, completed_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, notification_type, \
    related_id, related_type, is_read, priority, created_at";

/// Postgres-backed store. Cloning shares the underlying pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects, tags the session and applies pending migrations.
    pub async fn connect(config: &Config) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("SET application_name = 'unichat_backend';")
                        .await?;
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        Ok(PgTx {
            tx: self.pool.begin().await?,
        })
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO users (
                username, email, password_hash, first_name, last_name,
                university_domain, university_badge, verification_token, is_verified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)
            RETURNING {USER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, User>(&sql)
            .bind(user.username)
            .bind(user.email)
            .bind(user.password_hash)
            .bind(user.first_name)
            .bind(user.last_name)
            .bind(user.university_domain)
            .bind(user.university_badge)
            .bind(user.verification_token)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_by_verification_token(
        &mut self,
        token: &str,
    ) -> Result<Option<User>, StoreError> {
        // Row lock so two concurrent verifications cannot both consume the token.
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE verification_token = $1 FOR UPDATE"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn mark_user_verified(&mut self, id: i64) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, verification_token = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_last_seen(&mut self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET last_seen = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn set_user_active(&mut self, id: i64, active: bool) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2")
            .bind(active)
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_room(&mut self, room: NewRoom) -> Result<Room, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO rooms (
                name, description, room_type, subject, university_domain,
                max_members, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ROOM_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Room>(&sql)
            .bind(room.name)
            .bind(room.description)
            .bind(room.room_type)
            .bind(room.subject)
            .bind(room.university_domain)
            .bind(room.max_members)
            .bind(room.created_by)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_room(&mut self, id: i64) -> Result<Option<Room>, StoreError> {
        let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1");
        let room = sqlx::query_as::<_, Room>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(room)
    }

    async fn lock_room(&mut self, id: i64) -> Result<Option<Room>, StoreError> {
        let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1 FOR UPDATE");
        let room = sqlx::query_as::<_, Room>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(room)
    }

    async fn deactivate_room(&mut self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE rooms SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_rooms_for_user(&mut self, user_id: i64) -> Result<Vec<Room>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ROOM_COLUMNS}
            FROM rooms
            WHERE is_active
              AND id IN (SELECT room_id FROM room_members WHERE user_id = $1)
            ORDER BY id
            "#
        );
        let rooms = sqlx::query_as::<_, Room>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rooms)
    }

    async fn list_public_rooms(&mut self, domain: Option<&str>) -> Result<Vec<Room>, StoreError> {
        let sql = format!(
            r#"
            SELECT {ROOM_COLUMNS}
            FROM rooms
            WHERE is_active
              AND room_type = 'public'
              AND ($1::TEXT IS NULL OR university_domain = $1 OR university_domain IS NULL)
            ORDER BY id
            "#
        );
        let rooms = sqlx::query_as::<_, Room>(&sql)
            .bind(domain)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rooms)
    }

    async fn insert_membership(
        &mut self,
        room_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<RoomMembership, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO room_members (room_id, user_id, role, joined_at, is_muted)
            VALUES ($1, $2, $3, clock_timestamp(), FALSE)
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RoomMembership>(&sql)
            .bind(room_id)
            .bind(user_id)
            .bind(role)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_membership(
        &mut self,
        room_id: i64,
        user_id: i64,
    ) -> Result<Option<RoomMembership>, StoreError> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM room_members WHERE room_id = $1 AND user_id = $2"
        );
        let membership = sqlx::query_as::<_, RoomMembership>(&sql)
            .bind(room_id)
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(membership)
    }

    async fn list_memberships(&mut self, room_id: i64) -> Result<Vec<RoomMembership>, StoreError> {
        let sql = format!(
            "SELECT {MEMBERSHIP_COLUMNS} FROM room_members WHERE room_id = $1 ORDER BY joined_at, id"
        );
        let members = sqlx::query_as::<_, RoomMembership>(&sql)
            .bind(room_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(members)
    }

    async fn count_memberships(&mut self, room_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM room_members WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn update_membership(
        &mut self,
        membership_id: i64,
        role: MemberRole,
        is_muted: bool,
    ) -> Result<RoomMembership, StoreError> {
        let sql = format!(
            r#"
            UPDATE room_members
            SET role = $1, is_muted = $2
            WHERE id = $3
            RETURNING {MEMBERSHIP_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, RoomMembership>(&sql)
            .bind(role)
            .bind(is_muted)
            .bind(membership_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn delete_membership(&mut self, membership_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM room_members WHERE id = $1")
            .bind(membership_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_message(&mut self, message: NewMessage) -> Result<Message, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO messages (
                room_id, user_id, content, message_type, file_url, metadata, parent_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {MESSAGE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Message>(&sql)
            .bind(message.room_id)
            .bind(message.user_id)
            .bind(message.content)
            .bind(message.message_type)
            .bind(message.file_url)
            .bind(message.metadata.map(Json))
            .bind(message.parent_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_message(&mut self, id: i64) -> Result<Option<Message>, StoreError> {
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let message = sqlx::query_as::<_, Message>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(message)
    }

    async fn list_room_messages(&mut self, room_id: i64) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE room_id = $1 AND NOT is_deleted
            ORDER BY created_at, id
            "#
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(room_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(messages)
    }

    async fn list_replies(&mut self, parent_id: i64) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            r#"
            SELECT {MESSAGE_COLUMNS}
            FROM messages
            WHERE parent_id = $1 AND NOT is_deleted
            ORDER BY created_at, id
            "#
        );
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(parent_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(messages)
    }

    async fn update_message_content(
        &mut self,
        id: i64,
        content: &str,
    ) -> Result<Message, StoreError> {
        let sql = format!(
            r#"
            UPDATE messages
            SET content = $1, is_edited = TRUE, updated_at = NOW()
            WHERE id = $2
            RETURNING {MESSAGE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Message>(&sql)
            .bind(content)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn soft_delete_message(&mut self, id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE messages SET is_deleted = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<MessageReaction, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO message_reactions (message_id, user_id, emoji)
            VALUES ($1, $2, $3)
            RETURNING {REACTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, MessageReaction>(&sql)
            .bind(message_id)
            .bind(user_id)
            .bind(emoji)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<Option<MessageReaction>, StoreError> {
        let sql = format!(
            r#"
            SELECT {REACTION_COLUMNS}
            FROM message_reactions
            WHERE message_id = $1 AND user_id = $2 AND emoji = $3
            "#
        );
        let reaction = sqlx::query_as::<_, MessageReaction>(&sql)
            .bind(message_id)
            .bind(user_id)
            .bind(emoji)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(reaction)
    }

    async fn delete_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM message_reactions WHERE message_id = $1 AND user_id = $2 AND emoji = $3",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(emoji)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_reactions(&mut self, message_id: i64) -> Result<Vec<MessageReaction>, StoreError> {
        let sql = format!(
            "SELECT {REACTION_COLUMNS} FROM message_reactions WHERE message_id = $1 ORDER BY id"
        );
        let reactions = sqlx::query_as::<_, MessageReaction>(&sql)
            .bind(message_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(reactions)
    }

    async fn insert_quiz(&mut self, quiz: NewQuiz) -> Result<Quiz, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO quizzes (
                title, description, subject, difficulty, time_limit, total_questions,
                total_points, start_time, end_time, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {QUIZ_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Quiz>(&sql)
            .bind(quiz.title)
            .bind(quiz.description)
            .bind(quiz.subject)
            .bind(quiz.difficulty)
            .bind(quiz.time_limit)
            .bind(quiz.total_questions)
            .bind(quiz.total_points)
            .bind(quiz.start_time)
            .bind(quiz.end_time)
            .bind(quiz.created_by)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn insert_question(
        &mut self,
        quiz_id: i64,
        question: NewQuestion,
    ) -> Result<QuizQuestion, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO quiz_questions (
                quiz_id, question_text, question_type, options, correct_answer,
                explanation, points, order_index
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {QUESTION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, QuizQuestion>(&sql)
            .bind(quiz_id)
            .bind(question.question_text)
            .bind(question.question_type)
            .bind(Json(question.options))
            .bind(question.correct_answer)
            .bind(question.explanation)
            .bind(question.points)
            .bind(question.order_index)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn find_quiz(&mut self, id: i64) -> Result<Option<Quiz>, StoreError> {
        let sql = format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1");
        let quiz = sqlx::query_as::<_, Quiz>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(quiz)
    }

    async fn list_questions(&mut self, quiz_id: i64) -> Result<Vec<QuizQuestion>, StoreError> {
        let sql = format!(
            "SELECT {QUESTION_COLUMNS} FROM quiz_questions WHERE quiz_id = $1 ORDER BY order_index, id"
        );
        let questions = sqlx::query_as::<_, QuizQuestion>(&sql)
            .bind(quiz_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(questions)
    }

    async fn list_active_quizzes(
        &mut self,
        subject: Option<&str>,
    ) -> Result<Vec<Quiz>, StoreError> {
        let sql = format!(
            r#"
            SELECT {QUIZ_COLUMNS}
            FROM quizzes
            WHERE is_active AND ($1::TEXT IS NULL OR subject = $1)
            ORDER BY created_at DESC, id DESC
            "#
        );
        let quizzes = sqlx::query_as::<_, Quiz>(&sql)
            .bind(subject)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(quizzes)
    }

    async fn insert_attempt(&mut self, attempt: NewAttempt) -> Result<QuizAttempt, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO quiz_attempts (
                quiz_id, user_id, answers, score, total_points, time_taken,
                is_completed, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7, $8)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(attempt.quiz_id)
            .bind(attempt.user_id)
            .bind(Json(attempt.answers))
            .bind(attempt.score)
            .bind(attempt.total_points)
            .bind(attempt.time_taken)
            .bind(attempt.started_at)
            .bind(attempt.completed_at)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_attempts_for_user(
        &mut self,
        user_id: i64,
    ) -> Result<Vec<QuizAttempt>, StoreError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE user_id = $1 ORDER BY started_at DESC, id DESC"
        );
        let attempts = sqlx::query_as::<_, QuizAttempt>(&sql)
            .bind(user_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(attempts)
    }

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO notifications (
                user_id, title, message, notification_type, related_id, related_type, priority
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Notification>(&sql)
            .bind(notification.user_id)
            .bind(notification.title)
            .bind(notification.message)
            .bind(notification.notification_type)
            .bind(notification.related_id)
            .bind(notification.related_type)
            .bind(notification.priority)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn list_notifications(
        &mut self,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY created_at DESC, id DESC
            "#
        );
        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(unread_only)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(notifications)
    }

    async fn mark_notification_read(&mut self, id: i64, user_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_notifications_read(&mut self, user_id: i64) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }
}

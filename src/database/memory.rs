//! In-process store for tests and local runs (`DATABASE_URL=memory://`).
//!
//! A transaction holds the store-wide lock from `begin` until it is committed
//! or dropped, which makes every transaction serializable. The first write
//! stages a copy of the state; later reads and writes go to that copy, and
//! commit swaps it in. Read-only transactions never copy anything.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, StoreError, StoreTx};
use crate::models::{
    MemberRole, Message, MessageReaction, NewAttempt, NewMessage, NewNotification, NewQuestion,
    NewQuiz, NewRoom, NewUser, Notification, Quiz, QuizAttempt, QuizQuestion, Room, RoomMembership,
    RoomType, User,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_id: i64,
    users: BTreeMap<i64, User>,
    rooms: BTreeMap<i64, Room>,
    memberships: BTreeMap<i64, RoomMembership>,
    messages: BTreeMap<i64, Message>,
    reactions: BTreeMap<i64, MessageReaction>,
    quizzes: BTreeMap<i64, Quiz>,
    questions: BTreeMap<i64, QuizQuestion>,
    attempts: BTreeMap<i64, QuizAttempt>,
    notifications: BTreeMap<i64, Notification>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        Ok(MemoryTx {
            guard,
            staged: None,
        })
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: Option<MemoryState>,
}

impl MemoryTx {
    fn read(&self) -> &MemoryState {
        self.staged.as_ref().unwrap_or(&*self.guard)
    }

    fn write(&mut self) -> &mut MemoryState {
        let guard = &self.guard;
        self.staged.get_or_insert_with(|| MemoryState::clone(guard))
    }
}

fn missing(what: &'static str, id: i64) -> StoreError {
    StoreError::NotFound(what, id)
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self) -> Result<(), StoreError> {
        let MemoryTx { mut guard, staged } = self;
        if let Some(staged) = staged {
            *guard = staged;
        }
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User, StoreError> {
        let state = self.write();
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }
        if state.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }

        let now = Utc::now();
        let row = User {
            id: state.next_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            university_domain: user.university_domain,
            university_badge: user.university_badge,
            is_verified: false,
            verification_token: Some(user.verification_token),
            is_active: true,
            last_seen: None,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_user_by_id(&mut self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_user_by_username(
        &mut self,
        username: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read().users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_verification_token(
        &mut self,
        token: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()
            .users
            .values()
            .find(|u| u.verification_token.as_deref() == Some(token))
            .cloned())
    }

    async fn mark_user_verified(&mut self, id: i64) -> Result<(), StoreError> {
        let user = self.write().users.get_mut(&id).ok_or_else(|| missing("user", id))?;
        user.is_verified = true;
        user.verification_token = None;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn update_last_seen(&mut self, id: i64, at: DateTime<Utc>) -> Result<(), StoreError> {
        let user = self.write().users.get_mut(&id).ok_or_else(|| missing("user", id))?;
        user.last_seen = Some(at);
        Ok(())
    }

    async fn set_user_active(&mut self, id: i64, active: bool) -> Result<(), StoreError> {
        let user = self.write().users.get_mut(&id).ok_or_else(|| missing("user", id))?;
        user.is_active = active;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_room(&mut self, room: NewRoom) -> Result<Room, StoreError> {
        let state = self.write();
        if !state.users.contains_key(&room.created_by) {
            return Err(missing("user", room.created_by));
        }
        let now = Utc::now();
        let row = Room {
            id: state.next_id(),
            name: room.name,
            description: room.description,
            room_type: room.room_type,
            subject: room.subject,
            university_domain: room.university_domain,
            max_members: room.max_members,
            is_active: true,
            created_by: room.created_by,
            created_at: now,
            updated_at: now,
        };
        state.rooms.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_room(&mut self, id: i64) -> Result<Option<Room>, StoreError> {
        Ok(self.read().rooms.get(&id).cloned())
    }

    async fn lock_room(&mut self, id: i64) -> Result<Option<Room>, StoreError> {
        // The transaction already holds the store-wide lock.
        self.find_room(id).await
    }

    async fn deactivate_room(&mut self, id: i64) -> Result<(), StoreError> {
        let room = self.write().rooms.get_mut(&id).ok_or_else(|| missing("room", id))?;
        room.is_active = false;
        room.updated_at = Utc::now();
        Ok(())
    }

    async fn list_rooms_for_user(&mut self, user_id: i64) -> Result<Vec<Room>, StoreError> {
        let state = self.read();
        Ok(state
            .rooms
            .values()
            .filter(|room| room.is_active)
            .filter(|room| {
                state
                    .memberships
                    .values()
                    .any(|m| m.room_id == room.id && m.user_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn list_public_rooms(&mut self, domain: Option<&str>) -> Result<Vec<Room>, StoreError> {
        Ok(self
            .read()
            .rooms
            .values()
            .filter(|room| room.is_active && room.room_type == RoomType::Public)
            .filter(|room| match (domain, room.university_domain.as_deref()) {
                (None, _) | (Some(_), None) => true,
                (Some(wanted), Some(actual)) => wanted == actual,
            })
            .cloned()
            .collect())
    }

    async fn insert_membership(
        &mut self,
        room_id: i64,
        user_id: i64,
        role: MemberRole,
    ) -> Result<RoomMembership, StoreError> {
        let state = self.write();
        if !state.rooms.contains_key(&room_id) {
            return Err(missing("room", room_id));
        }
        if !state.users.contains_key(&user_id) {
            return Err(missing("user", user_id));
        }
        if state
            .memberships
            .values()
            .any(|m| m.room_id == room_id && m.user_id == user_id)
        {
            return Err(StoreError::Conflict("room_members_room_user_key".to_string()));
        }
        let row = RoomMembership {
            id: state.next_id(),
            room_id,
            user_id,
            role,
            joined_at: Utc::now(),
            is_muted: false,
        };
        state.memberships.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_membership(
        &mut self,
        room_id: i64,
        user_id: i64,
    ) -> Result<Option<RoomMembership>, StoreError> {
        Ok(self
            .read()
            .memberships
            .values()
            .find(|m| m.room_id == room_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_memberships(&mut self, room_id: i64) -> Result<Vec<RoomMembership>, StoreError> {
        let mut members: Vec<RoomMembership> = self
            .read()
            .memberships
            .values()
            .filter(|m| m.room_id == room_id)
            .cloned()
            .collect();
        members.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then(a.id.cmp(&b.id)));
        Ok(members)
    }

    async fn count_memberships(&mut self, room_id: i64) -> Result<i64, StoreError> {
        let count = self
            .read()
            .memberships
            .values()
            .filter(|m| m.room_id == room_id)
            .count();
        Ok(count as i64)
    }

    async fn update_membership(
        &mut self,
        membership_id: i64,
        role: MemberRole,
        is_muted: bool,
    ) -> Result<RoomMembership, StoreError> {
        let membership = self
            .write()
            .memberships
            .get_mut(&membership_id)
            .ok_or_else(|| missing("membership", membership_id))?;
        membership.role = role;
        membership.is_muted = is_muted;
        Ok(membership.clone())
    }

    async fn delete_membership(&mut self, membership_id: i64) -> Result<(), StoreError> {
        self.write().memberships.remove(&membership_id);
        Ok(())
    }

    async fn insert_message(&mut self, message: NewMessage) -> Result<Message, StoreError> {
        let state = self.write();
        if !state.rooms.contains_key(&message.room_id) {
            return Err(missing("room", message.room_id));
        }
        if let Some(parent_id) = message.parent_id {
            if !state.messages.contains_key(&parent_id) {
                return Err(missing("message", parent_id));
            }
        }
        let now = Utc::now();
        let row = Message {
            id: state.next_id(),
            room_id: message.room_id,
            user_id: message.user_id,
            content: message.content,
            message_type: message.message_type,
            file_url: message.file_url,
            metadata: message.metadata.map(Json),
            parent_id: message.parent_id,
            is_edited: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        state.messages.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_message(&mut self, id: i64) -> Result<Option<Message>, StoreError> {
        Ok(self.read().messages.get(&id).cloned())
    }

    async fn list_room_messages(&mut self, room_id: i64) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .read()
            .messages
            .values()
            .filter(|m| m.room_id == room_id && !m.is_deleted)
            .cloned()
            .collect())
    }

    async fn list_replies(&mut self, parent_id: i64) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .read()
            .messages
            .values()
            .filter(|m| m.parent_id == Some(parent_id) && !m.is_deleted)
            .cloned()
            .collect())
    }

    async fn update_message_content(
        &mut self,
        id: i64,
        content: &str,
    ) -> Result<Message, StoreError> {
        let message = self
            .write()
            .messages
            .get_mut(&id)
            .ok_or_else(|| missing("message", id))?;
        message.content = content.to_string();
        message.is_edited = true;
        message.updated_at = Utc::now();
        Ok(message.clone())
    }

    async fn soft_delete_message(&mut self, id: i64) -> Result<(), StoreError> {
        let message = self
            .write()
            .messages
            .get_mut(&id)
            .ok_or_else(|| missing("message", id))?;
        message.is_deleted = true;
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<MessageReaction, StoreError> {
        let state = self.write();
        if state
            .reactions
            .values()
            .any(|r| r.message_id == message_id && r.user_id == user_id && r.emoji == emoji)
        {
            return Err(StoreError::Conflict(
                "message_reactions_message_user_emoji_key".to_string(),
            ));
        }
        let row = MessageReaction {
            id: state.next_id(),
            message_id,
            user_id,
            emoji: emoji.to_string(),
            created_at: Utc::now(),
        };
        state.reactions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<Option<MessageReaction>, StoreError> {
        Ok(self
            .read()
            .reactions
            .values()
            .find(|r| r.message_id == message_id && r.user_id == user_id && r.emoji == emoji)
            .cloned())
    }

    async fn delete_reaction(
        &mut self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<bool, StoreError> {
        let reactions = &mut self.write().reactions;
        let before = reactions.len();
        reactions
            .retain(|_, r| !(r.message_id == message_id && r.user_id == user_id && r.emoji == emoji));
        Ok(reactions.len() < before)
    }

    async fn list_reactions(&mut self, message_id: i64) -> Result<Vec<MessageReaction>, StoreError> {
        Ok(self
            .read()
            .reactions
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn insert_quiz(&mut self, quiz: NewQuiz) -> Result<Quiz, StoreError> {
        let state = self.write();
        let row = Quiz {
            id: state.next_id(),
            title: quiz.title,
            description: quiz.description,
            subject: quiz.subject,
            difficulty: quiz.difficulty,
            time_limit: quiz.time_limit,
            total_questions: quiz.total_questions,
            total_points: quiz.total_points,
            is_active: true,
            start_time: quiz.start_time,
            end_time: quiz.end_time,
            created_by: quiz.created_by,
            created_at: Utc::now(),
        };
        state.quizzes.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_question(
        &mut self,
        quiz_id: i64,
        question: NewQuestion,
    ) -> Result<QuizQuestion, StoreError> {
        let state = self.write();
        if !state.quizzes.contains_key(&quiz_id) {
            return Err(missing("quiz", quiz_id));
        }
        let row = QuizQuestion {
            id: state.next_id(),
            quiz_id,
            question_text: question.question_text,
            question_type: question.question_type,
            options: Json(question.options),
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            points: question.points,
            order_index: question.order_index,
        };
        state.questions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn find_quiz(&mut self, id: i64) -> Result<Option<Quiz>, StoreError> {
        Ok(self.read().quizzes.get(&id).cloned())
    }

    async fn list_questions(&mut self, quiz_id: i64) -> Result<Vec<QuizQuestion>, StoreError> {
        let mut questions: Vec<QuizQuestion> = self
            .read()
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order_index, q.id));
        Ok(questions)
    }

    async fn list_active_quizzes(
        &mut self,
        subject: Option<&str>,
    ) -> Result<Vec<Quiz>, StoreError> {
        let mut quizzes: Vec<Quiz> = self
            .read()
            .quizzes
            .values()
            .filter(|q| q.is_active)
            .filter(|q| subject.is_none_or(|s| q.subject.as_deref() == Some(s)))
            .cloned()
            .collect();
        quizzes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(quizzes)
    }

    async fn insert_attempt(&mut self, attempt: NewAttempt) -> Result<QuizAttempt, StoreError> {
        let state = self.write();
        let row = QuizAttempt {
            id: state.next_id(),
            quiz_id: attempt.quiz_id,
            user_id: attempt.user_id,
            answers: Json(attempt.answers),
            score: attempt.score,
            total_points: attempt.total_points,
            time_taken: attempt.time_taken,
            is_completed: true,
            started_at: attempt.started_at,
            completed_at: Some(attempt.completed_at),
        };
        state.attempts.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_attempts_for_user(
        &mut self,
        user_id: i64,
    ) -> Result<Vec<QuizAttempt>, StoreError> {
        let mut attempts: Vec<QuizAttempt> = self
            .read()
            .attempts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(attempts)
    }

    async fn insert_notification(
        &mut self,
        notification: NewNotification,
    ) -> Result<Notification, StoreError> {
        let state = self.write();
        let row = Notification {
            id: state.next_id(),
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            notification_type: notification.notification_type,
            related_id: notification.related_id,
            related_type: notification.related_type,
            is_read: false,
            priority: notification.priority,
            created_at: Utc::now(),
        };
        state.notifications.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_notifications(
        &mut self,
        user_id: i64,
        unread_only: bool,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut notifications: Vec<Notification> = self
            .read()
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !(unread_only && n.is_read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn mark_notification_read(&mut self, id: i64, user_id: i64) -> Result<bool, StoreError> {
        match self.write().notifications.get_mut(&id) {
            Some(n) if n.user_id == user_id => {
                n.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&mut self, user_id: i64) -> Result<u64, StoreError> {
        let mut updated = 0;
        for n in self.write().notifications.values_mut() {
            if n.user_id == user_id && !n.is_read {
                n.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@iitd.ac.in"),
            password_hash: "hash".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            university_domain: "iitd.ac.in".to_string(),
            university_badge: "IIT Delhi".to_string(),
            verification_token: format!("token-{name}"),
        }
    }

    #[tokio::test]
    async fn dropped_transaction_discards_writes() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(new_user("asha")).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_username("asha").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(new_user("asha")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let found = tx.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.username, "asha");
        assert_eq!(found.verification_token.as_deref(), Some("token-asha"));
    }

    #[tokio::test]
    async fn reads_do_not_stage_a_copy() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(new_user("asha")).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_id(user.id).await.unwrap().is_some());
        assert!(tx.list_public_rooms(None).await.unwrap().is_empty());
        assert!(tx.staged.is_none());

        tx.update_last_seen(user.id, Utc::now()).await.unwrap();
        assert!(tx.staged.is_some());
        assert!(tx.read().users[&user.id].last_seen.is_some());
        assert!(tx.guard.users[&user.id].last_seen.is_none());
    }

    #[tokio::test]
    async fn writes_against_missing_rows_report_not_found() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx.deactivate_room(42).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("room", 42)));
        assert!(!err.is_transient());

        let err = tx.set_user_active(7, false).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("user", 7)));
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(new_user("asha")).await.unwrap();

        let mut dup = new_user("asha");
        dup.email = "other@iitd.ac.in".to_string();
        let err = tx.insert_user(dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(name) if name.contains("username")));
    }
}

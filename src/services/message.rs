use serde::Deserialize;

use crate::database::{Store, StoreTx};
use crate::error::AppError;
use crate::models::{Message, MessageReaction, MessageType, NewMessage, Room, RoomMembership};
use crate::services::notification;
use crate::utils::ensure_max_chars;

const MAX_CONTENT_CHARS: usize = 4000;
const MAX_EMOJI_CHARS: usize = 10;
const MAX_FILE_URL_CHARS: usize = 500;

#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageRequest {
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Makes the message a reply to an earlier one in the same room.
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Clone)]
pub struct MessageService<S> {
    store: S,
}

impl<S: Store> MessageService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn post_message(
        &self,
        room_id: i64,
        user_id: i64,
        data: PostMessageRequest,
    ) -> Result<Message, AppError> {
        let content = validate_content(&data.content)?;
        if let Some(url) = &data.file_url {
            ensure_max_chars("file_url", url, MAX_FILE_URL_CHARS)?;
        }

        let mut tx = self.store.begin().await?;
        active_room(&mut tx, room_id).await?;
        let membership = tx
            .find_membership(room_id, user_id)
            .await?
            .ok_or(AppError::NotAMember)?;
        if membership.is_muted {
            return Err(AppError::Muted);
        }

        let parent = match data.parent_id {
            Some(parent_id) => Some(
                tx.find_message(parent_id)
                    .await?
                    .filter(|m| m.room_id == room_id && !m.is_deleted)
                    .ok_or(AppError::MessageNotFound)?,
            ),
            None => None,
        };

        let message = tx
            .insert_message(NewMessage {
                room_id,
                user_id,
                content,
                message_type: data.message_type,
                file_url: data.file_url,
                metadata: data.metadata,
                parent_id: data.parent_id,
            })
            .await?;

        if let Some(parent) = parent.filter(|p| p.user_id != user_id) {
            let replier = tx
                .find_user_by_id(user_id)
                .await?
                .map_or_else(|| "Someone".to_string(), |u| u.username);
            tx.insert_notification(notification::reply_received(
                parent.user_id,
                message.id,
                &replier,
            ))
            .await?;
        }
        tx.commit().await?;

        tracing::debug!("User {} posted message {} in room {}", user_id, message.id, room_id);
        Ok(message)
    }

    pub async fn list_room_messages(
        &self,
        room_id: i64,
        user_id: i64,
    ) -> Result<Vec<Message>, AppError> {
        let mut tx = self.store.begin().await?;
        tx.find_room(room_id).await?.ok_or(AppError::RoomNotFound)?;
        member_of(&mut tx, room_id, user_id).await?;
        let messages = tx.list_room_messages(room_id).await?;
        tx.commit().await?;
        Ok(messages)
    }

    /// Direct replies to a message, oldest first.
    pub async fn get_replies_to(
        &self,
        message_id: i64,
        user_id: i64,
    ) -> Result<Vec<Message>, AppError> {
        let mut tx = self.store.begin().await?;
        let parent = visible_message(&mut tx, message_id).await?;
        member_of(&mut tx, parent.room_id, user_id).await?;
        let replies = tx.list_replies(message_id).await?;
        tx.commit().await?;
        Ok(replies)
    }

    pub async fn edit_message(
        &self,
        message_id: i64,
        user_id: i64,
        content: &str,
    ) -> Result<Message, AppError> {
        let content = validate_content(content)?;

        let mut tx = self.store.begin().await?;
        let message = visible_message(&mut tx, message_id).await?;
        if message.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can edit a message".to_string(),
            ));
        }
        let updated = tx.update_message_content(message_id, &content).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Soft-deletes a message. Authors may delete their own messages, room
    /// admins and moderators anyone's.
    pub async fn delete_message(&self, message_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        let message = visible_message(&mut tx, message_id).await?;

        if message.user_id != user_id {
            let moderator = tx
                .find_membership(message.room_id, user_id)
                .await?
                .is_some_and(|m| m.role.can_moderate());
            if !moderator {
                return Err(AppError::Forbidden(
                    "Only the author or a room moderator can delete a message".to_string(),
                ));
            }
        }

        tx.soft_delete_message(message_id).await?;
        tx.commit().await?;

        tracing::info!("User {} deleted message {}", user_id, message_id);
        Ok(())
    }

    /// Adding the same reaction twice returns the existing one.
    pub async fn add_reaction(
        &self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<MessageReaction, AppError> {
        let emoji = emoji.trim();
        let len = emoji.chars().count();
        if len == 0 || len > MAX_EMOJI_CHARS {
            return Err(AppError::Validation(format!(
                "Reaction must be between 1 and {MAX_EMOJI_CHARS} characters"
            )));
        }

        let mut tx = self.store.begin().await?;
        let message = visible_message(&mut tx, message_id).await?;
        member_of(&mut tx, message.room_id, user_id).await?;

        if let Some(existing) = tx.find_reaction(message_id, user_id, emoji).await? {
            return Ok(existing);
        }
        let reaction = tx.insert_reaction(message_id, user_id, emoji).await?;
        tx.commit().await?;
        Ok(reaction)
    }

    /// Returns whether a reaction was actually removed.
    pub async fn remove_reaction(
        &self,
        message_id: i64,
        user_id: i64,
        emoji: &str,
    ) -> Result<bool, AppError> {
        let mut tx = self.store.begin().await?;
        let removed = tx.delete_reaction(message_id, user_id, emoji.trim()).await?;
        tx.commit().await?;
        Ok(removed)
    }

    pub async fn list_reactions(&self, message_id: i64) -> Result<Vec<MessageReaction>, AppError> {
        let mut tx = self.store.begin().await?;
        visible_message(&mut tx, message_id).await?;
        let reactions = tx.list_reactions(message_id).await?;
        tx.commit().await?;
        Ok(reactions)
    }
}

fn validate_content(content: &str) -> Result<String, AppError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Message content is empty".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "Message content exceeds {MAX_CONTENT_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}

async fn active_room<T: StoreTx>(tx: &mut T, room_id: i64) -> Result<Room, AppError> {
    tx.find_room(room_id)
        .await?
        .filter(|room| room.is_active)
        .ok_or(AppError::RoomNotFound)
}

async fn member_of<T: StoreTx>(
    tx: &mut T,
    room_id: i64,
    user_id: i64,
) -> Result<RoomMembership, AppError> {
    tx.find_membership(room_id, user_id)
        .await?
        .ok_or(AppError::NotAMember)
}

async fn visible_message<T: StoreTx>(tx: &mut T, message_id: i64) -> Result<Message, AppError> {
    tx.find_message(message_id)
        .await?
        .filter(|m| !m.is_deleted)
        .ok_or(AppError::MessageNotFound)
}

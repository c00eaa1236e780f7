use crate::database::{Store, StoreTx};
use crate::error::AppError;
use crate::models::{
    MemberRole, NewNotification, Notification, NotificationPriority, NotificationType,
};

#[derive(Clone)]
pub struct NotificationService<S> {
    store: S,
}

impl<S: Store> NotificationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Newest first.
    pub async fn list(&self, user_id: i64, unread_only: bool) -> Result<Vec<Notification>, AppError> {
        let mut tx = self.store.begin().await?;
        let notifications = tx.list_notifications(user_id, unread_only).await?;
        tx.commit().await?;
        Ok(notifications)
    }

    /// Only the recipient can mark a notification; anyone else gets
    /// `NotificationNotFound`.
    pub async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut tx = self.store.begin().await?;
        if !tx.mark_notification_read(notification_id, user_id).await? {
            return Err(AppError::NotificationNotFound);
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, AppError> {
        let mut tx = self.store.begin().await?;
        let updated = tx.mark_all_notifications_read(user_id).await?;
        tx.commit().await?;
        tracing::debug!("Marked {} notifications read for user {}", updated, user_id);
        Ok(updated)
    }
}

pub(crate) fn promoted_to_admin(user_id: i64, room_id: i64, room_name: &str) -> NewNotification {
    NewNotification {
        user_id,
        title: "You are now a room admin".to_string(),
        message: format!("The previous admin left {room_name}. You have been promoted to admin."),
        notification_type: NotificationType::RoleChange,
        related_id: Some(room_id),
        related_type: Some("room".to_string()),
        priority: NotificationPriority::High,
    }
}

pub(crate) fn role_changed(
    user_id: i64,
    room_id: i64,
    room_name: &str,
    role: MemberRole,
) -> NewNotification {
    let role = match role {
        MemberRole::Admin => "admin",
        MemberRole::Moderator => "moderator",
        MemberRole::Member => "member",
    };
    NewNotification {
        user_id,
        title: "Your room role changed".to_string(),
        message: format!("You are now a {role} in {room_name}."),
        notification_type: NotificationType::RoleChange,
        related_id: Some(room_id),
        related_type: Some("room".to_string()),
        priority: NotificationPriority::Normal,
    }
}

pub(crate) fn reply_received(user_id: i64, message_id: i64, replier: &str) -> NewNotification {
    NewNotification {
        user_id,
        title: "New reply".to_string(),
        message: format!("{replier} replied to your message."),
        notification_type: NotificationType::Message,
        related_id: Some(message_id),
        related_type: Some("message".to_string()),
        priority: NotificationPriority::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_notice_points_at_the_room() {
        let n = promoted_to_admin(7, 3, "Algorithms");
        assert_eq!(n.user_id, 7);
        assert_eq!(n.related_id, Some(3));
        assert_eq!(n.related_type.as_deref(), Some("room"));
        assert_eq!(n.notification_type, NotificationType::RoleChange);
        assert_eq!(n.priority, NotificationPriority::High);
        assert!(n.message.contains("Algorithms"));
    }

    #[test]
    fn role_change_names_the_new_role() {
        let n = role_changed(7, 3, "Algorithms", MemberRole::Moderator);
        assert!(n.message.contains("moderator"));
    }
}

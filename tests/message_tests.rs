mod common;

use common::{TestApp, test_app};
use unichat::{
    error::AppError,
    models::{MemberRole, MessageType, NotificationType, User},
    services::{MemberUpdate, PostMessageRequest},
};

fn text(content: &str) -> PostMessageRequest {
    PostMessageRequest {
        content: content.to_string(),
        message_type: MessageType::Text,
        file_url: None,
        metadata: None,
        parent_id: None,
    }
}

fn reply(content: &str, parent_id: i64) -> PostMessageRequest {
    PostMessageRequest {
        parent_id: Some(parent_id),
        ..text(content)
    }
}

async fn room_with_two_members(app: &TestApp) -> (User, User, i64) {
    let a = app.verified_user("asha", "asha@iitd.ac.in").await;
    let b = app.verified_user("bilal", "bilal@iitd.ac.in").await;
    let room_id = app.room(&a, "Algorithms", None).await;
    app.state.rooms.join_room(room_id, b.id).await.unwrap();
    (a, b, room_id)
}

#[tokio::test]
async fn members_post_and_read_messages_in_order() {
    let app = test_app();
    let (a, b, room_id) = room_with_two_members(&app).await;

    let first = app
        .state
        .messages
        .post_message(room_id, a.id, text("  hello  "))
        .await
        .unwrap();
    assert_eq!(first.content, "hello");
    assert!(!first.is_edited);

    app.state
        .messages
        .post_message(room_id, b.id, text("hi!"))
        .await
        .unwrap();

    let messages = app
        .state
        .messages
        .list_room_messages(room_id, b.id)
        .await
        .unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "hi!"]);
}

#[tokio::test]
async fn outsiders_muted_members_and_empty_content_are_rejected() {
    let app = test_app();
    let (a, b, room_id) = room_with_two_members(&app).await;
    let outsider = app.verified_user("chen", "chen@iitd.ac.in").await;

    let err = app
        .state
        .messages
        .post_message(room_id, outsider.id, text("let me in"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotAMember));

    let err = app
        .state
        .messages
        .list_room_messages(room_id, outsider.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotAMember));

    let err = app
        .state
        .messages
        .post_message(room_id, a.id, text("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = app
        .state
        .messages
        .post_message(4242, a.id, text("anyone?"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RoomNotFound));

    let oversized_url = PostMessageRequest {
        message_type: MessageType::File,
        file_url: Some(format!("https://files.example/{}", "f".repeat(500))),
        ..text("notes attached")
    };
    let err = app
        .state
        .messages
        .post_message(room_id, a.id, oversized_url)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(!err.is_retryable());
    assert!(app
        .state
        .messages
        .list_room_messages(room_id, a.id)
        .await
        .unwrap()
        .is_empty());

    app.state
        .rooms
        .update_member(
            room_id,
            a.id,
            b.id,
            MemberUpdate {
                role: None,
                is_muted: Some(true),
            },
        )
        .await
        .unwrap();
    let err = app
        .state
        .messages
        .post_message(room_id, b.id, text("can you hear me"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Muted));
}

#[tokio::test]
async fn replies_form_a_thread_and_notify_the_parent_author() {
    let app = test_app();
    let (a, b, room_id) = room_with_two_members(&app).await;

    let parent = app
        .state
        .messages
        .post_message(room_id, a.id, text("Who has the notes?"))
        .await
        .unwrap();
    app.state
        .messages
        .post_message(room_id, b.id, reply("I do", parent.id))
        .await
        .unwrap();
    app.state
        .messages
        .post_message(room_id, a.id, reply("thanks", parent.id))
        .await
        .unwrap();

    let replies = app
        .state
        .messages
        .get_replies_to(parent.id, a.id)
        .await
        .unwrap();
    assert_eq!(replies.len(), 2);
    assert!(replies.iter().all(|m| m.parent_id == Some(parent.id)));

    // Only the reply from someone else notifies.
    let notifications = app.state.notifications.list(a.id, false).await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].notification_type, NotificationType::Message);
    assert!(notifications[0].message.contains("bilal"));

    let err = app
        .state
        .messages
        .post_message(room_id, a.id, reply("dangling", 4242))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MessageNotFound));
}

#[tokio::test]
async fn replies_must_stay_in_the_parent_room() {
    let app = test_app();
    let (a, _b, room_id) = room_with_two_members(&app).await;
    let other_room = app.room(&a, "Other", None).await;

    let parent = app
        .state
        .messages
        .post_message(room_id, a.id, text("here"))
        .await
        .unwrap();
    let err = app
        .state
        .messages
        .post_message(other_room, a.id, reply("there", parent.id))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MessageNotFound));
}

#[tokio::test]
async fn only_authors_edit_and_moderators_may_delete() {
    let app = test_app();
    let (a, b, room_id) = room_with_two_members(&app).await;

    let message = app
        .state
        .messages
        .post_message(room_id, b.id, text("frist"))
        .await
        .unwrap();

    let err = app
        .state
        .messages
        .edit_message(message.id, a.id, "first")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let edited = app
        .state
        .messages
        .edit_message(message.id, b.id, "first")
        .await
        .unwrap();
    assert_eq!(edited.content, "first");
    assert!(edited.is_edited);

    let own = app
        .state
        .messages
        .post_message(room_id, a.id, text("admin speaking"))
        .await
        .unwrap();
    let err = app
        .state
        .messages
        .delete_message(own.id, b.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // The room admin can remove anyone's message.
    app.state
        .messages
        .delete_message(message.id, a.id)
        .await
        .unwrap();
    let remaining = app
        .state
        .messages
        .list_room_messages(room_id, a.id)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, own.id);

    let err = app
        .state
        .messages
        .edit_message(message.id, b.id, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MessageNotFound));

    app.state
        .rooms
        .update_member(
            room_id,
            a.id,
            b.id,
            MemberUpdate {
                role: Some(MemberRole::Moderator),
                is_muted: None,
            },
        )
        .await
        .unwrap();
    app.state.messages.delete_message(own.id, b.id).await.unwrap();
}

#[tokio::test]
async fn reactions_are_idempotent_per_user_and_emoji() {
    let app = test_app();
    let (a, b, room_id) = room_with_two_members(&app).await;
    let message = app
        .state
        .messages
        .post_message(room_id, a.id, text("exam moved to friday"))
        .await
        .unwrap();

    let first = app
        .state
        .messages
        .add_reaction(message.id, b.id, "🎉")
        .await
        .unwrap();
    let again = app
        .state
        .messages
        .add_reaction(message.id, b.id, "🎉")
        .await
        .unwrap();
    assert_eq!(first.id, again.id);

    app.state
        .messages
        .add_reaction(message.id, a.id, "🎉")
        .await
        .unwrap();
    app.state
        .messages
        .add_reaction(message.id, b.id, "👍")
        .await
        .unwrap();
    assert_eq!(
        app.state
            .messages
            .list_reactions(message.id)
            .await
            .unwrap()
            .len(),
        3
    );

    let err = app
        .state
        .messages
        .add_reaction(message.id, b.id, "")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(
        app.state
            .messages
            .remove_reaction(message.id, b.id, "🎉")
            .await
            .unwrap()
    );
    assert!(
        !app.state
            .messages
            .remove_reaction(message.id, b.id, "🎉")
            .await
            .unwrap()
    );
    assert_eq!(
        app.state
            .messages
            .list_reactions(message.id)
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn notifications_are_marked_read_by_their_recipient_only() {
    let app = test_app();
    let (a, b, room_id) = room_with_two_members(&app).await;
    let parent = app
        .state
        .messages
        .post_message(room_id, a.id, text("question"))
        .await
        .unwrap();
    for answer in ["one", "two"] {
        app.state
            .messages
            .post_message(room_id, b.id, reply(answer, parent.id))
            .await
            .unwrap();
    }

    let unread = app.state.notifications.list(a.id, true).await.unwrap();
    assert_eq!(unread.len(), 2);
    assert!(unread[0].id > unread[1].id);

    let err = app
        .state
        .notifications
        .mark_read(unread[0].id, b.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotificationNotFound));

    app.state
        .notifications
        .mark_read(unread[0].id, a.id)
        .await
        .unwrap();
    assert_eq!(app.state.notifications.list(a.id, true).await.unwrap().len(), 1);

    assert_eq!(app.state.notifications.mark_all_read(a.id).await.unwrap(), 1);
    assert!(app.state.notifications.list(a.id, true).await.unwrap().is_empty());
    assert_eq!(app.state.notifications.list(a.id, false).await.unwrap().len(), 2);
}

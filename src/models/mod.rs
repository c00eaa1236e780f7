//! Persisted records. Relations are plain id fields; views such as reply
//! threads are computed by explicit store queries.

pub mod message;
pub mod notification;
pub mod quiz;
pub mod room;
pub mod user;

pub use message::{Message, MessageReaction, MessageType, NewMessage};
pub use notification::{NewNotification, Notification, NotificationPriority, NotificationType};
pub use quiz::{Difficulty, NewAttempt, NewQuestion, NewQuiz, QuestionType, Quiz, QuizAttempt, QuizQuestion};
pub use room::{MemberRole, NewRoom, Room, RoomMembership, RoomType};
pub use user::{NewUser, User, UserSummary};

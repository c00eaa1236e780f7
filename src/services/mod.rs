//! Operations over the store. Each public method runs in exactly one store
//! transaction; the structs hold nothing but injected handles.

pub mod auth;
pub mod message;
pub mod notification;
pub mod quiz;
pub mod room;

pub use auth::{AuthService, LoginOutcome, RegisterOutcome, RegisterRequest, VerifyOutcome};
pub use message::{MessageService, PostMessageRequest};
pub use notification::NotificationService;
pub use quiz::{
    AttemptResult, CreateQuestionRequest, CreateQuizRequest, QuestionResult, QuestionView,
    QuizService, QuizWithQuestions, SubmitAttemptRequest,
};
pub use room::{
    CreateRoomRequest, JoinOutcome, LeaveOutcome, MemberUpdate, RoomDetail, RoomService,
    Succession,
};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::database::StoreError;
use crate::utils::{error_codes, error_to_api_response};

/// Every failure a caller can observe. All variants except `Storage` and
/// `Internal` are business-rule violations detected before any write.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Please use a valid university email address")]
    InvalidDomain,
    #[error("Username already taken")]
    DuplicateUsername,
    #[error("Email already registered")]
    DuplicateEmail,
    #[error("Invalid verification token")]
    InvalidToken,
    #[error("Email already verified")]
    AlreadyVerified,
    #[error("Incorrect username or password")]
    InvalidCredentials,
    #[error("Please verify your email before logging in")]
    EmailNotVerified,
    #[error("Account is deactivated")]
    AccountDeactivated,
    #[error("Creator not found")]
    CreatorNotFound,
    #[error("Room not found")]
    RoomNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("Already a member of this room")]
    AlreadyMember,
    #[error("This room is restricted to its university")]
    DomainRestricted,
    #[error("Room is at maximum capacity")]
    RoomFull,
    #[error("Not a member of this room")]
    NotAMember,
    #[error("The only admin of a room cannot be demoted")]
    LastAdmin,
    #[error("You are muted in this room")]
    Muted,
    #[error("Message not found")]
    MessageNotFound,
    #[error("Quiz not found")]
    QuizNotFound,
    #[error("Quiz is not open for attempts")]
    QuizClosed,
    #[error("Notification not found")]
    NotificationNotFound,
    #[error("Could not validate credentials")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Validation(String),
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> i32 {
        match self {
            AppError::InvalidDomain => error_codes::INVALID_DOMAIN,
            AppError::DuplicateUsername => error_codes::USERNAME_TAKEN,
            AppError::DuplicateEmail => error_codes::EMAIL_TAKEN,
            AppError::InvalidToken => error_codes::INVALID_TOKEN,
            AppError::AlreadyVerified => error_codes::ALREADY_VERIFIED,
            AppError::InvalidCredentials | AppError::Unauthorized => error_codes::AUTH_FAILED,
            AppError::EmailNotVerified => error_codes::EMAIL_NOT_VERIFIED,
            AppError::AccountDeactivated => error_codes::ACCOUNT_DEACTIVATED,
            AppError::CreatorNotFound
            | AppError::RoomNotFound
            | AppError::UserNotFound
            | AppError::MessageNotFound
            | AppError::QuizNotFound
            | AppError::NotificationNotFound => error_codes::NOT_FOUND,
            AppError::AlreadyMember => error_codes::ALREADY_MEMBER,
            AppError::DomainRestricted => error_codes::DOMAIN_RESTRICTED,
            AppError::RoomFull => error_codes::ROOM_FULL,
            AppError::NotAMember => error_codes::NOT_A_MEMBER,
            AppError::LastAdmin => error_codes::LAST_ADMIN,
            AppError::Muted => error_codes::MUTED,
            AppError::QuizClosed => error_codes::QUIZ_CLOSED,
            AppError::Forbidden(_) => error_codes::PERMISSION_DENIED,
            AppError::Validation(_) => error_codes::VALIDATION_ERROR,
            AppError::Storage(_) => error_codes::STORAGE_ERROR,
            AppError::Internal(_) => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::EmailNotVerified
            | AppError::AccountDeactivated
            | AppError::DomainRestricted
            | AppError::Muted
            | AppError::NotAMember
            | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::CreatorNotFound
            | AppError::RoomNotFound
            | AppError::UserNotFound
            | AppError::MessageNotFound
            | AppError::QuizNotFound
            | AppError::NotificationNotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateUsername
            | AppError::DuplicateEmail
            | AppError::AlreadyMember
            | AppError::AlreadyVerified
            | AppError::RoomFull
            | AppError::LastAdmin
            | AppError::QuizClosed => StatusCode::CONFLICT,
            AppError::InvalidDomain | AppError::InvalidToken | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Storage(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Storage(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Transient storage failures; callers may retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(e) if e.is_transient())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            AppError::Storage(e) if e.is_transient() => {
                tracing::error!("Storage failure: {}", e);
                "Storage temporarily unavailable, please retry".to_string()
            }
            AppError::Storage(e) => {
                tracing::error!("Storage failure: {}", e);
                "Internal server error".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal failure: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, error_to_api_response::<()>(self.code(), msg)).into_response()
    }
}

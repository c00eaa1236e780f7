mod handler;
mod model;

pub use handler::{current_user, deactivate, login, logout, register, verify_email};
pub use model::{LoginRequest, VerifyEmailRequest};

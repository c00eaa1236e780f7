mod handler;
mod model;

pub use handler::{create_quiz, get_quiz, list_my_attempts, list_quizzes, submit_attempt};
pub use model::QuizListQuery;

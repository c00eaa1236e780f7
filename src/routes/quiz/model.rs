use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct QuizListQuery {
    pub subject: Option<String>,
}

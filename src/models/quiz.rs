use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "quiz_difficulty", rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "question_type", rename_all = "snake_case")]
pub enum QuestionType {
    #[default]
    Mcq,
    TrueFalse,
    ShortAnswer,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub difficulty: Difficulty,
    /// Minutes.
    pub time_limit: Option<i32>,
    pub total_questions: i32,
    pub total_points: i32,
    pub is_active: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl Quiz {
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let started = self.start_time.is_none_or(|start| start <= now);
        let not_ended = self.end_time.is_none_or(|end| now <= end);
        started && not_ended
    }
}

#[derive(Debug, Clone)]
pub struct NewQuiz {
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub difficulty: Difficulty,
    pub time_limit: Option<i32>,
    pub total_questions: i32,
    pub total_points: i32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub created_by: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizQuestion {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Json<Vec<String>>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub points: i32,
    pub order_index: i32,
}

#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub points: i32,
    pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizAttempt {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    /// Question id to the submitted answer.
    pub answers: Json<HashMap<i64, String>>,
    pub score: f64,
    pub total_points: i32,
    /// Seconds.
    pub time_taken: Option<i32>,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub quiz_id: i64,
    pub user_id: i64,
    pub answers: HashMap<i64, String>,
    pub score: f64,
    pub total_points: i32,
    pub time_taken: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn quiz(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Quiz {
        Quiz {
            id: 1,
            title: "Graphs".to_string(),
            description: None,
            subject: None,
            difficulty: Difficulty::Medium,
            time_limit: None,
            total_questions: 1,
            total_points: 1,
            is_active: true,
            start_time: start,
            end_time: end,
            created_by: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn open_window_bounds() {
        let now = Utc::now();
        assert!(quiz(None, None).is_open_at(now));
        assert!(quiz(Some(now - Duration::hours(1)), Some(now + Duration::hours(1))).is_open_at(now));
        assert!(!quiz(Some(now + Duration::minutes(5)), None).is_open_at(now));
        assert!(!quiz(None, Some(now - Duration::seconds(1))).is_open_at(now));
    }
}

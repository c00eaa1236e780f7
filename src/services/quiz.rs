use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::database::{Store, StoreTx};
use crate::error::AppError;
use crate::models::{
    Difficulty, NewAttempt, NewQuestion, NewQuiz, QuestionType, Quiz, QuizAttempt, QuizQuestion,
};
use crate::utils::ensure_max_chars;

const MAX_QUESTION_POINTS: i32 = 1000;

fn default_points() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestionRequest {
    pub question_text: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default = "default_points")]
    pub points: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuizRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Minutes.
    #[serde(default)]
    pub time_limit: Option<i32>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    pub questions: Vec<CreateQuestionRequest>,
}

/// A question as shown to someone taking the quiz.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub options: Vec<String>,
    pub points: i32,
    pub order_index: i32,
}

impl From<QuizQuestion> for QuestionView {
    fn from(q: QuizQuestion) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type,
            options: q.options.0,
            points: q.points,
            order_index: q.order_index,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizWithQuestions {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAttemptRequest {
    pub answers: HashMap<i64, String>,
    /// Seconds.
    #[serde(default)]
    pub time_taken: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question_id: i64,
    pub submitted: Option<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub is_correct: bool,
    pub points_awarded: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub attempt: QuizAttempt,
    pub results: Vec<QuestionResult>,
}

/// Grades `answers` against `questions`. Matching ignores surrounding
/// whitespace and ASCII case.
pub fn score_answers(
    questions: &[QuizQuestion],
    answers: &HashMap<i64, String>,
) -> (i32, Vec<QuestionResult>) {
    let mut score = 0;
    let results = questions
        .iter()
        .map(|q| {
            let submitted = answers.get(&q.id).cloned();
            let is_correct = submitted
                .as_deref()
                .is_some_and(|a| a.trim().eq_ignore_ascii_case(q.correct_answer.trim()));
            let points_awarded = if is_correct { q.points } else { 0 };
            score = i32::saturating_add(score, points_awarded);
            QuestionResult {
                question_id: q.id,
                submitted,
                correct_answer: q.correct_answer.clone(),
                explanation: q.explanation.clone(),
                is_correct,
                points_awarded,
            }
        })
        .collect();
    (score, results)
}

/// Checks a new quiz and returns its total points.
fn validate_quiz(data: &CreateQuizRequest) -> Result<i32, AppError> {
    let title = data.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Quiz title is empty".to_string()));
    }
    ensure_max_chars("Quiz title", title, 200)?;
    if let Some(subject) = &data.subject {
        ensure_max_chars("Subject", subject, 100)?;
    }
    if data.questions.is_empty() {
        return Err(AppError::Validation(
            "A quiz needs at least one question".to_string(),
        ));
    }
    if data.time_limit.is_some_and(|t| t < 1) {
        return Err(AppError::Validation(
            "time_limit must be at least one minute".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (data.start_time, data.end_time) {
        if end <= start {
            return Err(AppError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }
    }

    for (i, q) in data.questions.iter().enumerate() {
        let n = i + 1;
        if q.question_text.trim().is_empty() || q.correct_answer.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Question {n} needs text and a correct answer"
            )));
        }
        if !(1..=MAX_QUESTION_POINTS).contains(&q.points) {
            return Err(AppError::Validation(format!(
                "Question {n} must be worth between 1 and {MAX_QUESTION_POINTS} points"
            )));
        }
        if q.question_type == QuestionType::Mcq
            && !q
                .options
                .iter()
                .any(|o| o.trim().eq_ignore_ascii_case(q.correct_answer.trim()))
        {
            return Err(AppError::Validation(format!(
                "Question {n}: the correct answer must be one of the options"
            )));
        }
    }

    data.questions
        .iter()
        .try_fold(0i32, |total, q| total.checked_add(q.points))
        .ok_or_else(|| AppError::Validation("Quiz is worth too many points".to_string()))
}

#[derive(Clone)]
pub struct QuizService<S> {
    store: S,
}

impl<S: Store> QuizService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn create_quiz(
        &self,
        data: CreateQuizRequest,
        creator_id: i64,
    ) -> Result<QuizWithQuestions, AppError> {
        let total_points = validate_quiz(&data)?;
        let total_questions = i32::try_from(data.questions.len())
            .map_err(|_| AppError::Validation("Quiz has too many questions".to_string()))?;

        let mut tx = self.store.begin().await?;
        if tx.find_user_by_id(creator_id).await?.is_none() {
            return Err(AppError::CreatorNotFound);
        }

        let quiz = tx
            .insert_quiz(NewQuiz {
                title: data.title.trim().to_string(),
                description: data.description,
                subject: data.subject,
                difficulty: data.difficulty,
                time_limit: data.time_limit,
                total_questions,
                total_points,
                start_time: data.start_time,
                end_time: data.end_time,
                created_by: creator_id,
            })
            .await?;

        let mut questions = Vec::with_capacity(data.questions.len());
        for (order_index, q) in data.questions.into_iter().enumerate() {
            let question = tx
                .insert_question(
                    quiz.id,
                    NewQuestion {
                        question_text: q.question_text.trim().to_string(),
                        question_type: q.question_type,
                        options: q.options,
                        correct_answer: q.correct_answer.trim().to_string(),
                        explanation: q.explanation,
                        points: q.points,
                        order_index: order_index as i32,
                    },
                )
                .await?;
            questions.push(QuestionView::from(question));
        }
        tx.commit().await?;

        tracing::info!(
            "User {} created quiz {} with {} questions",
            creator_id,
            quiz.id,
            total_questions
        );
        Ok(QuizWithQuestions { quiz, questions })
    }

    pub async fn list_active_quizzes(&self, subject: Option<&str>) -> Result<Vec<Quiz>, AppError> {
        let subject = subject.map(str::trim).filter(|s| !s.is_empty());
        let mut tx = self.store.begin().await?;
        let quizzes = tx.list_active_quizzes(subject).await?;
        tx.commit().await?;
        Ok(quizzes)
    }

    pub async fn get_quiz(&self, quiz_id: i64) -> Result<QuizWithQuestions, AppError> {
        let mut tx = self.store.begin().await?;
        let quiz = tx.find_quiz(quiz_id).await?.ok_or(AppError::QuizNotFound)?;
        let questions = tx.list_questions(quiz_id).await?;
        tx.commit().await?;

        Ok(QuizWithQuestions {
            quiz,
            questions: questions.into_iter().map(QuestionView::from).collect(),
        })
    }

    pub async fn submit_attempt(
        &self,
        quiz_id: i64,
        user_id: i64,
        submission: SubmitAttemptRequest,
    ) -> Result<AttemptResult, AppError> {
        if submission.time_taken.is_some_and(|t| t < 0) {
            return Err(AppError::Validation(
                "time_taken cannot be negative".to_string(),
            ));
        }

        let mut tx = self.store.begin().await?;
        let quiz = tx
            .find_quiz(quiz_id)
            .await?
            .filter(|q| q.is_active)
            .ok_or(AppError::QuizNotFound)?;

        let now = Utc::now();
        if !quiz.is_open_at(now) {
            return Err(AppError::QuizClosed);
        }

        let questions = tx.list_questions(quiz_id).await?;
        if let Some(unknown) = submission
            .answers
            .keys()
            .find(|id| !questions.iter().any(|q| q.id == **id))
        {
            return Err(AppError::Validation(format!(
                "Question {unknown} is not part of this quiz"
            )));
        }

        let (score, results) = score_answers(&questions, &submission.answers);
        let started_at = submission
            .time_taken
            .map_or(now, |secs| now - Duration::seconds(i64::from(secs)));

        let attempt = tx
            .insert_attempt(NewAttempt {
                quiz_id,
                user_id,
                answers: submission.answers,
                score: f64::from(score),
                total_points: quiz.total_points,
                time_taken: submission.time_taken,
                started_at,
                completed_at: now,
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            "User {} scored {}/{} on quiz {}",
            user_id,
            score,
            quiz.total_points,
            quiz_id
        );
        Ok(AttemptResult { attempt, results })
    }

    /// Newest first.
    pub async fn list_user_attempts(&self, user_id: i64) -> Result<Vec<QuizAttempt>, AppError> {
        let mut tx = self.store.begin().await?;
        let attempts = tx.list_attempts_for_user(user_id).await?;
        tx.commit().await?;
        Ok(attempts)
    }
}

//! Quiz service
//!
//! Multiple-choice quizzes attached to course units. An attempt is scored
//! as the share of correct answers, rounded down, and passes when the
//! score reaches the quiz's pass mark.

use crate::db::repositories::{CourseRepository, QuizRepository};
use crate::models::{
    CreateQuestionInput, CreateQuizInput, PublicQuestion, Question, QuestionOptions, Quiz,
    QuizAttempt, UpdateQuestionInput, UpdateQuizInput, DEFAULT_PASS_SCORE,
};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Fewest options a question may have
pub const MIN_OPTIONS: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum QuizServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A quiz as shown to a student
#[derive(Debug, Clone, Serialize)]
pub struct QuizView {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// Outcome of a submitted attempt
#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub attempt_id: i64,
    pub score: i32,
    pub passed: bool,
    pub correct: usize,
    pub total: usize,
}

/// Percentage of correct answers, rounded down
pub fn score_answers(questions: &[Question], answers: &[i32]) -> (usize, i32) {
    let correct = questions
        .iter()
        .zip(answers)
        .filter(|(q, a)| q.correct_index == **a)
        .count();
    if questions.is_empty() {
        return (0, 0);
    }
    (correct, (correct * 100 / questions.len()) as i32)
}

pub struct QuizService {
    quizzes: Arc<dyn QuizRepository>,
    courses: Arc<dyn CourseRepository>,
}

impl QuizService {
    pub fn new(quizzes: Arc<dyn QuizRepository>, courses: Arc<dyn CourseRepository>) -> Self {
        Self { quizzes, courses }
    }

    pub async fn create_quiz(&self, unit_id: i64, input: CreateQuizInput) -> Result<Quiz, QuizServiceError> {
        if self.courses.get_unit(unit_id).await.context("Failed to get unit")?.is_none() {
            return Err(QuizServiceError::NotFound("Unit"));
        }

        let quiz = Quiz {
            id: 0,
            unit_id,
            title: required(&input.title, "title")?,
            pass_score: validate_pass_score(input.pass_score.unwrap_or(DEFAULT_PASS_SCORE))?,
            created_at: Utc::now(),
        };
        Ok(self.quizzes.create(&quiz).await?)
    }

    pub async fn update_quiz(&self, id: i64, input: UpdateQuizInput) -> Result<Quiz, QuizServiceError> {
        let mut quiz = self.require_quiz(id).await?;
        if let Some(title) = input.title {
            quiz.title = required(&title, "title")?;
        }
        if let Some(pass_score) = input.pass_score {
            quiz.pass_score = validate_pass_score(pass_score)?;
        }
        Ok(self.quizzes.update(&quiz).await?)
    }

    pub async fn delete_quiz(&self, id: i64) -> Result<(), QuizServiceError> {
        if !self.quizzes.delete(id).await.context("Failed to delete quiz")? {
            return Err(QuizServiceError::NotFound("Quiz"));
        }
        Ok(())
    }

    /// Quiz with its questions, answers withheld
    pub async fn view(&self, id: i64) -> Result<QuizView, QuizServiceError> {
        let quiz = self.require_quiz(id).await?;
        let questions = self
            .quizzes
            .list_questions(id)
            .await?
            .into_iter()
            .map(PublicQuestion::from)
            .collect();
        Ok(QuizView { quiz, questions })
    }

    /// Questions including their answers, for editors
    pub async fn questions(&self, quiz_id: i64) -> Result<Vec<Question>, QuizServiceError> {
        self.require_quiz(quiz_id).await?;
        Ok(self.quizzes.list_questions(quiz_id).await?)
    }

    pub async fn add_question(
        &self,
        quiz_id: i64,
        input: CreateQuestionInput,
    ) -> Result<Question, QuizServiceError> {
        self.require_quiz(quiz_id).await?;
        let options = validate_options(input.options)?;
        validate_correct_index(input.correct_index, &options)?;

        let position = match input.position {
            Some(p) => p,
            None => self.quizzes.list_questions(quiz_id).await?.len() as i32,
        };

        let question = Question {
            id: 0,
            quiz_id,
            prompt: required(&input.prompt, "prompt")?,
            options,
            correct_index: input.correct_index,
            position,
        };
        Ok(self.quizzes.create_question(&question).await?)
    }

    pub async fn update_question(
        &self,
        id: i64,
        input: UpdateQuestionInput,
    ) -> Result<Question, QuizServiceError> {
        let mut question = self
            .quizzes
            .get_question(id)
            .await
            .context("Failed to get question")?
            .ok_or(QuizServiceError::NotFound("Question"))?;

        if let Some(prompt) = input.prompt {
            question.prompt = required(&prompt, "prompt")?;
        }
        if let Some(options) = input.options {
            question.options = validate_options(options)?;
        }
        if let Some(correct_index) = input.correct_index {
            question.correct_index = correct_index;
        }
        validate_correct_index(question.correct_index, &question.options)?;
        if let Some(position) = input.position {
            question.position = position;
        }

        Ok(self.quizzes.update_question(&question).await?)
    }

    pub async fn delete_question(&self, id: i64) -> Result<(), QuizServiceError> {
        if !self.quizzes.delete_question(id).await.context("Failed to delete question")? {
            return Err(QuizServiceError::NotFound("Question"));
        }
        Ok(())
    }

    /// Score and store an attempt. One answer per question, in order.
    pub async fn submit_attempt(
        &self,
        quiz_id: i64,
        user_id: i64,
        answers: &[i32],
    ) -> Result<AttemptResult, QuizServiceError> {
        let quiz = self.require_quiz(quiz_id).await?;
        let questions = self.quizzes.list_questions(quiz_id).await?;

        if questions.is_empty() {
            return Err(QuizServiceError::ValidationError("quiz has no questions".to_string()));
        }
        if answers.len() != questions.len() {
            return Err(QuizServiceError::ValidationError(format!(
                "answers must contain {} entries",
                questions.len()
            )));
        }

        let (correct, score) = score_answers(&questions, answers);
        let passed = score >= quiz.pass_score;

        let attempt = self
            .quizzes
            .create_attempt(&QuizAttempt {
                id: 0,
                quiz_id,
                user_id,
                score,
                passed,
                created_at: Utc::now(),
            })
            .await?;

        tracing::debug!(quiz_id, user_id, score, passed, "Quiz attempt recorded");
        Ok(AttemptResult {
            attempt_id: attempt.id,
            score,
            passed,
            correct,
            total: questions.len(),
        })
    }

    async fn require_quiz(&self, id: i64) -> Result<Quiz, QuizServiceError> {
        self.quizzes
            .get_by_id(id)
            .await
            .context("Failed to get quiz")?
            .ok_or(QuizServiceError::NotFound("Quiz"))
    }
}

fn required(value: &str, field: &str) -> Result<String, QuizServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(QuizServiceError::ValidationError(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn validate_pass_score(score: i32) -> Result<i32, QuizServiceError> {
    if !(0..=100).contains(&score) {
        return Err(QuizServiceError::ValidationError(
            "pass_score must be between 0 and 100".to_string(),
        ));
    }
    Ok(score)
}

fn validate_options(options: Vec<String>) -> Result<QuestionOptions, QuizServiceError> {
    let options: Vec<String> = options.into_iter().map(|o| o.trim().to_string()).collect();
    if options.len() < MIN_OPTIONS || options.iter().any(String::is_empty) {
        return Err(QuizServiceError::ValidationError(format!(
            "options must contain at least {} non-empty entries",
            MIN_OPTIONS
        )));
    }
    Ok(QuestionOptions(options))
}

fn validate_correct_index(index: i32, options: &QuestionOptions) -> Result<(), QuizServiceError> {
    if index < 0 || index as usize >= options.len() {
        return Err(QuizServiceError::ValidationError(
            "correct_index is out of range".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxCourseRepository, SqlxQuizRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::{Course, Role, Unit, User};

    /// Service, a unit to attach quizzes to, and a student
    async fn setup_test_service() -> (QuizService, i64, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let courses = SqlxCourseRepository::boxed(pool.clone());
        let now = Utc::now();
        let course = courses
            .create(&Course {
                id: 0,
                slug: "c".to_string(),
                title: "C".to_string(),
                title_en: None,
                description: String::new(),
                cover_image: None,
                is_published: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        let unit = courses
            .create_unit(&Unit {
                id: 0,
                course_id: course.id,
                title: "U".to_string(),
                position: 0,
            })
            .await
            .unwrap();

        let student = SqlxUserRepository::new(pool.clone())
            .create(&User::new("s@x.io".to_string(), "hash".to_string(), "S".to_string(), Role::Member))
            .await
            .unwrap();

        let service = QuizService::new(SqlxQuizRepository::boxed(pool), courses);
        (service, unit.id, student.id)
    }

    fn quiz(title: &str) -> CreateQuizInput {
        CreateQuizInput {
            title: title.to_string(),
            pass_score: None,
        }
    }

    fn question(prompt: &str, correct_index: i32) -> CreateQuestionInput {
        CreateQuestionInput {
            prompt: prompt.to_string(),
            options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            correct_index,
            position: None,
        }
    }

    #[tokio::test]
    async fn test_create_quiz_defaults() {
        let (service, unit, _) = setup_test_service().await;
        let q = service.create_quiz(unit, quiz("Check")).await.unwrap();
        assert_eq!(q.pass_score, DEFAULT_PASS_SCORE);

        assert!(matches!(
            service.create_quiz(404, quiz("Orphan")).await,
            Err(QuizServiceError::NotFound("Unit"))
        ));

        let bad = CreateQuizInput {
            title: "Bad".to_string(),
            pass_score: Some(101),
        };
        assert!(matches!(
            service.create_quiz(unit, bad).await,
            Err(QuizServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_question_validation() {
        let (service, unit, _) = setup_test_service().await;
        let q = service.create_quiz(unit, quiz("Check")).await.unwrap();

        let out_of_range = service.add_question(q.id, question("Q", 3)).await;
        assert!(matches!(out_of_range, Err(QuizServiceError::ValidationError(_))));

        let mut one_option = question("Q", 0);
        one_option.options = vec!["only".to_string()];
        assert!(matches!(
            service.add_question(q.id, one_option).await,
            Err(QuizServiceError::ValidationError(_))
        ));

        let added = service.add_question(q.id, question("Q", 2)).await.unwrap();
        let shrink = UpdateQuestionInput {
            options: Some(vec!["x".to_string(), "y".to_string()]),
            ..Default::default()
        };
        assert!(matches!(
            service.update_question(added.id, shrink).await,
            Err(QuizServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_view_hides_answers() {
        let (service, unit, _) = setup_test_service().await;
        let q = service.create_quiz(unit, quiz("Check")).await.unwrap();
        service.add_question(q.id, question("First", 1)).await.unwrap();
        service.add_question(q.id, question("Second", 0)).await.unwrap();

        let view = service.view(q.id).await.unwrap();
        assert_eq!(view.questions.len(), 2);
        assert_eq!(view.questions[0].prompt, "First");

        let json = serde_json::to_value(&view).unwrap();
        assert!(!json.to_string().contains("correct_index"));
    }

    #[tokio::test]
    async fn test_submit_attempt() {
        let (service, unit, student) = setup_test_service().await;
        let q = service.create_quiz(unit, quiz("Check")).await.unwrap();
        for (i, correct) in [0, 1, 2].iter().enumerate() {
            service.add_question(q.id, question(&format!("Q{}", i), *correct)).await.unwrap();
        }

        let result = service.submit_attempt(q.id, student, &[0, 1, 0]).await.unwrap();
        assert_eq!(result.correct, 2);
        assert_eq!(result.score, 66);
        assert!(result.passed);

        let result = service.submit_attempt(q.id, student, &[1, 1, 0]).await.unwrap();
        assert_eq!(result.score, 33);
        assert!(!result.passed);

        let short = service.submit_attempt(q.id, student, &[0, 1]).await;
        assert!(matches!(short, Err(QuizServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_empty_quiz_cannot_be_attempted() {
        let (service, unit, _) = setup_test_service().await;
        let q = service.create_quiz(unit, quiz("Empty")).await.unwrap();
        assert!(matches!(
            service.submit_attempt(q.id, 1, &[]).await,
            Err(QuizServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn test_score_rounds_down() {
        let questions: Vec<Question> = (0..3)
            .map(|i| Question {
                id: i,
                quiz_id: 1,
                prompt: String::new(),
                options: QuestionOptions(vec!["a".into(), "b".into()]),
                correct_index: 0,
                position: i as i32,
            })
            .collect();
        assert_eq!(score_answers(&questions, &[0, 0, 0]), (3, 100));
        assert_eq!(score_answers(&questions, &[0, 0, 1]), (2, 66));
        assert_eq!(score_answers(&questions, &[1, 1, 1]), (0, 0));
        assert_eq!(score_answers(&[], &[]), (0, 0));
    }
}

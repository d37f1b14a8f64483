//! Quiz repository
//!
//! Quizzes, their questions, and scored attempts.

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{Question, Quiz, QuizAttempt};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn create(&self, quiz: &Quiz) -> Result<Quiz>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Quiz>>;

    async fn update(&self, quiz: &Quiz) -> Result<Quiz>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn list_for_unit(&self, unit_id: i64) -> Result<Vec<Quiz>>;

    /// Quizzes attached to any unit of the course
    async fn list_for_course(&self, course_id: i64) -> Result<Vec<Quiz>>;

    async fn create_question(&self, question: &Question) -> Result<Question>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>>;

    async fn update_question(&self, question: &Question) -> Result<Question>;

    async fn delete_question(&self, id: i64) -> Result<bool>;

    /// Questions of a quiz ordered by position
    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>>;

    async fn create_attempt(&self, attempt: &QuizAttempt) -> Result<QuizAttempt>;

    /// Number of distinct quizzes of the course the user has passed at least once
    async fn count_passed_quizzes(&self, user_id: i64, course_id: i64) -> Result<i64>;
}

pub struct SqlxQuizRepository {
    pool: DynDatabasePool,
}

impl SqlxQuizRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuizRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl QuizRepository for SqlxQuizRepository {
    async fn create(&self, quiz: &Quiz) -> Result<Quiz> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO quizzes (unit_id, title, pass_score, created_at) VALUES (?, ?, ?, ?)")
                .bind(quiz.unit_id)
                .bind(&quiz.title)
                .bind(quiz.pass_score)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create quiz")?
                .inserted_id()
        });

        Ok(Quiz {
            id,
            created_at: now,
            ..quiz.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Quiz>> {
        let quiz = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Quiz>("SELECT id, unit_id, title, pass_score, created_at FROM quizzes WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get quiz")?
        });
        Ok(quiz)
    }

    async fn update(&self, quiz: &Quiz) -> Result<Quiz> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE quizzes SET title = ?, pass_score = ? WHERE id = ?")
                .bind(&quiz.title)
                .bind(quiz.pass_score)
                .bind(quiz.id)
                .execute(pool)
                .await
                .context("Failed to update quiz")?;
        });
        Ok(quiz.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM quizzes WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete quiz")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_for_unit(&self, unit_id: i64) -> Result<Vec<Quiz>> {
        let quizzes = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Quiz>(
                "SELECT id, unit_id, title, pass_score, created_at FROM quizzes WHERE unit_id = ? ORDER BY id",
            )
            .bind(unit_id)
            .fetch_all(pool)
            .await
            .context("Failed to list unit quizzes")?
        });
        Ok(quizzes)
    }

    async fn list_for_course(&self, course_id: i64) -> Result<Vec<Quiz>> {
        let quizzes = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Quiz>(
                r#"
                SELECT q.id, q.unit_id, q.title, q.pass_score, q.created_at
                FROM quizzes q
                INNER JOIN units u ON u.id = q.unit_id
                WHERE u.course_id = ?
                ORDER BY u.position, u.id, q.id
                "#,
            )
            .bind(course_id)
            .fetch_all(pool)
            .await
            .context("Failed to list course quizzes")?
        });
        Ok(quizzes)
    }

    async fn create_question(&self, question: &Question) -> Result<Question> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO questions (quiz_id, prompt, options, correct_index, position) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(question.quiz_id)
            .bind(&question.prompt)
            .bind(question.options.to_json())
            .bind(question.correct_index)
            .bind(question.position)
            .execute(pool)
            .await
            .context("Failed to create question")?
            .inserted_id()
        });
        Ok(Question {
            id,
            ..question.clone()
        })
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>> {
        let question = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Question>(
                "SELECT id, quiz_id, prompt, options, correct_index, position FROM questions WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get question")?
        });
        Ok(question)
    }

    async fn update_question(&self, question: &Question) -> Result<Question> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE questions SET prompt = ?, options = ?, correct_index = ?, position = ? WHERE id = ?")
                .bind(&question.prompt)
                .bind(question.options.to_json())
                .bind(question.correct_index)
                .bind(question.position)
                .bind(question.id)
                .execute(pool)
                .await
                .context("Failed to update question")?;
        });
        Ok(question.clone())
    }

    async fn delete_question(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM questions WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete question")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_questions(&self, quiz_id: i64) -> Result<Vec<Question>> {
        let questions = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Question>(
                r#"
                SELECT id, quiz_id, prompt, options, correct_index, position
                FROM questions
                WHERE quiz_id = ?
                ORDER BY position, id
                "#,
            )
            .bind(quiz_id)
            .fetch_all(pool)
            .await
            .context("Failed to list questions")?
        });
        Ok(questions)
    }

    async fn create_attempt(&self, attempt: &QuizAttempt) -> Result<QuizAttempt> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO quiz_attempts (quiz_id, user_id, score, passed, created_at) VALUES (?, ?, ?, ?, ?)")
                .bind(attempt.quiz_id)
                .bind(attempt.user_id)
                .bind(attempt.score)
                .bind(attempt.passed)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to record quiz attempt")?
                .inserted_id()
        });

        Ok(QuizAttempt {
            id,
            created_at: now,
            ..attempt.clone()
        })
    }

    async fn count_passed_quizzes(&self, user_id: i64, course_id: i64) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(DISTINCT a.quiz_id)
                FROM quiz_attempts a
                INNER JOIN quizzes q ON q.id = a.quiz_id
                INNER JOIN units u ON u.id = q.unit_id
                WHERE a.user_id = ? AND a.passed = ? AND u.course_id = ?
                "#,
            )
            .bind(user_id)
            .bind(true)
            .bind(course_id)
            .fetch_one(pool)
            .await
            .context("Failed to count passed quizzes")?
        });
        Ok(count)
    }
}

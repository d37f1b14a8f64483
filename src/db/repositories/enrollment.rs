//! Enrollment repository
//!
//! Enrollments and per-lesson completion records.

use crate::db::{is_unique_violation, with_pool, DynDatabasePool, InsertedId};
use crate::models::{Enrollment, EnrollmentSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    async fn get(&self, user_id: i64, course_id: i64) -> Result<Option<Enrollment>>;

    /// Insert a fresh enrollment at 0% progress
    async fn create(&self, user_id: i64, course_id: i64) -> Result<Enrollment>;

    async fn update_progress(
        &self,
        id: i64,
        progress: i32,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Record a lesson as completed; returns false if it already was
    async fn record_completion(&self, user_id: i64, lesson_id: i64) -> Result<bool>;

    /// Lessons of the course the user has completed
    async fn count_completed_lessons(&self, user_id: i64, course_id: i64) -> Result<i64>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EnrollmentSummary>>;
}

pub struct SqlxEnrollmentRepository {
    pool: DynDatabasePool,
}

impl SqlxEnrollmentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn EnrollmentRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl EnrollmentRepository for SqlxEnrollmentRepository {
    async fn get(&self, user_id: i64, course_id: i64) -> Result<Option<Enrollment>> {
        let enrollment = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Enrollment>(
                r#"
                SELECT id, user_id, course_id, progress, completed_at, created_at, updated_at
                FROM enrollments
                WHERE user_id = ? AND course_id = ?
                "#,
            )
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(pool)
            .await
            .context("Failed to get enrollment")?
        });
        Ok(enrollment)
    }

    async fn create(&self, user_id: i64, course_id: i64) -> Result<Enrollment> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO enrollments (user_id, course_id, progress, created_at, updated_at)
                VALUES (?, ?, 0, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(course_id)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create enrollment")?
            .inserted_id()
        });

        Ok(Enrollment {
            id,
            user_id,
            course_id,
            progress: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_progress(
        &self,
        id: i64,
        progress: i32,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE enrollments SET progress = ?, completed_at = ?, updated_at = ? WHERE id = ?")
                .bind(progress)
                .bind(completed_at)
                .bind(Utc::now())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update enrollment progress")?;
        });
        Ok(())
    }

    async fn record_completion(&self, user_id: i64, lesson_id: i64) -> Result<bool> {
        let result: Result<()> = async {
            with_pool!(self.pool, |pool| {
                sqlx::query("INSERT INTO lesson_completions (user_id, lesson_id, created_at) VALUES (?, ?, ?)")
                    .bind(user_id)
                    .bind(lesson_id)
                    .bind(Utc::now())
                    .execute(pool)
                    .await
                    .context("Failed to record lesson completion")?;
            });
            Ok(())
        }
        .await;

        match result {
            Ok(()) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn count_completed_lessons(&self, user_id: i64, course_id: i64) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*)
                FROM lesson_completions lc
                INNER JOIN lessons l ON l.id = lc.lesson_id
                INNER JOIN units u ON u.id = l.unit_id
                WHERE lc.user_id = ? AND u.course_id = ?
                "#,
            )
            .bind(user_id)
            .bind(course_id)
            .fetch_one(pool)
            .await
            .context("Failed to count completed lessons")?
        });
        Ok(count)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<EnrollmentSummary>> {
        let summaries = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, EnrollmentSummary>(
                r#"
                SELECT c.id AS course_id, c.slug, c.title, e.progress, e.completed_at
                FROM enrollments e
                INNER JOIN courses c ON c.id = e.course_id
                WHERE e.user_id = ?
                ORDER BY e.created_at DESC, e.id DESC
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
            .context("Failed to list enrollments")?
        });
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    struct Fixture {
        repo: SqlxEnrollmentRepository,
        user_id: i64,
        course_id: i64,
        lesson_ids: Vec<i64>,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let p = pool.as_sqlite().unwrap();
        let now = Utc::now();
        let user_id = sqlx::query(
            "INSERT INTO users (email, password_hash, name, role, created_at, updated_at) VALUES ('a@example.com', 'h', 'A', 'MEMBER', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(p)
        .await
        .unwrap()
        .last_insert_rowid();
        let course_id = sqlx::query(
            "INSERT INTO courses (slug, title, description, is_published, created_at, updated_at) VALUES ('c', 'C', '', 1, ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(p)
        .await
        .unwrap()
        .last_insert_rowid();
        let unit_id = sqlx::query("INSERT INTO units (course_id, title, position) VALUES (?, 'U', 0)")
            .bind(course_id)
            .execute(p)
            .await
            .unwrap()
            .last_insert_rowid();

        let mut lesson_ids = Vec::new();
        for i in 0..2 {
            let id = sqlx::query(
                "INSERT INTO lessons (unit_id, title, content, content_html, position, created_at) VALUES (?, 'L', '', '', ?, ?)",
            )
            .bind(unit_id)
            .bind(i)
            .bind(now)
            .execute(p)
            .await
            .unwrap()
            .last_insert_rowid();
            lesson_ids.push(id);
        }

        Fixture {
            repo: SqlxEnrollmentRepository::new(pool),
            user_id,
            course_id,
            lesson_ids,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_enrollment() {
        let f = setup().await;
        assert!(f.repo.get(f.user_id, f.course_id).await.unwrap().is_none());

        let created = f.repo.create(f.user_id, f.course_id).await.unwrap();
        assert_eq!(created.progress, 0);

        let found = f.repo.get(f.user_id, f.course_id).await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_update_progress() {
        let f = setup().await;
        let e = f.repo.create(f.user_id, f.course_id).await.unwrap();
        let done = Utc::now();

        f.repo.update_progress(e.id, 100, Some(done)).await.unwrap();

        let found = f.repo.get(f.user_id, f.course_id).await.unwrap().unwrap();
        assert_eq!(found.progress, 100);
        assert!(found.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_record_completion_is_idempotent() {
        let f = setup().await;
        assert!(f.repo.record_completion(f.user_id, f.lesson_ids[0]).await.unwrap());
        assert!(!f.repo.record_completion(f.user_id, f.lesson_ids[0]).await.unwrap());
        assert_eq!(f.repo.count_completed_lessons(f.user_id, f.course_id).await.unwrap(), 1);

        assert!(f.repo.record_completion(f.user_id, f.lesson_ids[1]).await.unwrap());
        assert_eq!(f.repo.count_completed_lessons(f.user_id, f.course_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let f = setup().await;
        f.repo.create(f.user_id, f.course_id).await.unwrap();

        let list = f.repo.list_for_user(f.user_id).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].slug, "c");
        assert_eq!(list[0].progress, 0);
    }
}

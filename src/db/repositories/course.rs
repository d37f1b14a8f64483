//! Course repository
//!
//! Database operations for courses and their units and lessons.

use crate::db::{with_pool, DynDatabasePool, InsertedId};
use crate::models::{Course, Lesson, Unit};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: &Course) -> Result<Course>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    async fn update(&self, course: &Course) -> Result<Course>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// List courses, newest first
    async fn list(&self, published_only: bool) -> Result<Vec<Course>>;

    async fn create_unit(&self, unit: &Unit) -> Result<Unit>;

    async fn get_unit(&self, id: i64) -> Result<Option<Unit>>;

    async fn update_unit(&self, unit: &Unit) -> Result<Unit>;

    async fn delete_unit(&self, id: i64) -> Result<bool>;

    /// Units of a course ordered by position
    async fn list_units(&self, course_id: i64) -> Result<Vec<Unit>>;

    async fn create_lesson(&self, lesson: &Lesson) -> Result<Lesson>;

    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>>;

    async fn update_lesson(&self, lesson: &Lesson) -> Result<Lesson>;

    async fn delete_lesson(&self, id: i64) -> Result<bool>;

    /// All lessons of a course, in unit order then lesson order
    async fn list_lessons_for_course(&self, course_id: i64) -> Result<Vec<Lesson>>;

    async fn count_lessons(&self, course_id: i64) -> Result<i64>;

    /// Course owning the given lesson
    async fn course_id_for_lesson(&self, lesson_id: i64) -> Result<Option<i64>>;
}

pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, course: &Course) -> Result<Course> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO courses (slug, title, title_en, description, cover_image, is_published, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&course.slug)
            .bind(&course.title)
            .bind(&course.title_en)
            .bind(&course.description)
            .bind(&course.cover_image)
            .bind(course.is_published)
            .bind(now)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create course")?
            .inserted_id()
        });

        Ok(Course {
            id,
            created_at: now,
            updated_at: now,
            ..course.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let course = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Course>(
                r#"
                SELECT id, slug, title, title_en, description, cover_image, is_published, created_at, updated_at
                FROM courses
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get course by ID")?
        });
        Ok(course)
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Course>> {
        let course = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Course>(
                r#"
                SELECT id, slug, title, title_en, description, cover_image, is_published, created_at, updated_at
                FROM courses
                WHERE slug = ?
                "#,
            )
            .bind(slug)
            .fetch_optional(pool)
            .await
            .context("Failed to get course by slug")?
        });
        Ok(course)
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE slug = ?")
                .bind(slug)
                .fetch_one(pool)
                .await
                .context("Failed to check course slug")?
        });
        Ok(count > 0)
    }

    async fn update(&self, course: &Course) -> Result<Course> {
        with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                UPDATE courses
                SET slug = ?, title = ?, title_en = ?, description = ?, cover_image = ?, is_published = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(&course.slug)
            .bind(&course.title)
            .bind(&course.title_en)
            .bind(&course.description)
            .bind(&course.cover_image)
            .bind(course.is_published)
            .bind(Utc::now())
            .bind(course.id)
            .execute(pool)
            .await
            .context("Failed to update course")?;
        });

        self.get_by_id(course.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Course not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM courses WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete course")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list(&self, published_only: bool) -> Result<Vec<Course>> {
        let courses = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Course>(
                r#"
                SELECT id, slug, title, title_en, description, cover_image, is_published, created_at, updated_at
                FROM courses
                WHERE ? OR is_published = ?
                ORDER BY created_at DESC, id DESC
                "#,
            )
            .bind(!published_only)
            .bind(true)
            .fetch_all(pool)
            .await
            .context("Failed to list courses")?
        });
        Ok(courses)
    }

    async fn create_unit(&self, unit: &Unit) -> Result<Unit> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO units (course_id, title, position) VALUES (?, ?, ?)")
                .bind(unit.course_id)
                .bind(&unit.title)
                .bind(unit.position)
                .execute(pool)
                .await
                .context("Failed to create unit")?
                .inserted_id()
        });
        Ok(Unit { id, ..unit.clone() })
    }

    async fn get_unit(&self, id: i64) -> Result<Option<Unit>> {
        let unit = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Unit>("SELECT id, course_id, title, position FROM units WHERE id = ?")
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get unit")?
        });
        Ok(unit)
    }

    async fn update_unit(&self, unit: &Unit) -> Result<Unit> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE units SET title = ?, position = ? WHERE id = ?")
                .bind(&unit.title)
                .bind(unit.position)
                .bind(unit.id)
                .execute(pool)
                .await
                .context("Failed to update unit")?;
        });
        Ok(unit.clone())
    }

    async fn delete_unit(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM units WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete unit")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_units(&self, course_id: i64) -> Result<Vec<Unit>> {
        let units = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Unit>(
                "SELECT id, course_id, title, position FROM units WHERE course_id = ? ORDER BY position, id",
            )
            .bind(course_id)
            .fetch_all(pool)
            .await
            .context("Failed to list units")?
        });
        Ok(units)
    }

    async fn create_lesson(&self, lesson: &Lesson) -> Result<Lesson> {
        let now = Utc::now();

        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                INSERT INTO lessons (unit_id, title, content, content_html, video_url, position, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(lesson.unit_id)
            .bind(&lesson.title)
            .bind(&lesson.content)
            .bind(&lesson.content_html)
            .bind(&lesson.video_url)
            .bind(lesson.position)
            .bind(now)
            .execute(pool)
            .await
            .context("Failed to create lesson")?
            .inserted_id()
        });

        Ok(Lesson {
            id,
            created_at: now,
            ..lesson.clone()
        })
    }

    async fn get_lesson(&self, id: i64) -> Result<Option<Lesson>> {
        let lesson = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Lesson>(
                r#"
                SELECT id, unit_id, title, content, content_html, video_url, position, created_at
                FROM lessons
                WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get lesson")?
        });
        Ok(lesson)
    }

    async fn update_lesson(&self, lesson: &Lesson) -> Result<Lesson> {
        with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                UPDATE lessons
                SET title = ?, content = ?, content_html = ?, video_url = ?, position = ?
                WHERE id = ?
                "#,
            )
            .bind(&lesson.title)
            .bind(&lesson.content)
            .bind(&lesson.content_html)
            .bind(&lesson.video_url)
            .bind(lesson.position)
            .bind(lesson.id)
            .execute(pool)
            .await
            .context("Failed to update lesson")?;
        });

        self.get_lesson(lesson.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Lesson not found after update"))
    }

    async fn delete_lesson(&self, id: i64) -> Result<bool> {
        let affected = with_pool!(self.pool, |pool| {
            sqlx::query("DELETE FROM lessons WHERE id = ?")
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to delete lesson")?
                .rows_affected()
        });
        Ok(affected > 0)
    }

    async fn list_lessons_for_course(&self, course_id: i64) -> Result<Vec<Lesson>> {
        let lessons = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Lesson>(
                r#"
                SELECT l.id, l.unit_id, l.title, l.content, l.content_html, l.video_url, l.position, l.created_at
                FROM lessons l
                INNER JOIN units u ON u.id = l.unit_id
                WHERE u.course_id = ?
                ORDER BY u.position, u.id, l.position, l.id
                "#,
            )
            .bind(course_id)
            .fetch_all(pool)
            .await
            .context("Failed to list course lessons")?
        });
        Ok(lessons)
    }

    async fn count_lessons(&self, course_id: i64) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*)
                FROM lessons l
                INNER JOIN units u ON u.id = l.unit_id
                WHERE u.course_id = ?
                "#,
            )
            .bind(course_id)
            .fetch_one(pool)
            .await
            .context("Failed to count course lessons")?
        });
        Ok(count)
    }

    async fn course_id_for_lesson(&self, lesson_id: i64) -> Result<Option<i64>> {
        let course_id = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>(
                r#"
                SELECT u.course_id
                FROM lessons l
                INNER JOIN units u ON u.id = l.unit_id
                WHERE l.id = ?
                "#,
            )
            .bind(lesson_id)
            .fetch_optional(pool)
            .await
            .context("Failed to resolve lesson course")?
        });
        Ok(course_id)
    }
}

//! Course service
//!
//! Courses, their units and lessons, enrollment and progress. Progress is
//! the rounded share of the course's lessons the student has completed;
//! the first time it reaches 100 the enrollment is stamped completed.

use crate::db::repositories::{CourseRepository, EnrollmentRepository, QuizRepository};
use crate::models::{
    progress_percent, Course, CreateCourseInput, CreateLessonInput, Enrollment, EnrollmentState,
    EnrollmentSummary, Lesson, Quiz, Unit, UnitInput, UpdateCourseInput, UpdateLessonInput,
    UpdateUnitInput,
};
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::{generate_slug, unique_slug};
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Slug already exists: {0}")]
    SlugExists(String),

    #[error("You are not enrolled in this course")]
    NotEnrolled,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Lesson as listed in a course outline, without its body
#[derive(Debug, Clone, Serialize)]
pub struct LessonSummary {
    pub id: i64,
    pub title: String,
    pub position: i32,
    pub has_video: bool,
}

impl From<&Lesson> for LessonSummary {
    fn from(lesson: &Lesson) -> Self {
        Self {
            id: lesson.id,
            title: lesson.title.clone(),
            position: lesson.position,
            has_video: lesson.video_url.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutline {
    #[serde(flatten)]
    pub unit: Unit,
    pub lessons: Vec<LessonSummary>,
    pub quizzes: Vec<Quiz>,
}

/// A course with its table of contents
#[derive(Debug, Clone, Serialize)]
pub struct CourseOutline {
    #[serde(flatten)]
    pub course: Course,
    pub units: Vec<UnitOutline>,
    pub lesson_count: usize,
}

pub struct CourseService {
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    quizzes: Arc<dyn QuizRepository>,
    renderer: MarkdownRenderer,
}

impl CourseService {
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        quizzes: Arc<dyn QuizRepository>,
    ) -> Self {
        Self {
            courses,
            enrollments,
            quizzes,
            renderer: MarkdownRenderer::new(),
        }
    }

    // Courses

    pub async fn create(&self, input: CreateCourseInput) -> Result<Course, CourseServiceError> {
        let title = required(&input.title, "title")?;

        let slug = match input.slug.as_deref().map(generate_slug).filter(|s| !s.is_empty()) {
            Some(slug) => {
                if self.courses.exists_by_slug(&slug).await.context("Failed to check slug")? {
                    return Err(CourseServiceError::SlugExists(slug));
                }
                slug
            }
            None => {
                let courses = &self.courses;
                unique_slug(generate_slug(&title), "course", |s| async move {
                    courses.exists_by_slug(&s).await
                })
                .await?
            }
        };

        let now = Utc::now();
        let course = Course {
            id: 0,
            slug,
            title,
            title_en: input.title_en.filter(|t| !t.trim().is_empty()),
            description: input.description,
            cover_image: input.cover_image.filter(|c| !c.trim().is_empty()),
            is_published: input.is_published,
            created_at: now,
            updated_at: now,
        };

        let created = self.courses.create(&course).await?;
        tracing::info!(course_id = created.id, slug = %created.slug, "Course created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, input: UpdateCourseInput) -> Result<Course, CourseServiceError> {
        let mut course = self.require_course(id).await?;

        if let Some(title) = input.title {
            course.title = required(&title, "title")?;
        }
        if let Some(slug) = input.slug {
            let slug = generate_slug(&slug);
            if slug.is_empty() {
                return Err(CourseServiceError::ValidationError("slug is invalid".to_string()));
            }
            if slug != course.slug && self.courses.exists_by_slug(&slug).await.context("Failed to check slug")? {
                return Err(CourseServiceError::SlugExists(slug));
            }
            course.slug = slug;
        }
        if input.title_en.is_some() {
            course.title_en = input.title_en.filter(|t| !t.trim().is_empty());
        }
        if let Some(description) = input.description {
            course.description = description;
        }
        if input.cover_image.is_some() {
            course.cover_image = input.cover_image.filter(|c| !c.trim().is_empty());
        }
        if let Some(is_published) = input.is_published {
            course.is_published = is_published;
        }

        Ok(self.courses.update(&course).await?)
    }

    pub async fn delete(&self, id: i64) -> Result<(), CourseServiceError> {
        if !self.courses.delete(id).await.context("Failed to delete course")? {
            return Err(CourseServiceError::NotFound("Course"));
        }
        tracing::info!(course_id = id, "Course deleted");
        Ok(())
    }

    pub async fn list(&self, published_only: bool) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self.courses.list(published_only).await?)
    }

    /// Course by slug. Unpublished courses are only visible with
    /// `include_unpublished`.
    pub async fn get_by_slug(
        &self,
        slug: &str,
        include_unpublished: bool,
    ) -> Result<Course, CourseServiceError> {
        self.courses
            .get_by_slug(slug)
            .await
            .context("Failed to get course")?
            .filter(|c| c.is_published || include_unpublished)
            .ok_or(CourseServiceError::NotFound("Course"))
    }

    /// Units with their lessons and quizzes, in order
    pub async fn outline(
        &self,
        slug: &str,
        include_unpublished: bool,
    ) -> Result<CourseOutline, CourseServiceError> {
        let course = self.get_by_slug(slug, include_unpublished).await?;
        let units = self.courses.list_units(course.id).await?;
        let lessons = self.courses.list_lessons_for_course(course.id).await?;
        let quizzes = self.quizzes.list_for_course(course.id).await?;

        let units = units
            .into_iter()
            .map(|unit| UnitOutline {
                lessons: lessons
                    .iter()
                    .filter(|l| l.unit_id == unit.id)
                    .map(LessonSummary::from)
                    .collect(),
                quizzes: quizzes.iter().filter(|q| q.unit_id == unit.id).cloned().collect(),
                unit,
            })
            .collect();

        Ok(CourseOutline {
            course,
            units,
            lesson_count: lessons.len(),
        })
    }

    // Units

    pub async fn create_unit(&self, course_id: i64, input: UnitInput) -> Result<Unit, CourseServiceError> {
        self.require_course(course_id).await?;
        let title = required(&input.title, "title")?;

        let position = match input.position {
            Some(p) => p,
            None => self.courses.list_units(course_id).await?.len() as i32,
        };

        let unit = Unit {
            id: 0,
            course_id,
            title,
            position,
        };
        Ok(self.courses.create_unit(&unit).await?)
    }

    pub async fn update_unit(&self, id: i64, input: UpdateUnitInput) -> Result<Unit, CourseServiceError> {
        let mut unit = self.require_unit(id).await?;
        if let Some(title) = input.title {
            unit.title = required(&title, "title")?;
        }
        if let Some(position) = input.position {
            unit.position = position;
        }
        Ok(self.courses.update_unit(&unit).await?)
    }

    pub async fn delete_unit(&self, id: i64) -> Result<(), CourseServiceError> {
        if !self.courses.delete_unit(id).await.context("Failed to delete unit")? {
            return Err(CourseServiceError::NotFound("Unit"));
        }
        Ok(())
    }

    // Lessons

    pub async fn create_lesson(
        &self,
        unit_id: i64,
        input: CreateLessonInput,
    ) -> Result<Lesson, CourseServiceError> {
        let unit = self.require_unit(unit_id).await?;
        let title = required(&input.title, "title")?;

        let position = match input.position {
            Some(p) => p,
            None => self
                .courses
                .list_lessons_for_course(unit.course_id)
                .await?
                .iter()
                .filter(|l| l.unit_id == unit_id)
                .count() as i32,
        };

        let lesson = Lesson {
            id: 0,
            unit_id,
            title,
            content_html: self.renderer.render(&input.content),
            content: input.content,
            video_url: input.video_url.filter(|v| !v.trim().is_empty()),
            position,
            created_at: Utc::now(),
        };
        Ok(self.courses.create_lesson(&lesson).await?)
    }

    pub async fn update_lesson(
        &self,
        id: i64,
        input: UpdateLessonInput,
    ) -> Result<Lesson, CourseServiceError> {
        let mut lesson = self.get_lesson(id).await?;
        if let Some(title) = input.title {
            lesson.title = required(&title, "title")?;
        }
        if let Some(content) = input.content {
            lesson.content_html = self.renderer.render(&content);
            lesson.content = content;
        }
        if input.video_url.is_some() {
            lesson.video_url = input.video_url.filter(|v| !v.trim().is_empty());
        }
        if let Some(position) = input.position {
            lesson.position = position;
        }
        Ok(self.courses.update_lesson(&lesson).await?)
    }

    pub async fn delete_lesson(&self, id: i64) -> Result<(), CourseServiceError> {
        if !self.courses.delete_lesson(id).await.context("Failed to delete lesson")? {
            return Err(CourseServiceError::NotFound("Lesson"));
        }
        Ok(())
    }

    pub async fn get_lesson(&self, id: i64) -> Result<Lesson, CourseServiceError> {
        self.courses
            .get_lesson(id)
            .await
            .context("Failed to get lesson")?
            .ok_or(CourseServiceError::NotFound("Lesson"))
    }

    // Enrollment

    /// Enroll the user; enrolling twice returns the existing enrollment
    pub async fn enroll(&self, user_id: i64, slug: &str) -> Result<Enrollment, CourseServiceError> {
        let course = self.get_by_slug(slug, false).await?;

        if let Some(existing) = self.enrollments.get(user_id, course.id).await? {
            return Ok(existing);
        }

        let enrollment = self.enrollments.create(user_id, course.id).await?;
        tracing::info!(user_id, course_id = course.id, "Enrolled");
        Ok(enrollment)
    }

    /// Enrollment state of the user in a course
    pub async fn enrollment_state(
        &self,
        user_id: i64,
        course_id: i64,
    ) -> Result<EnrollmentState, CourseServiceError> {
        let enrollment = self.enrollments.get(user_id, course_id).await?;
        Ok(EnrollmentState::of(enrollment.as_ref()))
    }

    /// Mark a lesson done and recompute progress in its course
    pub async fn complete_lesson(
        &self,
        user_id: i64,
        lesson_id: i64,
    ) -> Result<Enrollment, CourseServiceError> {
        let course_id = self
            .courses
            .course_id_for_lesson(lesson_id)
            .await?
            .ok_or(CourseServiceError::NotFound("Lesson"))?;

        let mut enrollment = self
            .enrollments
            .get(user_id, course_id)
            .await?
            .ok_or(CourseServiceError::NotEnrolled)?;

        self.enrollments.record_completion(user_id, lesson_id).await?;

        let completed = self.enrollments.count_completed_lessons(user_id, course_id).await?;
        let total = self.courses.count_lessons(course_id).await?;
        let progress = progress_percent(completed, total);

        let completed_at = match enrollment.completed_at {
            Some(at) => Some(at),
            None if progress >= 100 => Some(Utc::now()),
            None => None,
        };

        if progress != enrollment.progress || completed_at != enrollment.completed_at {
            self.enrollments
                .update_progress(enrollment.id, progress, completed_at)
                .await?;
            if completed_at.is_some() && enrollment.completed_at.is_none() {
                tracing::info!(user_id, course_id, "Course completed");
            }
            enrollment.progress = progress;
            enrollment.completed_at = completed_at;
        }

        Ok(enrollment)
    }

    pub async fn enrollments_of(&self, user_id: i64) -> Result<Vec<EnrollmentSummary>, CourseServiceError> {
        Ok(self.enrollments.list_for_user(user_id).await?)
    }

    async fn require_course(&self, id: i64) -> Result<Course, CourseServiceError> {
        self.courses
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or(CourseServiceError::NotFound("Course"))
    }

    async fn require_unit(&self, id: i64) -> Result<Unit, CourseServiceError> {
        self.courses
            .get_unit(id)
            .await
            .context("Failed to get unit")?
            .ok_or(CourseServiceError::NotFound("Unit"))
    }
}

fn required(value: &str, field: &str) -> Result<String, CourseServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CourseServiceError::ValidationError(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCourseRepository, SqlxEnrollmentRepository, SqlxQuizRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{Role, User};

    pub(crate) async fn setup_test_service() -> (DynDatabasePool, CourseService) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let service = CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxEnrollmentRepository::boxed(pool.clone()),
            SqlxQuizRepository::boxed(pool.clone()),
        );
        (pool, service)
    }

    pub(crate) async fn student(pool: &DynDatabasePool, email: &str) -> i64 {
        SqlxUserRepository::new(pool.clone())
            .create(&User::new(email.to_string(), "hash".to_string(), "Student".to_string(), Role::Member))
            .await
            .unwrap()
            .id
    }

    pub(crate) fn course_input(title: &str) -> CreateCourseInput {
        CreateCourseInput {
            slug: None,
            title: title.to_string(),
            title_en: None,
            description: String::new(),
            cover_image: None,
            is_published: true,
        }
    }

    pub(crate) fn lesson_input(title: &str) -> CreateLessonInput {
        CreateLessonInput {
            title: title.to_string(),
            content: format!("## {}", title),
            video_url: None,
            position: None,
        }
    }

    fn unit_input(title: &str) -> UnitInput {
        UnitInput {
            title: title.to_string(),
            position: None,
        }
    }

    #[tokio::test]
    async fn test_create_course_slug() {
        let (_pool, service) = setup_test_service().await;
        let a = service.create(course_input("Intro to Rust")).await.unwrap();
        let b = service.create(course_input("Intro to Rust")).await.unwrap();
        assert_eq!(a.slug, "intro-to-rust");
        assert_eq!(b.slug, "intro-to-rust-2");

        let mut taken = course_input("Other");
        taken.slug = Some("intro-to-rust".to_string());
        assert!(matches!(service.create(taken).await, Err(CourseServiceError::SlugExists(_))));
    }

    #[tokio::test]
    async fn test_unpublished_course_is_hidden() {
        let (_pool, service) = setup_test_service().await;
        let mut draft = course_input("Draft");
        draft.is_published = false;
        let draft = service.create(draft).await.unwrap();

        assert!(matches!(
            service.get_by_slug(&draft.slug, false).await,
            Err(CourseServiceError::NotFound(_))
        ));
        assert!(service.get_by_slug(&draft.slug, true).await.is_ok());
        assert!(service.list(true).await.unwrap().is_empty());
        assert_eq!(service.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_outline_orders_units_and_lessons() {
        let (_pool, service) = setup_test_service().await;
        let course = service.create(course_input("Course")).await.unwrap();
        let u1 = service.create_unit(course.id, unit_input("One")).await.unwrap();
        let u2 = service.create_unit(course.id, unit_input("Two")).await.unwrap();
        assert_eq!((u1.position, u2.position), (0, 1));

        let l1 = service.create_lesson(u1.id, lesson_input("A")).await.unwrap();
        let l2 = service.create_lesson(u1.id, lesson_input("B")).await.unwrap();
        service.create_lesson(u2.id, lesson_input("C")).await.unwrap();
        assert_eq!((l1.position, l2.position), (0, 1));
        assert!(l1.content_html.contains("<h2>A</h2>"));

        let outline = service.outline(&course.slug, false).await.unwrap();
        assert_eq!(outline.lesson_count, 3);
        assert_eq!(outline.units.len(), 2);
        assert_eq!(outline.units[0].unit.id, u1.id);
        let titles: Vec<_> = outline.units[0].lessons.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"]);
    }

    #[tokio::test]
    async fn test_enroll_is_idempotent() {
        let (pool, service) = setup_test_service().await;
        let course = service.create(course_input("Course")).await.unwrap();
        let user = student(&pool, "s@x.io").await;

        assert_eq!(
            service.enrollment_state(user, course.id).await.unwrap(),
            EnrollmentState::NotEnrolled
        );

        let first = service.enroll(user, &course.slug).await.unwrap();
        let second = service.enroll(user, &course.slug).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.progress, 0);
        assert_eq!(
            service.enrollment_state(user, course.id).await.unwrap(),
            EnrollmentState::InProgress
        );
    }

    #[tokio::test]
    async fn test_complete_lessons_until_done() {
        let (pool, service) = setup_test_service().await;
        let course = service.create(course_input("Course")).await.unwrap();
        let unit = service.create_unit(course.id, unit_input("U")).await.unwrap();
        let lessons = [
            service.create_lesson(unit.id, lesson_input("A")).await.unwrap(),
            service.create_lesson(unit.id, lesson_input("B")).await.unwrap(),
            service.create_lesson(unit.id, lesson_input("C")).await.unwrap(),
        ];
        let user = student(&pool, "s@x.io").await;

        let result = service.complete_lesson(user, lessons[0].id).await;
        assert!(matches!(result, Err(CourseServiceError::NotEnrolled)));

        service.enroll(user, &course.slug).await.unwrap();

        let e = service.complete_lesson(user, lessons[0].id).await.unwrap();
        assert_eq!(e.progress, 33);
        assert!(e.completed_at.is_none());

        let e = service.complete_lesson(user, lessons[0].id).await.unwrap();
        assert_eq!(e.progress, 33);

        let e = service.complete_lesson(user, lessons[1].id).await.unwrap();
        assert_eq!(e.progress, 67);

        let done = service.complete_lesson(user, lessons[2].id).await.unwrap();
        assert_eq!(done.progress, 100);
        let stamped = done.completed_at.expect("completion time");

        let again = service.complete_lesson(user, lessons[2].id).await.unwrap();
        assert_eq!(again.completed_at.map(|t| t.timestamp()), Some(stamped.timestamp()));
        assert_eq!(
            service.enrollment_state(user, course.id).await.unwrap(),
            EnrollmentState::Completed
        );

        let mine = service.enrollments_of(user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].progress, 100);
    }

    #[tokio::test]
    async fn test_missing_parents() {
        let (_pool, service) = setup_test_service().await;
        assert!(matches!(
            service.create_unit(404, unit_input("U")).await,
            Err(CourseServiceError::NotFound("Course"))
        ));
        assert!(matches!(
            service.create_lesson(404, lesson_input("L")).await,
            Err(CourseServiceError::NotFound("Unit"))
        ));
        assert!(matches!(
            service.complete_lesson(1, 404).await,
            Err(CourseServiceError::NotFound("Lesson"))
        ));
    }
}

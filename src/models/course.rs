//! Course catalog models: courses, units, lessons and enrollments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course made of ordered units
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Course {
    pub id: i64,
    /// URL-friendly slug (unique)
    pub slug: String,
    pub title: String,
    /// Title in the secondary (English) locale
    pub title_en: Option<String>,
    pub description: String,
    pub cover_image: Option<String>,
    /// Unpublished courses are hidden from the public catalog
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Course {
    /// Title for the requested locale, falling back to the default title
    pub fn localized_title(&self, lang: Option<&str>) -> &str {
        match (lang, self.title_en.as_deref()) {
            (Some("en"), Some(title_en)) if !title_en.trim().is_empty() => title_en,
            _ => &self.title,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Unit {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lesson {
    pub id: i64,
    pub unit_id: i64,
    pub title: String,
    /// Markdown content
    pub content: String,
    pub content_html: String,
    pub video_url: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Link between a user and a course carrying progress
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    /// Percentage of lessons completed, 0..=100
    pub progress: i32,
    /// Set once, when progress first reaches 100
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where an enrollment stands. Completion alone does not make a
/// certificate available; quizzes must be passed as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentState {
    NotEnrolled,
    InProgress,
    Completed,
}

impl EnrollmentState {
    pub fn of(enrollment: Option<&Enrollment>) -> Self {
        match enrollment {
            None => Self::NotEnrolled,
            Some(e) if e.is_completed() => Self::Completed,
            Some(_) => Self::InProgress,
        }
    }
}

impl Enrollment {
    pub fn is_completed(&self) -> bool {
        self.progress >= 100
    }
}

/// Progress percentage for `completed` out of `total` lessons.
///
/// Only a fully completed course reaches 100; rounding stops at 99.
pub fn progress_percent(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    if completed >= total {
        return 100;
    }
    let completed = completed.max(0);
    ((completed * 100 + total / 2) / total).min(99) as i32
}

/// Enrollment joined with its course, for the learner dashboard
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EnrollmentSummary {
    pub course_id: i64,
    pub slug: String,
    pub title: String,
    pub progress: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourseInput {
    #[serde(default)]
    pub slug: Option<String>,
    pub title: String,
    #[serde(default)]
    pub title_en: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourseInput {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub title_en: Option<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitInput {
    pub title: String,
    #[serde(default)]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUnitInput {
    pub title: Option<String>,
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLessonInput {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub position: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateLessonInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub video_url: Option<String>,
    pub position: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment(progress: i32) -> Enrollment {
        let now = Utc::now();
        Enrollment {
            id: 1,
            user_id: 1,
            course_id: 1,
            progress,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0), 0);
        assert_eq!(progress_percent(0, 4), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(5, 3), 100);
    }

    #[test]
    fn test_progress_below_100_until_every_lesson_is_done() {
        assert_eq!(progress_percent(199, 200), 99);
        assert_eq!(progress_percent(999, 1000), 99);
        assert_eq!(progress_percent(200, 200), 100);
    }

    #[test]
    fn test_enrollment_state() {
        assert_eq!(EnrollmentState::of(None), EnrollmentState::NotEnrolled);
        assert_eq!(EnrollmentState::of(Some(&enrollment(0))), EnrollmentState::InProgress);
        assert_eq!(EnrollmentState::of(Some(&enrollment(99))), EnrollmentState::InProgress);
        assert_eq!(EnrollmentState::of(Some(&enrollment(100))), EnrollmentState::Completed);
    }

    #[test]
    fn test_localized_title() {
        let now = Utc::now();
        let mut course = Course {
            id: 1,
            slug: "rust".into(),
            title: "مقدمة".into(),
            title_en: None,
            description: String::new(),
            cover_image: None,
            is_published: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(course.localized_title(Some("en")), "مقدمة");
        course.title_en = Some("Introduction".into());
        assert_eq!(course.localized_title(Some("en")), "Introduction");
        assert_eq!(course.localized_title(Some("ar")), "مقدمة");
    }
}

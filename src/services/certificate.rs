//! Certificate eligibility
//!
//! Completing a course and earning its certificate are different things:
//! a certificate also needs a passing attempt on every quiz attached to
//! the course's units.

use crate::db::repositories::{CourseRepository, EnrollmentRepository, QuizRepository, UserRepository};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    /// The session names a user that no longer exists
    #[error("User not found")]
    UserNotFound,

    #[error("Course not found")]
    NotFound,

    #[error("You have not completed this course yet")]
    NotCompleted,

    #[error("You must pass all quizzes of this course ({passed} of {total} passed)")]
    QuizzesNotPassed { passed: i64, total: i64 },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// What a certificate shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Certificate {
    pub user_id: i64,
    pub student_name: String,
    pub course_slug: String,
    pub course_title: String,
    pub completed_at: DateTime<Utc>,
}

pub struct CertificateService {
    users: Arc<dyn UserRepository>,
    courses: Arc<dyn CourseRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    quizzes: Arc<dyn QuizRepository>,
}

impl CertificateService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        courses: Arc<dyn CourseRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        quizzes: Arc<dyn QuizRepository>,
    ) -> Self {
        Self {
            users,
            courses,
            enrollments,
            quizzes,
        }
    }

    /// Check whether the user may receive the course's certificate.
    ///
    /// `lang` selects the localized student name and course title; the
    /// default fields are used when the localized ones are empty.
    pub async fn check_eligible(
        &self,
        user_id: i64,
        course_slug: &str,
        lang: Option<&str>,
    ) -> Result<Certificate, CertificateError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(CertificateError::UserNotFound)?;

        let course = self
            .courses
            .get_by_slug(course_slug)
            .await?
            .ok_or(CertificateError::NotFound)?;

        let enrollment = self
            .enrollments
            .get(user_id, course.id)
            .await?
            .filter(|e| e.is_completed())
            .ok_or(CertificateError::NotCompleted)?;

        let total = self.quizzes.list_for_course(course.id).await?.len() as i64;
        let passed = self.quizzes.count_passed_quizzes(user_id, course.id).await?;
        if passed < total {
            return Err(CertificateError::QuizzesNotPassed { passed, total });
        }

        Ok(Certificate {
            user_id,
            student_name: user.localized_name(lang).to_string(),
            course_slug: course.slug.clone(),
            course_title: course.localized_title(lang).to_string(),
            completed_at: enrollment.completed_at.unwrap_or_else(Utc::now),
        })
    }
}

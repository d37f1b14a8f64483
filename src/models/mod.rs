//! Data models
//!
//! This module contains the data structures used throughout Cohort:
//! - Database entities (User, Post, Event, Course, Quiz, Gallery, PaymentMethod)
//! - The transient Session carried in the session cookie
//! - API request inputs and paging helpers

mod course;
mod event;
mod gallery;
mod pagination;
mod payment_method;
mod post;
mod quiz;
mod session;
mod user;

pub use course::{
    progress_percent, Course, CreateCourseInput, CreateLessonInput, Enrollment, EnrollmentState,
    EnrollmentSummary, Lesson, Unit, UnitInput, UpdateCourseInput, UpdateLessonInput, UpdateUnitInput,
};
pub use event::{Attendee, CreateEventInput, Event, EventWithRsvps, Rsvp, UpdateEventInput};
pub use gallery::{AddPhotoInput, CreateGalleryInput, Gallery, Photo, UpdateGalleryInput};
pub use pagination::{ListParams, PagedResult};
pub use payment_method::{CreatePaymentMethodInput, PaymentMethod, UpdatePaymentMethodInput};
pub use post::{CreatePostInput, Post, UpdatePostInput};
pub use quiz::{
    CreateQuestionInput, CreateQuizInput, PublicQuestion, Question, QuestionOptions, Quiz, QuizAttempt,
    SubmitAttemptInput, UpdateQuestionInput, UpdateQuizInput, DEFAULT_PASS_SCORE,
};
pub use session::Session;
pub use user::{CreateUserInput, ParseRoleError, Role, UpdateProfileInput, User};

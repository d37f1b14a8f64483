//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles CRUD operations for a specific entity.

pub mod course;
pub mod enrollment;
pub mod event;
pub mod gallery;
pub mod payment_method;
pub mod post;
pub mod quiz;
pub mod user;

pub use course::{CourseRepository, SqlxCourseRepository};
pub use enrollment::{EnrollmentRepository, SqlxEnrollmentRepository};
pub use event::{EventRepository, SqlxEventRepository};
pub use gallery::{GalleryRepository, SqlxGalleryRepository};
pub use payment_method::{PaymentMethodRepository, SqlxPaymentMethodRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use quiz::{QuizRepository, SqlxQuizRepository};
pub use user::{SqlxUserRepository, UserRepository};

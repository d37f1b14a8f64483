//! Services layer - Business logic
//!
//! Services validate input, apply the domain rules and coordinate
//! repositories and the cache. They return `thiserror` enums that the API
//! layer maps onto HTTP responses.

pub mod certificate;
pub mod course;
pub mod event;
pub mod markdown;
pub mod password;
pub mod post;
pub mod quiz;
pub mod rate_limiter;
pub mod session;
pub mod slug;
pub mod user;

pub use certificate::{Certificate, CertificateError, CertificateService};
pub use course::{CourseOutline, CourseService, CourseServiceError};
pub use event::{EventService, EventServiceError, RsvpError};
pub use markdown::MarkdownRenderer;
pub use password::{hash_password, verify_password};
pub use post::{PostService, PostServiceError};
pub use quiz::{QuizService, QuizServiceError};
pub use rate_limiter::LoginRateLimiter;
pub use session::{codec_from_secret, SessionCodec};
pub use slug::generate_slug;
pub use user::{LoginInput, UserService, UserServiceError, UserSummary};

//! Business logic services for the safety training LMS

pub mod assessment;
pub mod auth;
pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod gamification;
pub mod learning_path;
pub mod notification;
pub mod reporting;
pub mod sync;
pub mod user;

pub use assessment::AssessmentService;
pub use auth::AuthService;
pub use certificate::CertificateService;
pub use course::CourseService;
pub use enrollment::EnrollmentService;
pub use gamification::GamificationService;
pub use learning_path::LearningPathService;
pub use notification::NotificationService;
pub use reporting::ReportingService;
pub use sync::SyncService;
pub use user::UserService;

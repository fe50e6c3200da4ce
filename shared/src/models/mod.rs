//! Domain models for the safety training LMS

mod assessment;
mod certificate;
mod course;
mod enrollment;
mod gamification;
mod learning_path;
mod notification;
mod sync;
mod user;

pub use assessment::*;
pub use certificate::*;
pub use course::*;
pub use enrollment::*;
pub use gamification::*;
pub use learning_path::*;
pub use notification::*;
pub use sync::*;
pub use user::*;

//! HTTP handlers, one module per API area

pub mod assessment;
pub mod auth;
pub mod certificate;
pub mod course;
pub mod enrollment;
pub mod gamification;
pub mod health;
pub mod learning_path;
pub mod notification;
pub mod reporting;
pub mod sync;
pub mod user;

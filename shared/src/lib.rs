//! Shared types and domain rules for the safety training LMS
//!
//! This crate contains types shared between the backend, the offline client
//! (via WASM), and other components of the system.

pub mod models;
pub mod template;
pub mod types;
pub mod validation;

pub use models::*;
pub use template::*;
pub use types::*;
pub use validation::*;

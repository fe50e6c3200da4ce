//! External API integrations

pub mod messaging;

pub use messaging::MessagingClient;

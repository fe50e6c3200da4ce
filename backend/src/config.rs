//! Configuration management for the safety training LMS
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with LMS_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Certificate issuance and verification
    pub certificates: CertificateConfig,

    /// Notification delivery
    pub notifications: NotificationConfig,

    /// Background jobs
    pub jobs: JobsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,

    /// Refresh token expiration in seconds
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CertificateConfig {
    /// Public site URL used to build verification links
    pub site_url: String,

    /// HMAC key for signed verification links
    pub signing_secret: String,

    /// Validity applied when a course does not define one
    pub default_validity_months: i32,

    /// Window for "expiring soon" listings and reminders
    pub expiry_warning_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Delivery gateway endpoint for email, push and SMS
    pub gateway_url: String,

    /// Delivery gateway API key
    pub gateway_api_key: String,

    /// Retries before a failed notification is abandoned
    pub max_retries: i32,

    /// Read notifications older than this are purged
    pub retention_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobsConfig {
    /// Whether background jobs run in this process
    pub enabled: bool,

    /// Interval of the certificate expiry sweep
    pub certificate_sweep_secs: u64,

    /// Interval of the overdue assignment sweep
    pub overdue_sweep_secs: u64,

    /// Interval of the notification dispatcher
    pub notification_dispatch_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("LMS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("jwt.access_token_expiry", 3600)?
            .set_default("jwt.refresh_token_expiry", 604800)?
            .set_default("certificates.site_url", "http://localhost:3000")?
            .set_default("certificates.default_validity_months", 12)?
            .set_default("certificates.expiry_warning_days", 30)?
            .set_default("notifications.gateway_url", "")?
            .set_default("notifications.gateway_api_key", "")?
            .set_default("notifications.max_retries", 3)?
            .set_default("notifications.retention_days", 90)?
            .set_default("jobs.enabled", true)?
            .set_default("jobs.certificate_sweep_secs", 3600)?
            .set_default("jobs.overdue_sweep_secs", 3600)?
            .set_default("jobs.notification_dispatch_secs", 60)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (LMS_ prefix)
            .add_source(
                Environment::with_prefix("LMS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

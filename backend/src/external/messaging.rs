//! Messaging gateway client for email, push and SMS delivery
//!
//! The gateway accepts one JSON message per request and answers with its own
//! message id. In-app notifications never go through it.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::models::NotificationChannel;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Messaging gateway client
#[derive(Clone)]
pub struct MessagingClient {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Outbound message
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub notification_id: Uuid,
    pub channel: NotificationChannel,
    /// Email address, phone number or push token
    pub recipient: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

/// Gateway acknowledgement
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl MessagingClient {
    /// Create a new MessagingClient
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build a client from configuration, `None` when no gateway is configured
    pub fn from_config(config: &crate::config::NotificationConfig) -> Option<Self> {
        if config.gateway_url.trim().is_empty() {
            return None;
        }
        Some(Self::new(
            config.gateway_api_key.clone(),
            config.gateway_url.clone(),
        ))
    }

    /// Deliver one message
    pub async fn send(&self, message: &OutboundMessage) -> AppResult<DeliveryReceipt> {
        if message.channel == NotificationChannel::InApp {
            return Err(AppError::Internal(
                "In-app notifications are not delivered through the gateway".to_string(),
            ));
        }

        let url = format!("{}/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Gateway request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "Gateway error: {} - {}",
                status, body
            )));
        }

        response
            .json::<DeliveryReceipt>()
            .await
            .map_err(|e| AppError::ExternalService(format!("Failed to parse gateway response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationConfig;

    fn config(url: &str) -> NotificationConfig {
        NotificationConfig {
            gateway_url: url.to_string(),
            gateway_api_key: "key".to_string(),
            max_retries: 3,
            retention_days: 90,
        }
    }

    #[test]
    fn test_from_config_requires_url() {
        assert!(MessagingClient::from_config(&config("")).is_none());
        let client = MessagingClient::from_config(&config("https://gateway.local/")).unwrap();
        assert_eq!(client.base_url, "https://gateway.local");
    }

    #[test]
    fn test_message_serialization() {
        let message = OutboundMessage {
            notification_id: Uuid::nil(),
            channel: NotificationChannel::Email,
            recipient: "ana@example.com".to_string(),
            subject: "Hola".to_string(),
            body: "Cuerpo".to_string(),
            action_url: None,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["channel"], "email");
        assert!(json.get("action_url").is_none());
    }
}

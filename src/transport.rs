//! Outbound message transport (Evolution API) and admin notifications.

use crate::config::TransportConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound text delivery capability.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a text message. Returns whether the gateway accepted it.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<bool, TransportError>;
}

/// Transport speaking the Evolution API `sendText` endpoint.
pub struct EvolutionTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    instance: String,
}

impl EvolutionTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            instance: config.instance.clone(),
        })
    }
}

#[async_trait]
impl Transport for EvolutionTransport {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<bool, TransportError> {
        let url = format!("{}/message/sendText/{}", self.base_url, self.instance);
        let body = serde_json::json!({
            "number": recipient,
            "text": text,
        });

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Http(error)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(recipient = %recipient, status = %status, "gateway rejected outbound message");
            return Err(TransportError::Gateway {
                status: status.as_u16(),
            });
        }

        tracing::debug!(recipient = %recipient, chars = text.chars().count(), "outbound message sent");
        Ok(true)
    }
}

/// Best-effort out-of-band notifications to the administrator.
///
/// Sends are spawned and self-swallowing so a notification can never affect
/// the cycle that triggered it.
#[derive(Clone)]
pub struct AdminNotifier {
    transport: Arc<dyn Transport>,
    admin: String,
}

impl AdminNotifier {
    pub fn new(transport: Arc<dyn Transport>, admin: impl Into<String>) -> Self {
        Self {
            transport,
            admin: admin.into(),
        }
    }

    /// Fire-and-forget a message to the admin channel.
    pub fn notify(&self, message: String) {
        let transport = self.transport.clone();
        let admin = self.admin.clone();
        tokio::spawn(async move {
            if let Err(error) = transport.send_text(&admin, &message).await {
                tracing::warn!(%error, "failed to notify admin");
            }
        });
    }
}

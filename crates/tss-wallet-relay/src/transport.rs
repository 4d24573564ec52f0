//! Transport seam between the poller and the mediator.
//!
//! The mediator API is two endpoints: `GET /message/{session}/{party}`
//! returning a JSON array (404 when the inbox is empty) and
//! `DELETE /message/{session}/{party}/{hash}` as a best-effort
//! acknowledgment. The [`RelayTransport`] trait keeps the poller testable
//! against scripted in-memory transports.

use crate::{RelayError, RelayMessage, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Message transport consumed by the poller
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Fetch pending messages for `local_party_id`. An empty inbox (the
    /// mediator's 404) returns an empty batch, not an error.
    async fn fetch_messages(
        &self,
        session_id: &str,
        local_party_id: &str,
        message_id: Option<&str>,
    ) -> Result<Vec<RelayMessage>>;

    /// Acknowledge one applied message. Failure only wastes mediator
    /// storage, so callers treat this as best-effort.
    async fn delete_message(
        &self,
        session_id: &str,
        local_party_id: &str,
        hash: &str,
    ) -> Result<()>;
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct RelayTransportConfig {
    /// Mediator base URL
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl RelayTransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: 30,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Transport over the mediator's HTTP API
pub struct HttpRelayTransport {
    config: RelayTransportConfig,
    client: Client,
}

impl HttpRelayTransport {
    pub fn new(config: RelayTransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Internal(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    fn inbox_url(&self, session_id: &str, local_party_id: &str) -> String {
        format!(
            "{}/message/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            session_id,
            local_party_id
        )
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn fetch_messages(
        &self,
        session_id: &str,
        local_party_id: &str,
        message_id: Option<&str>,
    ) -> Result<Vec<RelayMessage>> {
        let mut request = self.client.get(self.inbox_url(session_id, local_party_id));
        if let Some(id) = message_id {
            request = request.header("message_id", id);
        }
        let response = request.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                // empty inbox, expected between rounds
                Ok(Vec::new())
            }
            status if status.is_success() => {
                let messages: Vec<RelayMessage> = response
                    .json()
                    .await
                    .map_err(|e| RelayError::InvalidMessageFormat(e.to_string()))?;
                debug!(count = messages.len(), session_id, "fetched relay messages");
                Ok(messages)
            }
            status => Err(RelayError::Transport(format!(
                "GET inbox returned {status}"
            ))),
        }
    }

    async fn delete_message(
        &self,
        session_id: &str,
        local_party_id: &str,
        hash: &str,
    ) -> Result<()> {
        let url = format!("{}/{}", self.inbox_url(session_id, local_party_id), hash);
        let response = self.client.delete(url).send().await?;
        // a 404 here means another poll already deleted it
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(RelayError::Transport(format!(
                "DELETE returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_url_strips_trailing_slash() {
        let transport =
            HttpRelayTransport::new(RelayTransportConfig::new("https://relay.example.com/"))
                .unwrap();
        assert_eq!(
            transport.inbox_url("sess", "party"),
            "https://relay.example.com/message/sess/party"
        );
    }

    #[test]
    fn test_config_builder() {
        let config = RelayTransportConfig::new("http://localhost:8080").with_timeout(5);
        assert_eq!(config.timeout_secs, 5);
    }
}

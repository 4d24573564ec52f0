//! Signing session lifecycle.
//!
//! A [`SigningSession`] ties together the pieces one keysign needs: the
//! mediator transport, the session's message codec and the background
//! poller. It owns the poller handle, so dropping the session cancels
//! polling.

use crate::poller::{MessageRelayPoller, PollerConfig, SigningEngine};
use crate::transport::{HttpRelayTransport, RelayTransport, RelayTransportConfig};
use crate::{MessageCrypto, RelayError, Result};
use std::sync::Arc;
use tracing::info;
use tss_wallet_core::compiler::CompilerRegistry;
use tss_wallet_core::{SignatureShares, SigningPayload};

/// Everything needed to join a relay session
#[derive(Debug, Clone)]
pub struct SigningSessionConfig {
    pub session_id: String,
    pub local_party_id: String,
    pub mediator_url: String,
    /// Hex-encoded shared session key
    pub encryption_key_hex: String,
    /// Keysign message id, when the coordinator assigned one
    pub message_id: Option<String>,
}

impl SigningSessionConfig {
    pub fn new(
        session_id: impl Into<String>,
        local_party_id: impl Into<String>,
        mediator_url: impl Into<String>,
        encryption_key_hex: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            local_party_id: local_party_id.into(),
            mediator_url: mediator_url.into(),
            encryption_key_hex: encryption_key_hex.into(),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// One device's view of a signing session
pub struct SigningSession {
    config: SigningSessionConfig,
    crypto: MessageCrypto,
    registry: CompilerRegistry,
    poller: Option<MessageRelayPoller>,
}

impl SigningSession {
    /// Validate the session key and set up an idle session
    pub fn new(config: SigningSessionConfig) -> Result<Self> {
        let crypto = MessageCrypto::from_hex_key(&config.encryption_key_hex)?;
        Ok(Self {
            config,
            crypto,
            registry: CompilerRegistry::standard(),
            poller: None,
        })
    }

    /// Encrypt an outbound message body for peers in this session
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.crypto.encrypt(plaintext)
    }

    /// Start polling the mediator, feeding inbound messages to `engine`
    pub fn start(&mut self, engine: Arc<dyn SigningEngine>) -> Result<()> {
        let transport =
            HttpRelayTransport::new(RelayTransportConfig::new(self.config.mediator_url.clone()))?;
        self.start_with_transport(Arc::new(transport), engine)
    }

    /// Start polling over a caller-supplied transport.
    ///
    /// Calling on a running session restarts it: the existing poller is
    /// cancelled and replaced.
    pub fn start_with_transport(
        &mut self,
        transport: Arc<dyn RelayTransport>,
        engine: Arc<dyn SigningEngine>,
    ) -> Result<()> {
        if let Some(existing) = self.poller.take() {
            info!(session_id = %self.config.session_id, "restarting signing session");
            existing.stop();
        }
        let mut poller_config =
            PollerConfig::new(&self.config.session_id, &self.config.local_party_id);
        if let Some(id) = &self.config.message_id {
            poller_config = poller_config.with_message_id(id);
        }
        info!(session_id = %self.config.session_id, "starting signing session");
        self.poller = Some(MessageRelayPoller::start(
            poller_config,
            transport,
            self.crypto.clone(),
            engine,
        ));
        Ok(())
    }

    /// Request cancellation of the poll loop. Safe to call at any time.
    pub fn stop(&self) {
        if let Some(poller) = &self.poller {
            poller.stop();
        }
    }

    /// Wait until the engine reports completion. Returns `false` if the
    /// poller exits first or the session was never started. The caller
    /// decides when to [`stop`](Self::stop); completion alone does not end
    /// polling.
    pub async fn engine_complete(&self) -> bool {
        match &self.poller {
            Some(poller) => poller.engine_complete().await,
            None => false,
        }
    }

    /// Wait for the poll loop to finish and surface its outcome
    pub async fn wait(&mut self) -> Result<()> {
        match self.poller.take() {
            Some(poller) => poller.join().await,
            None => Err(RelayError::InvalidSessionState(
                "session not started".to_string(),
            )),
        }
    }

    /// Compile a signed transaction once the engine has produced shares
    pub fn compile_transaction(
        &self,
        payload: &SigningPayload,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        Ok(self.registry.compile(payload, shares, public_key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    #[test]
    fn test_bad_session_key_rejected() {
        let config = SigningSessionConfig::new("s", "p", "http://localhost", "not-hex");
        assert!(matches!(
            SigningSession::new(config),
            Err(RelayError::Decryption(_))
        ));
    }

    #[test]
    fn test_stop_before_start_is_harmless() {
        let config = SigningSessionConfig::new("s", "p", "http://localhost", KEY_HEX);
        let session = SigningSession::new(config).unwrap();
        session.stop();
        session.stop();
    }

    #[tokio::test]
    async fn test_wait_before_start_errors() {
        let config = SigningSessionConfig::new("s", "p", "http://localhost", KEY_HEX);
        let mut session = SigningSession::new(config).unwrap();
        assert!(matches!(
            session.wait().await,
            Err(RelayError::InvalidSessionState(_))
        ));
    }
}

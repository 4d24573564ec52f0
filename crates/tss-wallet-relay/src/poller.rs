//! Background polling loop that drains the mediator inbox into the engine.
//!
//! The poller runs on a fixed one-second cadence. Each tick it fetches the
//! pending batch, orders it by `sequence_no`, drops anything already applied,
//! decrypts each body and feeds the plaintext to the [`SigningEngine`].
//! Acknowledgment deletes are fired off without waiting for them.
//!
//! Per-message problems (undecryptable body, malformed base64) and transport
//! hiccups are logged and skipped; the next tick retries naturally. The one
//! fatal condition is the engine rejecting a message it was given, which
//! means the session state has diverged and polling further is pointless.
//!
//! Engine completion does not end the loop: peers may still be mid-round and
//! their messages keep draining until the orchestrator calls
//! [`MessageRelayPoller::stop`]. Completion is surfaced through
//! [`MessageRelayPoller::engine_complete`] instead.

use crate::message::{dedup_key, DedupCache};
use crate::transport::RelayTransport;
use crate::{MessageCrypto, RelayError, Result};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Poll cadence
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Consumer of decrypted relay message bodies.
///
/// Implemented by the threshold engine binding. Returns `Ok(true)` once the
/// engine has everything it needs; the poller reports this through
/// [`MessageRelayPoller::engine_complete`] and keeps draining the inbox.
pub trait SigningEngine: Send + Sync {
    fn apply_message(&self, body: &[u8]) -> Result<bool>;
}

/// Identity of the inbox being polled
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub session_id: String,
    pub local_party_id: String,
    /// Keysign message id, mixed into the request header and dedup key
    pub message_id: Option<String>,
}

impl PollerConfig {
    pub fn new(session_id: impl Into<String>, local_party_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            local_party_id: local_party_id.into(),
            message_id: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// Handle to a running poll loop.
///
/// `stop` may be called from any task, any number of times. After the first
/// call the loop finishes its current await point, applies nothing further
/// and exits.
pub struct MessageRelayPoller {
    cancel: watch::Sender<bool>,
    done: watch::Receiver<bool>,
    handle: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl MessageRelayPoller {
    /// Spawn the loop on the current tokio runtime
    pub fn start(
        config: PollerConfig,
        transport: Arc<dyn RelayTransport>,
        crypto: MessageCrypto,
        engine: Arc<dyn SigningEngine>,
    ) -> Self {
        let (cancel, cancel_rx) = watch::channel(false);
        let (done_tx, done) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(
            config, transport, crypto, engine, cancel_rx, done_tx,
        ));
        Self {
            cancel,
            done,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Request cancellation. Idempotent; never blocks.
    pub fn stop(&self) {
        // send only fails when the loop already exited, which is fine
        let _ = self.cancel.send(true);
    }

    /// Whether the engine has reported completion
    pub fn is_complete(&self) -> bool {
        *self.done.borrow()
    }

    /// Wait until the engine reports completion. Returns `false` if the loop
    /// exits first (cancellation or a fatal apply failure).
    pub async fn engine_complete(&self) -> bool {
        let mut done = self.done.clone();
        loop {
            if *done.borrow() {
                return true;
            }
            if done.changed().await.is_err() {
                return *done.borrow();
            }
        }
    }

    /// Wait for the loop to exit and return its outcome.
    ///
    /// `Ok(())` means a clean stop after cancellation; `Err` carries the
    /// fatal engine failure that ended the session.
    pub async fn join(&self) -> Result<()> {
        let handle = self
            .handle
            .lock()
            .map_err(|_| RelayError::Internal("poller handle lock poisoned".to_string()))?
            .take();
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| RelayError::Internal(format!("poll task panicked: {e}")))?,
            None => Err(RelayError::InvalidSessionState(
                "poller already joined".to_string(),
            )),
        }
    }
}

impl Drop for MessageRelayPoller {
    fn drop(&mut self) {
        let _ = self.cancel.send(true);
    }
}

async fn poll_loop(
    config: PollerConfig,
    transport: Arc<dyn RelayTransport>,
    crypto: MessageCrypto,
    engine: Arc<dyn SigningEngine>,
    mut cancel: watch::Receiver<bool>,
    done: watch::Sender<bool>,
) -> Result<()> {
    let mut cache = DedupCache::default();
    info!(
        session_id = %config.session_id,
        party_id = %config.local_party_id,
        "relay poller started"
    );

    loop {
        if *cancel.borrow() {
            break;
        }

        let batch = tokio::select! {
            _ = cancel.changed() => break,
            result = transport.fetch_messages(
                &config.session_id,
                &config.local_party_id,
                config.message_id.as_deref(),
            ) => match result {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, "fetch failed, will retry next tick");
                    Vec::new()
                }
            },
        };

        // results that raced with cancellation are discarded
        if *cancel.borrow() {
            break;
        }

        let mut batch = batch;
        batch.sort_by_key(|m| m.sequence_no);

        for message in batch {
            if *cancel.borrow() {
                return Ok(());
            }
            if !message
                .to
                .iter()
                .any(|to| to == &config.local_party_id)
            {
                continue;
            }

            let key = dedup_key(
                &config.session_id,
                &config.local_party_id,
                config.message_id.as_deref(),
                &message.hash,
            );
            if cache.contains(&key) {
                debug!(hash = %message.hash, "duplicate message skipped");
                continue;
            }

            let sealed = match BASE64_STANDARD.decode(&message.body) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(hash = %message.hash, error = %e, "body is not valid base64, dropped");
                    continue;
                }
            };
            let plaintext = match crypto.decrypt(&sealed) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(hash = %message.hash, error = %e, "undecryptable message dropped");
                    continue;
                }
            };

            let round_complete = match engine.apply_message(&plaintext) {
                Ok(complete) => complete,
                Err(e) => {
                    // session state has diverged, nothing left to poll for
                    warn!(hash = %message.hash, error = %e, "engine rejected message");
                    return Err(RelayError::EngineApply(e.to_string()));
                }
            };
            cache.insert(key);
            debug!(from = %message.from, seq = message.sequence_no, "message applied");

            // fire-and-forget acknowledgment
            let transport = Arc::clone(&transport);
            let session_id = config.session_id.clone();
            let party_id = config.local_party_id.clone();
            let hash = message.hash.clone();
            tokio::spawn(async move {
                if let Err(e) = transport.delete_message(&session_id, &party_id, &hash).await {
                    debug!(hash = %hash, error = %e, "acknowledgment delete failed");
                }
            });

            // completion does not end the loop: peers may still be draining
            // later rounds, so polling continues until the orchestrator stops
            if round_complete && !*done.borrow() {
                info!(session_id = %config.session_id, "engine reported completion");
                let _ = done.send(true);
            }
        }

        tokio::select! {
            _ = cancel.changed() => break,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }

    info!(session_id = %config.session_id, "relay poller stopped");
    Ok(())
}

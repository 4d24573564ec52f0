//! # TSS Wallet Relay
//!
//! Encrypted message transport for multi-device threshold signing. Devices
//! never talk to each other directly: a mediator server stores ciphertext
//! messages per recipient, and each device polls its own inbox.
//!
//! ## Components
//!
//! - [`RelayTransport`] / [`HttpRelayTransport`]: the mediator's two-endpoint
//!   HTTP API behind a trait
//! - [`MessageCrypto`]: AES-256-GCM sealing of message bodies under the
//!   session key
//! - [`MessageRelayPoller`]: one-second poll loop with ordering, dedup and
//!   fire-and-forget acknowledgment
//! - [`SigningSession`]: owns the poller and wires the pieces together for
//!   one keysign
//!
//! ## Example
//!
//! ```rust,ignore
//! use tss_wallet_relay::{SigningSession, SigningSessionConfig};
//!
//! let config = SigningSessionConfig::new(session_id, party_id, mediator_url, key_hex);
//! let mut session = SigningSession::new(config)?;
//! session.start(engine)?;
//! session.wait().await?;
//! ```

pub mod crypto;
pub mod error;
pub mod message;
pub mod poller;
pub mod session;
pub mod transport;

pub use crypto::MessageCrypto;
pub use error::{RelayError, Result};
pub use message::{dedup_key, DedupCache, RelayMessage};
pub use poller::{MessageRelayPoller, PollerConfig, SigningEngine};
pub use session::{SigningSession, SigningSessionConfig};
pub use transport::{HttpRelayTransport, RelayTransport, RelayTransportConfig};

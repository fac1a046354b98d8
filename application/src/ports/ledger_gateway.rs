//! Ledger gateway port
//!
//! Defines the interface to the network's ordering service: fetching the
//! latest configuration block and submitting signed update envelopes.

use async_trait::async_trait;
use reconfig_domain::{ChannelId, SignatureSet, UpdateEnvelope};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to the ordering service
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The network cannot be reached; transient, retry with backoff.
    #[error("ordering service unavailable: {0}")]
    Unavailable(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelId),

    /// The update was refused (policy violation, stale base sequence).
    #[error("update rejected by the ordering service: {0}")]
    Rejected(String),

    /// The commit was not observed before the deadline. Ambiguous: the
    /// update may or may not have landed.
    #[error("commit not observed within {}s", .0.as_secs())]
    CommitTimeout(Duration),
}

/// Raw configuration block bytes as returned by the network.
///
/// Opaque to the application layer; only the [`ConfigCodec`]
/// (`super::config_codec::ConfigCodec`) knows how to interpret them.
#[derive(Debug, Clone)]
pub struct ConfigBlob(Vec<u8>);

impl ConfigBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Handle correlating a submitted update with its expected commit.
#[derive(Debug, Clone)]
pub struct CommitHandle {
    pub channel: ChannelId,
    /// Sequence number the channel configuration will carry once the update
    /// commits.
    pub expected_sequence: u64,
}

/// Gateway to the ledger network's ordering service.
///
/// This port defines how the application layer reaches the network.
/// Implementations (adapters) live in the infrastructure layer. All calls
/// are potentially blocking network operations; the caller bounds each with
/// a timeout.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Fetch the latest configuration block for a channel.
    async fn fetch_config(&self, channel: &ChannelId) -> Result<ConfigBlob, GatewayError>;

    /// Submit a signed update envelope to the ordering service.
    async fn submit(
        &self,
        envelope: &UpdateEnvelope,
        signatures: &SignatureSet,
    ) -> Result<CommitHandle, GatewayError>;

    /// Wait until the submitted update commits, returning the new
    /// configuration sequence number.
    async fn await_commit(
        &self,
        handle: &CommitHandle,
        timeout: Duration,
    ) -> Result<u64, GatewayError>;
}

//! Configuration codec port
//!
//! The network's block and config-transaction formats are binary; this port
//! wraps the external transcoder that converts them to and from the
//! structured document form the engine works with.

use crate::ports::ledger_gateway::ConfigBlob;
use async_trait::async_trait;
use reconfig_domain::{ChannelId, ConfigDelta, ConfigSnapshot};
use thiserror::Error;

/// Errors raised by the configuration transcoder
#[derive(Error, Debug)]
pub enum CodecError {
    /// The block bytes could not be interpreted. Fatal for the session: the
    /// block would have to be re-fetched.
    #[error("malformed configuration block: {0}")]
    MalformedBlock(String),

    #[error("missing field in configuration document: {0}")]
    MissingField(String),

    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Transcoder between the network's config representation and structured
/// snapshots.
#[async_trait]
pub trait ConfigCodec: Send + Sync {
    /// Decode a fetched configuration block into a snapshot.
    async fn decode(&self, blob: &ConfigBlob) -> Result<ConfigSnapshot, CodecError>;

    /// Encode a snapshot back into the network's document form.
    async fn encode(&self, snapshot: &ConfigSnapshot) -> Result<Vec<u8>, CodecError>;

    /// Encode a membership delta as config-update payload bytes, the bytes
    /// organizations endorse and the ordering service validates.
    async fn encode_update(
        &self,
        channel: &ChannelId,
        delta: &ConfigDelta,
    ) -> Result<Vec<u8>, CodecError>;
}

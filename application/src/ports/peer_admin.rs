//! Peer administration port
//!
//! The boundary the membership synchronizer drives after a commit: catching
//! a joining organization's peer up with the channel's block history, or
//! tearing down a departing organization's channel-local state.

use async_trait::async_trait;
use reconfig_domain::{ChannelId, OrgId};
use thiserror::Error;

/// Synchronization-boundary failures. Never roll back the committed
/// membership change; retryable independently.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("block history pull failed: {0}")]
    HistoryPull(String),

    #[error("peer activation failed: {0}")]
    Activation(String),

    #[error("decommission failed: {0}")]
    Decommission(String),
}

/// Administrative control over an organization's peer infrastructure.
#[async_trait]
pub trait PeerAdministration: Send + Sync {
    /// Pull and apply the channel's block history for the organization's
    /// peer, starting from genesis or a snapshot checkpoint. Idempotent:
    /// re-pulling history that is already applied is a no-op per block.
    /// Returns the number of blocks applied by this call.
    async fn pull_history(&self, channel: &ChannelId, org: &OrgId) -> Result<u64, SyncError>;

    /// Mark the caught-up peer an active channel member.
    async fn activate(&self, channel: &ChannelId, org: &OrgId) -> Result<(), SyncError>;

    /// Tear down the departing organization's channel-local state and
    /// infrastructure.
    async fn decommission(&self, channel: &ChannelId, org: &OrgId) -> Result<(), SyncError>;
}

//! Membership synchronization use case
//!
//! Runs after a membership change has committed: a joining organization's
//! peer replays the channel's block history and becomes active, a departing
//! organization's channel-local state is torn down. The commit is already
//! durable on-chain, so failures here never roll anything back; the caller
//! retries synchronization alone.

use crate::ports::peer_admin::{PeerAdministration, SyncError};
use reconfig_domain::{ChannelId, OpKind, OrgId};
use std::sync::Arc;
use tracing::info;

/// Use case for synchronizing a peer with a committed membership change
pub struct MembershipSynchronizer<P: PeerAdministration + 'static> {
    peers: Arc<P>,
}

impl<P: PeerAdministration + 'static> MembershipSynchronizer<P> {
    pub fn new(peers: Arc<P>) -> Self {
        Self { peers }
    }

    /// Drive the joining (or departing) peer to its post-commit state.
    ///
    /// Idempotent: re-running after a partial failure re-pulls history that
    /// is already applied as a no-op and re-issues the activation or
    /// teardown.
    pub async fn run(
        &self,
        channel: &ChannelId,
        org: &OrgId,
        kind: OpKind,
    ) -> Result<(), SyncError> {
        match kind {
            OpKind::Add => {
                let applied = self.peers.pull_history(channel, org).await?;
                info!(%channel, %org, applied, "peer caught up with channel history");
                self.peers.activate(channel, org).await?;
                info!(%channel, %org, "peer active on channel");
                Ok(())
            }
            OpKind::Remove => {
                self.peers.decommission(channel, org).await?;
                info!(%channel, %org, "departed organization decommissioned");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPeers {
        calls: Mutex<Vec<String>>,
        fail_pull: bool,
    }

    #[async_trait]
    impl PeerAdministration for RecordingPeers {
        async fn pull_history(&self, channel: &ChannelId, org: &OrgId) -> Result<u64, SyncError> {
            if self.fail_pull {
                return Err(SyncError::HistoryPull("delivery service down".to_string()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(format!("pull:{}:{}", channel, org));
            Ok(5)
        }

        async fn activate(&self, channel: &ChannelId, org: &OrgId) -> Result<(), SyncError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("activate:{}:{}", channel, org));
            Ok(())
        }

        async fn decommission(&self, channel: &ChannelId, org: &OrgId) -> Result<(), SyncError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("decommission:{}:{}", channel, org));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_add_pulls_history_then_activates() {
        let peers = Arc::new(RecordingPeers::default());
        let synchronizer = MembershipSynchronizer::new(Arc::clone(&peers));

        synchronizer
            .run(
                &ChannelId::new("mychannel"),
                &OrgId::new("Org3MSP"),
                OpKind::Add,
            )
            .await
            .unwrap();

        let calls = peers.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                "pull:mychannel:Org3MSP".to_string(),
                "activate:mychannel:Org3MSP".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_decommissions() {
        let peers = Arc::new(RecordingPeers::default());
        let synchronizer = MembershipSynchronizer::new(Arc::clone(&peers));

        synchronizer
            .run(
                &ChannelId::new("mychannel"),
                &OrgId::new("Org2MSP"),
                OpKind::Remove,
            )
            .await
            .unwrap();

        let calls = peers.calls.lock().unwrap();
        assert_eq!(*calls, vec!["decommission:mychannel:Org2MSP".to_string()]);
    }

    #[tokio::test]
    async fn test_pull_failure_propagates_without_activation() {
        let peers = Arc::new(RecordingPeers {
            fail_pull: true,
            ..Default::default()
        });
        let synchronizer = MembershipSynchronizer::new(Arc::clone(&peers));

        let err = synchronizer
            .run(
                &ChannelId::new("mychannel"),
                &OrgId::new("Org3MSP"),
                OpKind::Add,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::HistoryPull(_)));
        assert!(peers.calls.lock().unwrap().is_empty());
    }
}

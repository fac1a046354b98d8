//! Peer administration over the `peer` and `docker` command-line tools.
//!
//! Joining side: fetch the channel's genesis block under the joining
//! organization's identity and join its peer to the channel; the peer then
//! replays the chain itself, so re-running after a partial failure is safe
//! ("already joined" counts as success). Departing side: bring the
//! organization's containers down and delete its channel-local crypto
//! material.

use async_trait::async_trait;
use reconfig_application::ports::peer_admin::{PeerAdministration, SyncError};
use reconfig_domain::{ChannelId, OrgId};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{NetworkProfile, OrgProfile};
use crate::gateway::peer_cli::org_env;

/// Peer administration driving the `peer` CLI and container tooling.
pub struct PeerCliAdministration {
    peer_bin: PathBuf,
    docker_bin: Option<PathBuf>,
    orderer_address: String,
    orderer_tls_ca: Option<PathBuf>,
    artifacts_dir: PathBuf,
    orgs: std::collections::BTreeMap<String, OrgProfile>,
}

impl PeerCliAdministration {
    pub fn new(profile: &NetworkProfile) -> Result<Self, SyncError> {
        let peer_bin = which::which("peer")
            .map_err(|e| SyncError::Activation(format!("peer binary not found: {}", e)))?;
        // Docker is only needed for decommissioning; tolerate its absence.
        let docker_bin = which::which("docker").ok();

        Ok(Self {
            peer_bin,
            docker_bin,
            orderer_address: profile.network.orderer_address.clone(),
            orderer_tls_ca: profile.network.orderer_tls_ca.clone(),
            artifacts_dir: profile.network.artifacts_dir.clone(),
            orgs: profile.orgs.clone(),
        })
    }

    fn org(&self, org: &OrgId) -> Result<&OrgProfile, SyncError> {
        self.orgs
            .get(org.as_str())
            .ok_or_else(|| SyncError::Activation(format!("organization {} is not configured", org)))
    }

    fn genesis_block_path(&self, channel: &ChannelId) -> PathBuf {
        self.artifacts_dir.join(format!("{}.block", channel))
    }

    async fn run_peer(
        &self,
        args: &[String],
        envs: &[(String, String)],
    ) -> Result<String, String> {
        debug!(?args, "running peer");
        let output = Command::new(&self.peer_bin)
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k.clone(), v.clone())))
            .output()
            .await
            .map_err(|e| format!("failed to spawn peer: {}", e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).into_owned())
        }
    }
}

#[async_trait]
impl PeerAdministration for PeerCliAdministration {
    async fn pull_history(&self, channel: &ChannelId, org: &OrgId) -> Result<u64, SyncError> {
        let entry = self.org(org)?;
        tokio::fs::create_dir_all(&self.artifacts_dir)
            .await
            .map_err(|e| SyncError::HistoryPull(e.to_string()))?;

        let mut args = vec![
            "channel".to_string(),
            "fetch".to_string(),
            "0".to_string(),
            self.genesis_block_path(channel).display().to_string(),
            "-c".to_string(),
            channel.as_str().to_string(),
            "-o".to_string(),
            self.orderer_address.clone(),
        ];
        if let Some(ca) = &self.orderer_tls_ca {
            args.push("--tls".to_string());
            args.push("--cafile".to_string());
            args.push(ca.display().to_string());
        }

        self.run_peer(&args, &org_env(org.as_str(), entry))
            .await
            .map_err(SyncError::HistoryPull)?;

        // The genesis block is the only block the peer needs handed to it;
        // once joined it replays the rest of the chain on its own.
        Ok(1)
    }

    async fn activate(&self, channel: &ChannelId, org: &OrgId) -> Result<(), SyncError> {
        let entry = self.org(org)?;
        let args = vec![
            "channel".to_string(),
            "join".to_string(),
            "-b".to_string(),
            self.genesis_block_path(channel).display().to_string(),
        ];

        match self.run_peer(&args, &org_env(org.as_str(), entry)).await {
            Ok(_) => Ok(()),
            // Idempotent retry: an earlier attempt already joined this peer
            Err(stderr) if stderr.to_lowercase().contains("already exists") => {
                info!(%channel, %org, "peer already joined");
                Ok(())
            }
            Err(stderr) => Err(SyncError::Activation(stderr.trim().to_string())),
        }
    }

    async fn decommission(&self, _channel: &ChannelId, org: &OrgId) -> Result<(), SyncError> {
        let entry = self.org(org)?;

        if !entry.compose_files.is_empty() {
            let docker = self.docker_bin.as_ref().ok_or_else(|| {
                SyncError::Decommission("docker binary not found".to_string())
            })?;
            for compose_file in &entry.compose_files {
                let args = [
                    "compose".to_string(),
                    "-f".to_string(),
                    compose_file.display().to_string(),
                    "down".to_string(),
                    "--volumes".to_string(),
                    "--remove-orphans".to_string(),
                ];
                let output = Command::new(docker)
                    .args(&args)
                    .output()
                    .await
                    .map_err(|e| SyncError::Decommission(e.to_string()))?;
                if !output.status.success() {
                    return Err(SyncError::Decommission(
                        String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    ));
                }
                info!(%org, compose = %compose_file.display(), "containers down");
            }
        }

        if let Some(crypto_dir) = &entry.crypto_dir
            && crypto_dir.exists()
        {
            tokio::fs::remove_dir_all(crypto_dir)
                .await
                .map_err(|e| SyncError::Decommission(e.to_string()))?;
            info!(%org, dir = %crypto_dir.display(), "crypto material removed");
        }

        Ok(())
    }
}

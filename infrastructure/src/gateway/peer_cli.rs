//! Ledger gateway over the network's `peer` command-line tool.
//!
//! One subprocess invocation per call, with the submitting organization's
//! identity passed as explicit environment rather than ambient shell state.
//! Fetched blocks are run through the external `configtxlator` transcoder so
//! the rest of the engine only ever sees the JSON form; submissions go the
//! opposite way (envelope JSON -> binary -> `peer channel update`).

use async_trait::async_trait;
use reconfig_application::ports::ledger_gateway::{
    CommitHandle, ConfigBlob, GatewayError, LedgerGateway,
};
use reconfig_domain::{ChannelId, SignatureSet, UpdateEnvelope};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{NetworkProfile, OrgProfile};

/// Gateway driving the `peer` and `configtxlator` binaries.
pub struct PeerCliGateway {
    peer_bin: PathBuf,
    configtxlator_bin: PathBuf,
    orderer_address: String,
    orderer_tls_ca: Option<PathBuf>,
    orderer_hostname_override: Option<String>,
    submitter_msp: String,
    submitter: OrgProfile,
    artifacts_dir: PathBuf,
    poll_interval: Duration,
}

impl PeerCliGateway {
    /// Locate the binaries and bind the submitting organization's identity
    /// from the profile.
    pub fn new(profile: &NetworkProfile) -> Result<Self, GatewayError> {
        let peer_bin = which::which("peer")
            .map_err(|e| GatewayError::Unavailable(format!("peer binary not found: {}", e)))?;
        let configtxlator_bin = which::which("configtxlator").map_err(|e| {
            GatewayError::Unavailable(format!("configtxlator binary not found: {}", e))
        })?;
        let submitter = profile
            .orgs
            .get(&profile.network.submitter)
            .cloned()
            .ok_or_else(|| {
                GatewayError::Unavailable(format!(
                    "submitting organization {} is not configured",
                    profile.network.submitter
                ))
            })?;

        Ok(Self {
            peer_bin,
            configtxlator_bin,
            orderer_address: profile.network.orderer_address.clone(),
            orderer_tls_ca: profile.network.orderer_tls_ca.clone(),
            orderer_hostname_override: profile.network.orderer_hostname_override.clone(),
            submitter_msp: profile.network.submitter.clone(),
            submitter,
            artifacts_dir: profile.network.artifacts_dir.clone(),
            poll_interval: Duration::from_secs(1),
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// `CORE_PEER_*` environment for the submitting organization.
    fn submitter_env(&self) -> Vec<(String, String)> {
        org_env(&self.submitter_msp, &self.submitter)
    }

    fn orderer_args(&self) -> Vec<String> {
        let mut args = vec!["-o".to_string(), self.orderer_address.clone()];
        if let Some(override_name) = &self.orderer_hostname_override {
            args.push("--ordererTLSHostnameOverride".to_string());
            args.push(override_name.clone());
        }
        if let Some(ca) = &self.orderer_tls_ca {
            args.push("--tls".to_string());
            args.push("--cafile".to_string());
            args.push(ca.display().to_string());
        }
        args
    }

    async fn run(
        &self,
        bin: &PathBuf,
        args: &[String],
        envs: &[(String, String)],
    ) -> Result<String, String> {
        debug!(bin = %bin.display(), ?args, "running network tool");
        let output = Command::new(bin)
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k.clone(), v.clone())))
            .output()
            .await
            .map_err(|e| format!("failed to spawn {}: {}", bin.display(), e))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).into_owned())
        }
    }

    async fn transcode(
        &self,
        direction: &str,
        proto_type: &str,
        input: &PathBuf,
        output: &PathBuf,
    ) -> Result<(), GatewayError> {
        let args = vec![
            direction.to_string(),
            "--input".to_string(),
            input.display().to_string(),
            "--type".to_string(),
            proto_type.to_string(),
            "--output".to_string(),
            output.display().to_string(),
        ];
        self.run(&self.configtxlator_bin, &args, &[])
            .await
            .map(|_| ())
            .map_err(GatewayError::Unavailable)
    }
}

/// `CORE_PEER_*` environment for one organization.
pub(crate) fn org_env(msp_id: &str, org: &OrgProfile) -> Vec<(String, String)> {
    let mut env = vec![
        ("CORE_PEER_LOCALMSPID".to_string(), msp_id.to_string()),
        (
            "CORE_PEER_MSPCONFIGPATH".to_string(),
            org.msp_dir.display().to_string(),
        ),
        ("CORE_PEER_ADDRESS".to_string(), org.peer_address.clone()),
    ];
    match &org.tls_root_cert {
        Some(cert) => {
            env.push(("CORE_PEER_TLS_ENABLED".to_string(), "true".to_string()));
            env.push((
                "CORE_PEER_TLS_ROOTCERT_FILE".to_string(),
                cert.display().to_string(),
            ));
        }
        None => env.push(("CORE_PEER_TLS_ENABLED".to_string(), "false".to_string())),
    }
    env
}

/// Map a failed `peer` invocation to a gateway error.
fn classify_peer_failure(stderr: &str, channel: &ChannelId) -> GatewayError {
    let lower = stderr.to_lowercase();
    if lower.contains("not found") || lower.contains("notfound") {
        GatewayError::ChannelNotFound(channel.clone())
    } else if lower.contains("bad_request")
        || lower.contains("rejected")
        || lower.contains("readset expected key")
    {
        GatewayError::Rejected(stderr.trim().to_string())
    } else {
        GatewayError::Unavailable(stderr.trim().to_string())
    }
}

/// Render the signed envelope document `configtxlator` encodes for
/// submission: the config update wrapped in a channel header of the
/// config-update transaction type, endorsements attached.
fn build_signed_envelope(envelope: &UpdateEnvelope, signatures: &SignatureSet) -> Value {
    let config_update: Value =
        serde_json::from_slice(envelope.payload()).unwrap_or_else(|_| Value::Null);
    let rendered: Vec<Value> = signatures
        .iter()
        .map(|s| {
            json!({
                "msp_id": s.org().as_str(),
                "identity": s.identity(),
                "signature": hex::encode(s.signature()),
            })
        })
        .collect();

    json!({
        "payload": {
            "header": {
                "channel_header": {
                    "channel_id": envelope.channel().as_str(),
                    "type": envelope.tx_type(),
                }
            },
            "data": {
                "config_update": config_update,
                "signatures": rendered,
            }
        }
    })
}

/// Read the sequence number out of a decoded block or config document.
fn sequence_of(document: &[u8]) -> Option<u64> {
    let value: Value = serde_json::from_slice(document).ok()?;
    let config = if value.get("channel_group").is_some() {
        &value
    } else {
        value.pointer("/data/data/0/payload/data/config")?
    };
    match config.get("sequence") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl LedgerGateway for PeerCliGateway {
    async fn fetch_config(&self, channel: &ChannelId) -> Result<ConfigBlob, GatewayError> {
        tokio::fs::create_dir_all(&self.artifacts_dir)
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        let block_pb = self
            .artifacts_dir
            .join(format!("{}_config_block.pb", channel));
        let block_json = self
            .artifacts_dir
            .join(format!("{}_config_block.json", channel));

        let mut args = vec![
            "channel".to_string(),
            "fetch".to_string(),
            "config".to_string(),
            block_pb.display().to_string(),
            "-c".to_string(),
            channel.as_str().to_string(),
        ];
        args.extend(self.orderer_args());

        self.run(&self.peer_bin, &args, &self.submitter_env())
            .await
            .map_err(|stderr| classify_peer_failure(&stderr, channel))?;

        self.transcode("proto_decode", "common.Block", &block_pb, &block_json)
            .await?;

        let bytes = tokio::fs::read(&block_json)
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        Ok(ConfigBlob::new(bytes))
    }

    async fn submit(
        &self,
        envelope: &UpdateEnvelope,
        signatures: &SignatureSet,
    ) -> Result<CommitHandle, GatewayError> {
        let channel = envelope.channel();
        let envelope_json = self
            .artifacts_dir
            .join(format!("{}_update_envelope.json", channel));
        let envelope_pb = self
            .artifacts_dir
            .join(format!("{}_update_envelope.pb", channel));

        let document = build_signed_envelope(envelope, signatures);
        tokio::fs::write(
            &envelope_json,
            serde_json::to_vec_pretty(&document)
                .map_err(|e| GatewayError::Unavailable(e.to_string()))?,
        )
        .await
        .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        self.transcode("proto_encode", "common.Envelope", &envelope_json, &envelope_pb)
            .await?;

        let mut args = vec![
            "channel".to_string(),
            "update".to_string(),
            "-f".to_string(),
            envelope_pb.display().to_string(),
            "-c".to_string(),
            channel.as_str().to_string(),
        ];
        args.extend(self.orderer_args());

        self.run(&self.peer_bin, &args, &self.submitter_env())
            .await
            .map_err(|stderr| classify_peer_failure(&stderr, channel))?;

        Ok(CommitHandle {
            channel: channel.clone(),
            expected_sequence: envelope.base_sequence() + 1,
        })
    }

    async fn await_commit(
        &self,
        handle: &CommitHandle,
        timeout: Duration,
    ) -> Result<u64, GatewayError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.fetch_config(&handle.channel).await {
                Ok(blob) => {
                    if let Some(sequence) = sequence_of(blob.as_bytes())
                        && sequence >= handle.expected_sequence
                    {
                        return Ok(sequence);
                    }
                }
                Err(e) => warn!("commit poll failed: {}", e),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(GatewayError::CommitTimeout(timeout));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

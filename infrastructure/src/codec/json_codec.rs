//! JSON configuration codec.
//!
//! The network's native block and config-transaction formats are binary;
//! an external transcoder turns them into JSON and back. This adapter works
//! in that decoded JSON form: it unwraps a block document down to the
//! configuration it carries, re-encodes snapshots canonically, and renders
//! membership deltas as config-update payloads.

use async_trait::async_trait;
use reconfig_application::ports::config_codec::{CodecError, ConfigCodec};
use reconfig_application::ports::ledger_gateway::ConfigBlob;
use reconfig_domain::{ChannelId, ConfigDelta, ConfigSnapshot, OpKind};
use serde_json::{Value, json};

/// Path of the channel configuration inside a decoded block document.
const BLOCK_CONFIG_PATH: &str = "/data/data/0/payload/data/config";
const APPLICATION_GROUPS_PATH: &str = "/channel_group/groups/Application/groups";

/// Codec over the transcoder's JSON block/config representation.
pub struct JsonConfigCodec;

impl JsonConfigCodec {
    /// Unwrap a block document to the configuration it carries. Documents
    /// that are already a bare configuration pass through unchanged.
    fn unwrap_block(value: Value) -> Result<Value, CodecError> {
        if value.get("channel_group").is_some() {
            return Ok(value);
        }
        value
            .pointer(BLOCK_CONFIG_PATH)
            .cloned()
            .ok_or_else(|| {
                CodecError::MalformedBlock(
                    "document is neither a config nor a block carrying one".to_string(),
                )
            })
    }

    /// The configuration sequence number, tolerant of the transcoder's
    /// habit of rendering integers as strings.
    fn sequence_of(config: &Value) -> u64 {
        match config.get("sequence") {
            Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
            Some(Value::String(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

#[async_trait]
impl ConfigCodec for JsonConfigCodec {
    async fn decode(&self, blob: &ConfigBlob) -> Result<ConfigSnapshot, CodecError> {
        let value: Value = serde_json::from_slice(blob.as_bytes())
            .map_err(|e| CodecError::MalformedBlock(e.to_string()))?;
        let config = Self::unwrap_block(value)?;

        if config.pointer(APPLICATION_GROUPS_PATH).is_none() {
            return Err(CodecError::MissingField(
                "channel_group.groups.Application.groups".to_string(),
            ));
        }

        let sequence = Self::sequence_of(&config);
        Ok(ConfigSnapshot::original(sequence, config))
    }

    async fn encode(&self, snapshot: &ConfigSnapshot) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(snapshot.document()).map_err(|e| CodecError::Encode(e.to_string()))
    }

    async fn encode_update(
        &self,
        channel: &ChannelId,
        delta: &ConfigDelta,
    ) -> Result<Vec<u8>, CodecError> {
        // The read set pins the base sequence; the write set carries the one
        // membership group that changes.
        let group = match delta.kind() {
            OpKind::Add => delta
                .proposed()
                .org_group(delta.org())
                .cloned()
                .ok_or_else(|| {
                    CodecError::Encode(format!(
                        "proposed configuration is missing group for {}",
                        delta.org()
                    ))
                })?,
            OpKind::Remove => Value::Null,
        };

        let update = json!({
            "channel_id": channel.as_str(),
            "read_set": {"sequence": delta.base_sequence()},
            "write_set": {
                "membership": {
                    "op": delta.kind().as_str(),
                    "org": delta.org().as_str(),
                    "group": group,
                }
            }
        });
        serde_json::to_vec(&update).map_err(|e| CodecError::Encode(e.to_string()))
    }
}

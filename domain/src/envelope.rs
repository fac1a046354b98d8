//! Configuration update envelopes.
//!
//! A delta is wrapped into an [`UpdateEnvelope`] before signature
//! collection: the channel identifier and the configuration-update
//! transaction type marker are what make the network recognise the payload
//! as a config transaction rather than an ordinary one. The envelope is
//! created once per session and never mutated; its payload bytes are the
//! exact bytes every organization endorses.

use crate::channel::{ChannelId, OrgId};
use crate::delta::{ConfigDelta, OpKind};
use serde::{Deserialize, Serialize};

/// Channel header transaction type for configuration updates.
pub const CONFIG_UPDATE_TYPE: u32 = 2;

/// A configuration delta wrapped for submission to the ordering service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEnvelope {
    channel: ChannelId,
    org: OrgId,
    kind: OpKind,
    base_sequence: u64,
    payload: Vec<u8>,
}

impl UpdateEnvelope {
    pub fn new(channel: impl Into<ChannelId>, delta: &ConfigDelta, payload: Vec<u8>) -> Self {
        Self {
            channel: channel.into(),
            org: delta.org().clone(),
            kind: delta.kind(),
            base_sequence: delta.base_sequence(),
            payload,
        }
    }

    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    pub fn org(&self) -> &OrgId {
        &self.org
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    pub fn base_sequence(&self) -> u64 {
        self.base_sequence
    }

    /// The bytes organizations sign and the network validates.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn tx_type(&self) -> u32 {
        CONFIG_UPDATE_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSnapshot, OrgDefinition};
    use crate::delta::{MembershipOp, compute_delta};
    use serde_json::json;

    fn delta() -> ConfigDelta {
        let original = ConfigSnapshot::original(
            7,
            json!({"channel_group": {"groups": {"Application": {"groups": {
                "Org1MSP": {}
            }}}}}),
        );
        let op = MembershipOp::Add(OrgDefinition::minimal("Org3MSP"));
        compute_delta(&original, &OrgId::new("Org3MSP"), &op).unwrap()
    }

    #[test]
    fn test_envelope_carries_delta_metadata() {
        let envelope = UpdateEnvelope::new("mychannel", &delta(), vec![1, 2, 3]);
        assert_eq!(envelope.channel().as_str(), "mychannel");
        assert_eq!(envelope.org().as_str(), "Org3MSP");
        assert_eq!(envelope.kind(), OpKind::Add);
        assert_eq!(envelope.base_sequence(), 7);
        assert_eq!(envelope.payload(), &[1, 2, 3]);
        assert_eq!(envelope.tx_type(), CONFIG_UPDATE_TYPE);
    }
}

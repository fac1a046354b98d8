//! Membership delta computation.
//!
//! [`compute_delta`] turns an original configuration snapshot plus a
//! requested membership operation into a [`ConfigDelta`]: the minimal
//! structural change that, applied to the original, yields the proposed
//! configuration. A delta touches exactly one organization's membership
//! group and carries the base sequence number it was computed against, so
//! staleness can be detected before submission.

use crate::channel::OrgId;
use crate::config::{ConfigSnapshot, OrgDefinition};
use crate::core::error::MembershipError;
use serde::{Deserialize, Serialize};

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Add,
    Remove,
}

impl OpKind {
    pub fn as_str(&self) -> &str {
        match self {
            OpKind::Add => "add",
            OpKind::Remove => "remove",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OpKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "add" => Ok(OpKind::Add),
            "remove" => Ok(OpKind::Remove),
            _ => Err(format!("unknown operation: {}. Valid: add, remove", s)),
        }
    }
}

/// A requested membership operation.
///
/// `Add` carries the joining organization's membership definition; `Remove`
/// needs nothing beyond the target MSP identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MembershipOp {
    Add(OrgDefinition),
    Remove,
}

impl MembershipOp {
    pub fn kind(&self) -> OpKind {
        match self {
            MembershipOp::Add(_) => OpKind::Add,
            MembershipOp::Remove => OpKind::Remove,
        }
    }
}

/// The minimal diff between an original and a proposed configuration.
///
/// Invariant: exactly one application membership group differs between the
/// original and the proposed document; everything else is identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigDelta {
    base_sequence: u64,
    org: OrgId,
    kind: OpKind,
    proposed: ConfigSnapshot,
}

impl ConfigDelta {
    /// Sequence number of the configuration this delta was computed against.
    pub fn base_sequence(&self) -> u64 {
        self.base_sequence
    }

    pub fn org(&self) -> &OrgId {
        &self.org
    }

    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// The configuration as it should look after the change.
    pub fn proposed(&self) -> &ConfigSnapshot {
        &self.proposed
    }
}

/// Compute the membership delta for one organization.
///
/// Fails with [`MembershipError`] when the change is invalid against the
/// original snapshot: the organization already exists (add), does not exist
/// (remove), or the supplied definition is structurally incomplete.
pub fn compute_delta(
    original: &ConfigSnapshot,
    org: &OrgId,
    op: &MembershipOp,
) -> Result<ConfigDelta, MembershipError> {
    let proposed = match op {
        MembershipOp::Add(definition) => {
            definition.validate()?;
            if definition.msp_id() != org {
                return Err(MembershipError::IncompleteDefinition {
                    org: org.clone(),
                    reason: format!(
                        "definition MSP identifier {} does not match target organization",
                        definition.msp_id()
                    ),
                });
            }
            original.with_org_added(definition)?
        }
        MembershipOp::Remove => original.with_org_removed(org)?,
    };

    Ok(ConfigDelta {
        base_sequence: original.sequence(),
        org: org.clone(),
        kind: op.kind(),
        proposed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot_with(orgs: &[&str], sequence: u64) -> ConfigSnapshot {
        let mut groups = serde_json::Map::new();
        for org in orgs {
            groups.insert(
                org.to_string(),
                json!({"values": {"MSP": {"value": {"config": {"name": org}}}}}),
            );
        }
        ConfigSnapshot::original(
            sequence,
            json!({
                "channel_group": {
                    "groups": {
                        "Application": {"groups": groups, "version": "1"},
                        "Orderer": {"groups": {"OrdererOrg": {"version": "0"}}}
                    }
                }
            }),
        )
    }

    #[test]
    fn test_add_delta_membership() {
        let original = snapshot_with(&["Org1MSP", "Org2MSP"], 3);
        let op = MembershipOp::Add(OrgDefinition::minimal("Org3MSP"));
        let delta = compute_delta(&original, &OrgId::new("Org3MSP"), &op).unwrap();

        assert_eq!(delta.base_sequence(), 3);
        assert_eq!(delta.kind(), OpKind::Add);
        assert_eq!(
            delta.proposed().member_orgs(),
            vec![
                OrgId::new("Org1MSP"),
                OrgId::new("Org2MSP"),
                OrgId::new("Org3MSP")
            ]
        );
    }

    #[test]
    fn test_add_delta_does_not_touch_other_groups() {
        let original = snapshot_with(&["Org1MSP", "Org2MSP"], 3);
        let op = MembershipOp::Add(OrgDefinition::minimal("Org3MSP"));
        let delta = compute_delta(&original, &OrgId::new("Org3MSP"), &op).unwrap();

        for org in ["Org1MSP", "Org2MSP"] {
            assert_eq!(
                delta.proposed().org_group(&OrgId::new(org)),
                original.org_group(&OrgId::new(org)),
                "sibling group {} must be identical",
                org
            );
        }
        assert_eq!(
            delta
                .proposed()
                .document()
                .pointer("/channel_group/groups/Orderer"),
            original.document().pointer("/channel_group/groups/Orderer")
        );
    }

    #[test]
    fn test_remove_delta_is_inverse_of_add() {
        let original = snapshot_with(&["Org1MSP", "Org2MSP", "Org3MSP"], 4);
        let delta = compute_delta(&original, &OrgId::new("Org3MSP"), &MembershipOp::Remove).unwrap();

        assert_eq!(delta.kind(), OpKind::Remove);
        assert_eq!(
            delta.proposed().member_orgs(),
            vec![OrgId::new("Org1MSP"), OrgId::new("Org2MSP")]
        );
        assert_eq!(
            delta.proposed().org_group(&OrgId::new("Org1MSP")),
            original.org_group(&OrgId::new("Org1MSP"))
        );
    }

    #[test]
    fn test_add_existing_org_fails() {
        let original = snapshot_with(&["Org1MSP", "Org2MSP"], 3);
        let op = MembershipOp::Add(OrgDefinition::minimal("Org2MSP"));
        let err = compute_delta(&original, &OrgId::new("Org2MSP"), &op).unwrap_err();
        assert_eq!(err, MembershipError::AlreadyMember(OrgId::new("Org2MSP")));
    }

    #[test]
    fn test_remove_missing_org_fails() {
        let original = snapshot_with(&["Org1MSP"], 3);
        let err =
            compute_delta(&original, &OrgId::new("Org3MSP"), &MembershipOp::Remove).unwrap_err();
        assert_eq!(err, MembershipError::NotAMember(OrgId::new("Org3MSP")));
    }

    #[test]
    fn test_mismatched_definition_fails() {
        let original = snapshot_with(&["Org1MSP"], 3);
        let op = MembershipOp::Add(OrgDefinition::minimal("Org4MSP"));
        let err = compute_delta(&original, &OrgId::new("Org3MSP"), &op).unwrap_err();
        assert!(matches!(
            err,
            MembershipError::IncompleteDefinition { .. }
        ));
    }

    #[test]
    fn test_op_kind_parse() {
        assert_eq!("add".parse::<OpKind>().ok(), Some(OpKind::Add));
        assert_eq!("Remove".parse::<OpKind>().ok(), Some(OpKind::Remove));
        assert!("join".parse::<OpKind>().is_err());
    }
}

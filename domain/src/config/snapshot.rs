//! Immutable channel configuration snapshots.
//!
//! A [`ConfigSnapshot`] is the structured form of a channel's configuration
//! at a point in time, as produced by the network's block transcoder. The
//! membership groups live under `channel_group.groups.Application.groups`,
//! keyed by MSP identifier. Snapshots are immutable once captured; the
//! `with_*` editors return a new `Proposed` snapshot and leave every
//! unrelated part of the document untouched.

use crate::channel::OrgId;
use crate::config::org_definition::OrgDefinition;
use crate::core::error::MembershipError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether a snapshot was captured from the network or derived locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotTag {
    /// Read from the channel's latest configuration block.
    Original,
    /// Produced by applying a membership change to an original snapshot.
    Proposed,
}

impl SnapshotTag {
    pub fn as_str(&self) -> &str {
        match self {
            SnapshotTag::Original => "original",
            SnapshotTag::Proposed => "proposed",
        }
    }
}

/// The structured configuration document of a channel at one sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    tag: SnapshotTag,
    sequence: u64,
    document: Value,
}

const APPLICATION_GROUPS: &str = "/channel_group/groups/Application/groups";

impl ConfigSnapshot {
    /// Capture an original snapshot at the given sequence number.
    pub fn original(sequence: u64, document: Value) -> Self {
        Self {
            tag: SnapshotTag::Original,
            sequence,
            document,
        }
    }

    pub fn tag(&self) -> SnapshotTag {
        self.tag
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// The MSP identifiers of the channel's application members, sorted.
    pub fn member_orgs(&self) -> Vec<OrgId> {
        let Some(groups) = self.application_groups() else {
            return Vec::new();
        };
        let mut orgs: Vec<OrgId> = groups.keys().map(OrgId::new).collect();
        orgs.sort();
        orgs
    }

    pub fn has_org(&self, org: &OrgId) -> bool {
        self.application_groups()
            .is_some_and(|groups| groups.contains_key(org.as_str()))
    }

    /// The configuration group of one member organization, if present.
    pub fn org_group(&self, org: &OrgId) -> Option<&Value> {
        self.application_groups()?.get(org.as_str())
    }

    /// Copy of this snapshot with the organization's membership group
    /// inserted. Every other part of the document is carried over unchanged.
    pub fn with_org_added(
        &self,
        definition: &OrgDefinition,
    ) -> Result<ConfigSnapshot, MembershipError> {
        let org = definition.msp_id().clone();
        if self.has_org(&org) {
            return Err(MembershipError::AlreadyMember(org));
        }
        let mut document = self.document.clone();
        let groups = Self::application_groups_mut(&mut document)?;
        groups.insert(org.as_str().to_string(), definition.to_config_group());
        Ok(ConfigSnapshot {
            tag: SnapshotTag::Proposed,
            sequence: self.sequence,
            document,
        })
    }

    /// Copy of this snapshot with the organization's membership group
    /// removed.
    pub fn with_org_removed(&self, org: &OrgId) -> Result<ConfigSnapshot, MembershipError> {
        if !self.has_org(org) {
            return Err(MembershipError::NotAMember(org.clone()));
        }
        let mut document = self.document.clone();
        let groups = Self::application_groups_mut(&mut document)?;
        groups.remove(org.as_str());
        Ok(ConfigSnapshot {
            tag: SnapshotTag::Proposed,
            sequence: self.sequence,
            document,
        })
    }

    fn application_groups(&self) -> Option<&serde_json::Map<String, Value>> {
        self.document.pointer(APPLICATION_GROUPS)?.as_object()
    }

    fn application_groups_mut(
        document: &mut Value,
    ) -> Result<&mut serde_json::Map<String, Value>, MembershipError> {
        document
            .pointer_mut(APPLICATION_GROUPS)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| {
                MembershipError::MalformedConfig(
                    "channel_group.groups.Application.groups is missing".to_string(),
                )
            })
    }
}

//! Organization membership definitions.
//!
//! An [`OrgDefinition`] is the material a joining organization brings to a
//! channel: its MSP identifier, certificate chain, and the policy fragment
//! describing how its members may read, write and administer the channel.
//! It is rendered into the configuration-group form the channel document
//! expects by [`OrgDefinition::to_config_group`].

use crate::channel::OrgId;
use crate::core::error::MembershipError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Membership definition for an organization joining a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgDefinition {
    /// MSP identifier the organization will be known by.
    msp_id: OrgId,
    /// Base64 root CA certificates.
    root_certs: Vec<String>,
    /// Base64 admin certificates.
    admin_certs: Vec<String>,
    /// Base64 TLS root CA certificates.
    #[serde(default)]
    tls_root_certs: Vec<String>,
    /// Endorsement policy fragment; defaults to signature policies derived
    /// from the MSP roles.
    #[serde(default)]
    policies: Option<Value>,
}

impl OrgDefinition {
    pub fn new(
        msp_id: impl Into<OrgId>,
        root_certs: Vec<String>,
        admin_certs: Vec<String>,
    ) -> Self {
        Self {
            msp_id: msp_id.into(),
            root_certs,
            admin_certs,
            tls_root_certs: Vec::new(),
            policies: None,
        }
    }

    /// Smallest definition that passes validation. Intended for tests and
    /// local bootstrap networks.
    pub fn minimal(msp_id: impl Into<OrgId>) -> Self {
        Self::new(
            msp_id,
            vec!["LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0t".to_string()],
            vec!["LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0t".to_string()],
        )
    }

    pub fn with_tls_root_certs(mut self, certs: Vec<String>) -> Self {
        self.tls_root_certs = certs;
        self
    }

    pub fn with_policies(mut self, policies: Value) -> Self {
        self.policies = Some(policies);
        self
    }

    pub fn msp_id(&self) -> &OrgId {
        &self.msp_id
    }

    /// Check the definition is structurally complete enough to be rendered
    /// into a channel configuration.
    pub fn validate(&self) -> Result<(), MembershipError> {
        if self.msp_id.as_str().is_empty() {
            return Err(self.incomplete("MSP identifier is empty"));
        }
        if self.root_certs.iter().all(|c| c.trim().is_empty()) {
            return Err(self.incomplete("no root certificates"));
        }
        if self.admin_certs.iter().all(|c| c.trim().is_empty()) {
            return Err(self.incomplete("no admin certificates"));
        }
        Ok(())
    }

    /// Render the definition as an application membership group.
    pub fn to_config_group(&self) -> Value {
        json!({
            "groups": {},
            "mod_policy": "Admins",
            "policies": self.policies.clone().unwrap_or_else(|| default_policies(&self.msp_id)),
            "values": {
                "MSP": {
                    "mod_policy": "Admins",
                    "value": {
                        "config": {
                            "name": self.msp_id.as_str(),
                            "root_certs": self.root_certs,
                            "admins": self.admin_certs,
                            "tls_root_certs": self.tls_root_certs,
                        },
                        "type": 0
                    },
                    "version": "0"
                }
            },
            "version": "0"
        })
    }

    fn incomplete(&self, reason: &str) -> MembershipError {
        MembershipError::IncompleteDefinition {
            org: self.msp_id.clone(),
            reason: reason.to_string(),
        }
    }
}

fn default_policies(msp_id: &OrgId) -> Value {
    let member_rule = |role: &str| {
        json!({
            "mod_policy": "Admins",
            "policy": {
                "type": 1,
                "value": {
                    "identities": [{
                        "principal": {"msp_identifier": msp_id.as_str(), "role": role},
                        "principal_classification": "ROLE"
                    }],
                    "rule": {"n_out_of": {"n": 1, "rules": [{"signed_by": 0}]}}
                }
            },
            "version": "0"
        })
    };
    json!({
        "Admins": member_rule("ADMIN"),
        "Readers": member_rule("MEMBER"),
        "Writers": member_rule("MEMBER"),
    })
}

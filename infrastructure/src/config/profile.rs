//! Network profile: explicit per-organization configuration.
//!
//! Everything the original deployment carried as ambient shell state
//! (`CORE_PEER_*` exports, hardcoded MSP paths) lives here explicitly:
//! orderer endpoint, per-organization credential and address material, the
//! channel's quorum policy, and session retry parameters.
//!
//! Example configuration:
//!
//! ```toml
//! [network]
//! orderer_address = "localhost:7050"
//! submitter = "Org1MSP"
//! artifacts_dir = "channel-artifacts"
//!
//! [quorum]
//! policy = "all"            # or "atleast:N", "Org1MSP,Org2MSP"
//!
//! [session]
//! max_rounds = 3
//!
//! [orgs.Org1MSP]
//! msp_dir = "organizations/peerOrganizations/org1.example.com/users/Admin@org1.example.com/msp"
//! peer_address = "localhost:7051"
//! ```

use reconfig_application::SessionParams;
use reconfig_domain::{OrgId, QuorumPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a network profile
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("no organizations configured")]
    NoOrgs,

    #[error("submitting organization {0} is not configured under [orgs]")]
    UnknownSubmitter(String),

    #[error("invalid quorum policy: {0}")]
    InvalidPolicy(String),

    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),
}

/// Orderer endpoint and general network settings (`[network]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSection {
    /// Ordering service endpoint.
    pub orderer_address: String,
    /// TLS CA certificate for the orderer, if TLS is enabled.
    pub orderer_tls_ca: Option<PathBuf>,
    /// TLS hostname override for the orderer endpoint.
    pub orderer_hostname_override: Option<String>,
    /// MSP identifier of the organization submitting on the channel's
    /// behalf (fetches and updates go out under this identity).
    pub submitter: String,
    /// Directory for fetched blocks and generated envelopes.
    pub artifacts_dir: PathBuf,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            orderer_address: "localhost:7050".to_string(),
            orderer_tls_ca: None,
            orderer_hostname_override: None,
            submitter: String::new(),
            artifacts_dir: PathBuf::from("channel-artifacts"),
        }
    }
}

/// Quorum configuration (`[quorum]` section)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumSection {
    /// Policy string: "all", "atleast:N", or a comma-separated MSP list.
    pub policy: String,
}

impl Default for QuorumSection {
    fn default() -> Self {
        Self {
            policy: "all".to_string(),
        }
    }
}

/// One organization's addresses and credential material (`[orgs.<MSP>]`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OrgProfile {
    /// Admin MSP directory holding the organization's signing material.
    pub msp_dir: PathBuf,
    /// The organization's peer endpoint.
    pub peer_address: String,
    /// TLS root certificate for the peer, if TLS is enabled.
    pub tls_root_cert: Option<PathBuf>,
    /// Compose files describing the organization's containers; used for
    /// decommissioning on removal.
    pub compose_files: Vec<PathBuf>,
    /// Crypto-material directory removed on decommission.
    pub crypto_dir: Option<PathBuf>,
}

/// Full network profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkProfile {
    pub network: NetworkSection,
    pub quorum: QuorumSection,
    pub session: SessionParams,
    pub orgs: BTreeMap<String, OrgProfile>,
}

impl NetworkProfile {
    /// Parse the configured quorum policy.
    pub fn policy(&self) -> Result<QuorumPolicy, ProfileError> {
        self.quorum
            .policy
            .parse()
            .map_err(ProfileError::InvalidPolicy)
    }

    pub fn org(&self, org: &OrgId) -> Option<&OrgProfile> {
        self.orgs.get(org.as_str())
    }

    pub fn submitter(&self) -> OrgId {
        OrgId::new(self.network.submitter.clone())
    }

    /// Check the profile is internally consistent.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.orgs.is_empty() {
            return Err(ProfileError::NoOrgs);
        }
        if !self.orgs.contains_key(&self.network.submitter) {
            return Err(ProfileError::UnknownSubmitter(
                self.network.submitter.clone(),
            ));
        }
        self.policy()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(submitter: &str, orgs: &[&str]) -> NetworkProfile {
        let mut profile = NetworkProfile::default();
        profile.network.submitter = submitter.to_string();
        for org in orgs {
            profile.orgs.insert(org.to_string(), OrgProfile::default());
        }
        profile
    }

    #[test]
    fn test_valid_profile() {
        let profile = profile_with("Org1MSP", &["Org1MSP", "Org2MSP"]);
        assert!(profile.validate().is_ok());
        assert_eq!(profile.policy().unwrap(), QuorumPolicy::AllEligible);
    }

    #[test]
    fn test_empty_orgs_rejected() {
        let profile = profile_with("Org1MSP", &[]);
        assert!(matches!(profile.validate(), Err(ProfileError::NoOrgs)));
    }

    #[test]
    fn test_unknown_submitter_rejected() {
        let profile = profile_with("Org9MSP", &["Org1MSP"]);
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::UnknownSubmitter(_))
        ));
    }

    #[test]
    fn test_bad_policy_rejected() {
        let mut profile = profile_with("Org1MSP", &["Org1MSP"]);
        profile.quorum.policy = "sometimes".to_string();
        assert!(matches!(
            profile.validate(),
            Err(ProfileError::InvalidPolicy(_))
        ));
    }
}

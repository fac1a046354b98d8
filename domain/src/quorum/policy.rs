//! Quorum policies for configuration endorsement.
//!
//! A [`QuorumPolicy`] decides when a [`SignatureSet`](super::SignatureSet)
//! holds enough organizational endorsements for a configuration update to be
//! submitted to the ordering service.

use crate::channel::OrgId;
use crate::quorum::signature::SignatureSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Policy deciding when collected endorsements permit submission.
///
/// - `AllEligible`: every currently-eligible organization must sign (default)
/// - `AtLeast(n)`: at least n eligible organizations must sign
/// - `Explicit(orgs)`: each named organization must sign
///
/// # Example
///
/// ```
/// use reconfig_domain::{EndorsementSignature, OrgId, QuorumPolicy, SignatureSet};
///
/// let eligible = vec![OrgId::new("Org1MSP"), OrgId::new("Org2MSP")];
/// let mut signed = SignatureSet::new();
/// signed.insert(EndorsementSignature::new("Org1MSP", vec![0xAB], "Admin@org1"));
///
/// let policy = QuorumPolicy::AtLeast(1);
/// assert!(policy.is_satisfied(&signed, &eligible));
/// assert!(!QuorumPolicy::AllEligible.is_satisfied(&signed, &eligible));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QuorumPolicy {
    /// Every currently-eligible organization must sign.
    #[default]
    AllEligible,

    /// At least n eligible organizations must sign.
    AtLeast(usize),

    /// Each named organization must sign.
    Explicit(BTreeSet<OrgId>),
}

impl QuorumPolicy {
    /// Check whether the collected signatures satisfy the policy for the
    /// given eligible-signer set.
    ///
    /// Only signatures from eligible organizations count; an empty eligible
    /// set never satisfies any policy.
    pub fn is_satisfied(&self, signed: &SignatureSet, eligible: &[OrgId]) -> bool {
        if eligible.is_empty() {
            return false;
        }

        match self {
            QuorumPolicy::AllEligible => eligible.iter().all(|org| signed.contains(org)),
            QuorumPolicy::AtLeast(n) => {
                let counted = eligible.iter().filter(|org| signed.contains(org)).count();
                counted >= *n
            }
            QuorumPolicy::Explicit(orgs) => {
                !orgs.is_empty() && orgs.iter().all(|org| signed.contains(org))
            }
        }
    }

    /// Minimum number of signatures this policy can be satisfied with.
    pub fn min_signatures_needed(&self, eligible_count: usize) -> usize {
        match self {
            QuorumPolicy::AllEligible => eligible_count,
            QuorumPolicy::AtLeast(n) => *n,
            QuorumPolicy::Explicit(orgs) => orgs.len(),
        }
    }

    /// Human-readable description of this policy.
    pub fn describe(&self) -> String {
        match self {
            QuorumPolicy::AllEligible => "all eligible organizations".to_string(),
            QuorumPolicy::AtLeast(n) => format!("at least {} organizations", n),
            QuorumPolicy::Explicit(orgs) => {
                let names: Vec<&str> = orgs.iter().map(|o| o.as_str()).collect();
                format!("organizations [{}]", names.join(", "))
            }
        }
    }
}

impl std::fmt::Display for QuorumPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl std::str::FromStr for QuorumPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "all" => Ok(QuorumPolicy::AllEligible),
            lower if lower.starts_with("atleast:") || lower.starts_with("at_least:") => {
                let n: usize = s
                    .split(':')
                    .nth(1)
                    .ok_or("Missing number after atleast:")?
                    .parse()
                    .map_err(|_| "Invalid number for atleast")?;
                Ok(QuorumPolicy::AtLeast(n))
            }
            _ if s.contains(',') || s.ends_with("MSP") => {
                let orgs: BTreeSet<OrgId> = s
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(OrgId::new)
                    .collect();
                if orgs.is_empty() {
                    return Err("Empty organization list".to_string());
                }
                Ok(QuorumPolicy::Explicit(orgs))
            }
            _ => Err(format!(
                "Unknown quorum policy: {}. Valid: all, atleast:N, or a comma-separated MSP list",
                s
            )),
        }
    }
}

//! Signer registry port
//!
//! Wraps each organization's credential store. A signer produces exactly one
//! endorsement signature over a given payload; organizations are independent
//! trust domains, so requests to distinct signers may run concurrently.

use async_trait::async_trait;
use reconfig_domain::{EndorsementSignature, OrgId};
use thiserror::Error;

/// Per-signer failure. Does not abort collection from other signers; it only
/// matters if it causes quorum to be missed.
#[derive(Error, Debug)]
pub enum SignerError {
    #[error("identity for {org} unavailable: {reason}")]
    IdentityUnavailable { org: OrgId, reason: String },
}

/// Registry of organizational signing identities.
#[async_trait]
pub trait SignerRegistry: Send + Sync {
    /// Produce the organization's endorsement over the payload.
    async fn sign(&self, org: &OrgId, payload: &[u8])
    -> Result<EndorsementSignature, SignerError>;
}

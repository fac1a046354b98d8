//! Endorsement signatures and their accumulation.
//!
//! Each organization produces exactly one [`EndorsementSignature`] over an
//! update envelope's payload. Signatures accumulate in a [`SignatureSet`],
//! which grows monotonically and merges duplicates idempotently: a signer
//! answering twice, or a late arrival after quorum was already reached,
//! never corrupts the set.

use crate::channel::OrgId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One organization's endorsement over an envelope payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementSignature {
    org: OrgId,
    signature: Vec<u8>,
    /// Label of the identity that signed (e.g. "Admin@org1.example.com").
    identity: String,
}

impl EndorsementSignature {
    pub fn new(org: impl Into<OrgId>, signature: Vec<u8>, identity: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            signature,
            identity: identity.into(),
        }
    }

    pub fn org(&self) -> &OrgId {
        &self.org
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Accumulated endorsements, keyed by organization.
///
/// Insertion order is irrelevant. The set only ever grows; inserting a
/// signature for an organization that already signed is a no-op, so unions
/// across retries are idempotent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureSet {
    signatures: BTreeMap<OrgId, EndorsementSignature>,
}

impl SignatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a signature. Returns false if the organization had already
    /// signed (the earlier signature is kept).
    pub fn insert(&mut self, signature: EndorsementSignature) -> bool {
        let org = signature.org().clone();
        if self.signatures.contains_key(&org) {
            return false;
        }
        self.signatures.insert(org, signature);
        true
    }

    /// Idempotent union with another set.
    pub fn merge(&mut self, other: SignatureSet) {
        for (_, signature) in other.signatures {
            self.insert(signature);
        }
    }

    pub fn contains(&self, org: &OrgId) -> bool {
        self.signatures.contains_key(org)
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn orgs(&self) -> impl Iterator<Item = &OrgId> {
        self.signatures.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndorsementSignature> {
        self.signatures.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(org: &str, bytes: u8) -> EndorsementSignature {
        EndorsementSignature::new(org, vec![bytes; 64], format!("Admin@{}", org))
    }

    #[test]
    fn test_insert_and_contains() {
        let mut set = SignatureSet::new();
        assert!(set.insert(sig("Org1MSP", 1)));
        assert!(set.contains(&OrgId::new("Org1MSP")));
        assert!(!set.contains(&OrgId::new("Org2MSP")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut set = SignatureSet::new();
        assert!(set.insert(sig("Org1MSP", 1)));
        assert!(!set.insert(sig("Org1MSP", 2)));
        assert_eq!(set.len(), 1);
        // The first signature wins
        assert_eq!(set.iter().next().unwrap().signature(), &[1u8; 64][..]);
    }

    #[test]
    fn test_merge_is_idempotent_union() {
        let mut a = SignatureSet::new();
        a.insert(sig("Org1MSP", 1));
        a.insert(sig("Org2MSP", 2));

        let mut b = SignatureSet::new();
        b.insert(sig("Org2MSP", 9));
        b.insert(sig("Org3MSP", 3));

        a.merge(b.clone());
        assert_eq!(a.len(), 3);
        a.merge(b);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn test_grows_monotonically() {
        let mut set = SignatureSet::new();
        for (i, org) in ["Org1MSP", "Org2MSP", "Org3MSP"].iter().enumerate() {
            let before = set.len();
            set.insert(sig(org, i as u8));
            assert_eq!(set.len(), before + 1);
        }
    }
}

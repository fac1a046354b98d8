//! Filesystem signer registry.
//!
//! Each organization's administrative signing identity lives in its MSP
//! directory: an Ed25519 seed, hex-encoded, at `keystore/admin_sk`. Signing
//! loads the key, signs the envelope payload, and returns the endorsement;
//! anything wrong with the material (missing directory, unreadable or
//! corrupt key) surfaces as `IdentityUnavailable` for that signer only.

use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use reconfig_application::ports::signer_registry::{SignerError, SignerRegistry};
use reconfig_domain::{EndorsementSignature, OrgId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::NetworkProfile;

const KEYSTORE_DIR: &str = "keystore";
const ADMIN_KEY_FILE: &str = "admin_sk";

/// Signer registry backed by per-organization MSP directories.
pub struct FsSignerRegistry {
    msp_dirs: BTreeMap<OrgId, PathBuf>,
}

impl FsSignerRegistry {
    pub fn new() -> Self {
        Self {
            msp_dirs: BTreeMap::new(),
        }
    }

    pub fn with_org(mut self, org: impl Into<OrgId>, msp_dir: impl Into<PathBuf>) -> Self {
        self.msp_dirs.insert(org.into(), msp_dir.into());
        self
    }

    /// Build the registry from every organization in the profile.
    pub fn from_profile(profile: &NetworkProfile) -> Self {
        let mut registry = Self::new();
        for (org, entry) in &profile.orgs {
            registry = registry.with_org(org.clone(), entry.msp_dir.clone());
        }
        registry
    }

    /// Write a fresh admin signing key into an MSP directory. Intended for
    /// test fixtures and local bootstrap networks.
    pub fn generate_identity(msp_dir: &Path) -> std::io::Result<()> {
        let keystore = msp_dir.join(KEYSTORE_DIR);
        std::fs::create_dir_all(&keystore)?;
        let key = SigningKey::generate(&mut rand::rngs::OsRng);
        std::fs::write(keystore.join(ADMIN_KEY_FILE), hex::encode(key.to_bytes()))
    }

    async fn load_key(&self, org: &OrgId) -> Result<SigningKey, SignerError> {
        let unavailable = |reason: String| SignerError::IdentityUnavailable {
            org: org.clone(),
            reason,
        };

        let msp_dir = self
            .msp_dirs
            .get(org)
            .ok_or_else(|| unavailable("organization has no configured MSP directory".to_string()))?;
        let key_path = msp_dir.join(KEYSTORE_DIR).join(ADMIN_KEY_FILE);

        let encoded = tokio::fs::read_to_string(&key_path)
            .await
            .map_err(|e| unavailable(format!("cannot read {}: {}", key_path.display(), e)))?;
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| unavailable(format!("corrupt key material: {}", e)))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| unavailable("key material has wrong length".to_string()))?;

        Ok(SigningKey::from_bytes(&seed))
    }
}

impl Default for FsSignerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignerRegistry for FsSignerRegistry {
    async fn sign(
        &self,
        org: &OrgId,
        payload: &[u8],
    ) -> Result<EndorsementSignature, SignerError> {
        let key = self.load_key(org).await?;
        let signature = key.sign(payload);
        debug!("signed payload for {}", org);
        Ok(EndorsementSignature::new(
            org.clone(),
            signature.to_bytes().to_vec(),
            format!("Admin@{}", org),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    #[tokio::test]
    async fn test_sign_and_verify() {
        let dir = tempfile::tempdir().unwrap();
        let msp = dir.path().join("org1-msp");
        FsSignerRegistry::generate_identity(&msp).unwrap();

        let registry = FsSignerRegistry::new().with_org("Org1MSP", &msp);
        let payload = b"config update payload";
        let endorsement = registry
            .sign(&OrgId::new("Org1MSP"), payload)
            .await
            .unwrap();

        assert_eq!(endorsement.org().as_str(), "Org1MSP");
        assert_eq!(endorsement.identity(), "Admin@Org1MSP");

        // The signature must verify against the stored key
        let encoded =
            std::fs::read_to_string(msp.join(KEYSTORE_DIR).join(ADMIN_KEY_FILE)).unwrap();
        let seed: [u8; 32] = hex::decode(encoded.trim()).unwrap().try_into().unwrap();
        let key = SigningKey::from_bytes(&seed);
        let signature = Signature::from_slice(endorsement.signature()).unwrap();
        assert!(key.verifying_key().verify(payload, &signature).is_ok());
    }

    #[tokio::test]
    async fn test_unconfigured_org_is_unavailable() {
        let registry = FsSignerRegistry::new();
        let err = registry
            .sign(&OrgId::new("Org9MSP"), b"payload")
            .await
            .unwrap_err();
        let SignerError::IdentityUnavailable { org, .. } = err;
        assert_eq!(org.as_str(), "Org9MSP");
    }

    #[tokio::test]
    async fn test_missing_key_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FsSignerRegistry::new().with_org("Org1MSP", dir.path());
        let err = registry
            .sign(&OrgId::new("Org1MSP"), b"payload")
            .await
            .unwrap_err();
        let SignerError::IdentityUnavailable { reason, .. } = err;
        assert!(reason.contains("cannot read"));
    }

    #[tokio::test]
    async fn test_corrupt_key_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let keystore = dir.path().join(KEYSTORE_DIR);
        std::fs::create_dir_all(&keystore).unwrap();
        std::fs::write(keystore.join(ADMIN_KEY_FILE), "not-hex!").unwrap();

        let registry = FsSignerRegistry::new().with_org("Org1MSP", dir.path());
        let err = registry
            .sign(&OrgId::new("Org1MSP"), b"payload")
            .await
            .unwrap_err();
        let SignerError::IdentityUnavailable { reason, .. } = err;
        assert!(reason.contains("corrupt key material"));
    }
}

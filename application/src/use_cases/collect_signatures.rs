//! Signature collection use case
//!
//! Drives the endorsement-gathering phase: the update envelope is offered to
//! every eligible organizational signer concurrently, signatures accumulate
//! as they arrive, and collection returns as soon as the quorum policy is
//! satisfied. Signers are independent trust domains; one signer's failure
//! never blocks the others.

use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::signer_registry::{SignerError, SignerRegistry};
use reconfig_domain::{OpKind, OrgId, QuorumPolicy, SignatureSet, UpdateEnvelope};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Errors that can occur during signature collection
#[derive(Error, Debug)]
pub enum CollectError {
    /// The eligible signer set was exhausted without satisfying the policy.
    /// Fatal for this session instance.
    #[error("quorum not reached: {obtained} of {required} required endorsements")]
    QuorumNotReached { obtained: usize, required: usize },
}

/// Use case for collecting a quorum of endorsement signatures
pub struct QuorumCollector<S: SignerRegistry + 'static> {
    signers: Arc<S>,
    signer_timeout: Duration,
}

impl<S: SignerRegistry + 'static> QuorumCollector<S> {
    pub fn new(signers: Arc<S>) -> Self {
        Self {
            signers,
            signer_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_signer_timeout(mut self, timeout: Duration) -> Self {
        self.signer_timeout = timeout;
        self
    }

    /// Organizations whose endorsement is requested for a membership change:
    /// the channel's current members, minus the organization being removed,
    /// plus the organization being added (the newcomer co-signs its own
    /// admission).
    pub fn eligible_signers(members: &[OrgId], target: &OrgId, kind: OpKind) -> Vec<OrgId> {
        let mut eligible: Vec<OrgId> = members.iter().filter(|org| *org != target).cloned().collect();
        if kind == OpKind::Add {
            eligible.push(target.clone());
        }
        eligible
    }

    /// Collect signatures until the policy is satisfied.
    pub async fn collect(
        &self,
        envelope: &UpdateEnvelope,
        policy: &QuorumPolicy,
        eligible: &[OrgId],
    ) -> Result<SignatureSet, CollectError> {
        self.collect_with_progress(envelope, policy, eligible, &NoProgress)
            .await
    }

    /// Collect signatures with progress callbacks.
    ///
    /// Requests to distinct signers run concurrently; no two are ordered
    /// relative to each other. Outstanding requests are cancelled once
    /// quorum is reached, but responses that already arrived are merged
    /// first (idempotent union), so nothing collected is ever dropped.
    pub async fn collect_with_progress(
        &self,
        envelope: &UpdateEnvelope,
        policy: &QuorumPolicy,
        eligible: &[OrgId],
        progress: &dyn ProgressNotifier,
    ) -> Result<SignatureSet, CollectError> {
        let mut collected = SignatureSet::new();
        let required = policy.min_signatures_needed(eligible.len());

        info!(
            eligible = eligible.len(),
            policy = %policy,
            "requesting endorsements"
        );

        let mut join_set = JoinSet::new();
        for org in eligible {
            let signers = Arc::clone(&self.signers);
            let org = org.clone();
            let payload = envelope.payload().to_vec();
            let timeout = self.signer_timeout;

            join_set.spawn(async move {
                let result = match tokio::time::timeout(timeout, signers.sign(&org, &payload)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(SignerError::IdentityUnavailable {
                        org: org.clone(),
                        reason: "signing request timed out".to_string(),
                    }),
                };
                (org, result)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((org, Ok(signature))) => {
                    debug!("endorsement received from {}", org);
                    progress.on_signer_result(&org, true);
                    collected.insert(signature);

                    if policy.is_satisfied(&collected, eligible) {
                        // Merge responses that finished in the meantime,
                        // then cancel the rest.
                        while let Some(late) = join_set.try_join_next() {
                            if let Ok((late_org, Ok(late_signature))) = late {
                                progress.on_signer_result(&late_org, true);
                                collected.insert(late_signature);
                            }
                        }
                        join_set.abort_all();
                        info!(
                            endorsements = collected.len(),
                            "quorum reached"
                        );
                        return Ok(collected);
                    }
                }
                Ok((org, Err(e))) => {
                    warn!("signer {} failed: {}", org, e);
                    progress.on_signer_result(&org, false);
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    warn!("signer task join error: {}", e);
                }
            }
        }

        Err(CollectError::QuorumNotReached {
            obtained: collected.len(),
            required,
        })
    }
}

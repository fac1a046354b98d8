//! Reconfiguration session use case
//!
//! Orchestrates the full membership-change protocol end to end: fetch the
//! current configuration, decode it, compute the membership delta, build the
//! update envelope, collect a quorum of endorsements, submit, await the
//! commit, and synchronize the affected peer. The session owns retries,
//! restart-on-staleness, cancellation and the audit trail.

use crate::config::SessionParams;
use crate::ports::audit_sink::{AuditSink, NoAuditSink};
use crate::ports::config_codec::{CodecError, ConfigCodec};
use crate::ports::ledger_gateway::{CommitHandle, ConfigBlob, GatewayError, LedgerGateway};
use crate::ports::peer_admin::PeerAdministration;
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::signer_registry::SignerRegistry;
use crate::use_cases::collect_signatures::{CollectError, QuorumCollector};
use crate::use_cases::synchronize_membership::MembershipSynchronizer;
use reconfig_domain::{
    AuditRecord, ChannelId, ConfigSnapshot, MembershipError, MembershipOp, OpKind, OrgId,
    QuorumPolicy, SessionId, SessionPhase, SignatureSet, UpdateEnvelope, compute_delta,
};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors that can end a reconfiguration session
#[derive(Error, Debug)]
pub enum ReconfigError {
    #[error("ordering service unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelId),

    #[error("configuration block could not be decoded: {0}")]
    Codec(#[from] CodecError),

    #[error("invalid membership change: {0}")]
    InvalidMembershipChange(#[from] MembershipError),

    #[error("quorum not reached: {obtained} of {required} required endorsements")]
    QuorumNotReached { obtained: usize, required: usize },

    #[error("update submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("commit not observed before timeout")]
    CommitTimeout,

    #[error("membership change committed but synchronization failed: {0}")]
    SynchronizationFailed(String),

    #[error("session cancelled")]
    Cancelled,
}

impl ReconfigError {
    /// Stable identifier used in audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconfigError::GatewayUnavailable(_) => "gateway_unavailable",
            ReconfigError::ChannelNotFound(_) => "channel_not_found",
            ReconfigError::Codec(_) => "codec_error",
            ReconfigError::InvalidMembershipChange(_) => "invalid_membership_change",
            ReconfigError::QuorumNotReached { .. } => "quorum_not_reached",
            ReconfigError::SubmissionRejected(_) => "submission_rejected",
            ReconfigError::CommitTimeout => "commit_timeout",
            ReconfigError::SynchronizationFailed(_) => "synchronization_failed",
            ReconfigError::Cancelled => "cancelled",
        }
    }

    /// Whether the committed membership change survives this error.
    pub fn leaves_commit_intact(&self) -> bool {
        matches!(self, ReconfigError::SynchronizationFailed(_))
    }
}

/// Terminal report for a failed session: the error kind plus enough context
/// (channel, organization, operation, phase reached) to retry manually.
#[derive(Error, Debug)]
#[error("reconfiguration of {channel} ({op} {org}) failed at {phase_reached}: {error}")]
pub struct SessionFailure {
    pub session_id: SessionId,
    pub channel: ChannelId,
    pub org: OrgId,
    pub op: OpKind,
    pub phase_reached: SessionPhase,
    /// Set when the configuration change itself committed (synchronization
    /// failures only); the change is final even though the session failed.
    pub committed_sequence: Option<u64>,
    #[source]
    pub error: ReconfigError,
}

/// Input for one add/remove operation
#[derive(Debug, Clone)]
pub struct ReconfigInput {
    pub channel: ChannelId,
    pub org: OrgId,
    pub op: MembershipOp,
    /// Quorum policy the channel requires for configuration updates.
    pub policy: QuorumPolicy,
}

impl ReconfigInput {
    pub fn new(channel: impl Into<ChannelId>, org: impl Into<OrgId>, op: MembershipOp) -> Self {
        Self {
            channel: channel.into(),
            org: org.into(),
            op,
            policy: QuorumPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: QuorumPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Result of a completed session
#[derive(Debug)]
pub struct SessionOutcome {
    pub session_id: SessionId,
    pub final_phase: SessionPhase,
    /// Configuration sequence number after the committed update.
    pub committed_sequence: u64,
    /// Endorsements the submitted envelope carried.
    pub endorsements: usize,
    /// Rounds the session ran (1 unless it restarted after staleness).
    pub rounds: u32,
}

/// Mutable per-run state: identifiers plus the current phase.
struct SessionCtx {
    session_id: SessionId,
    channel: ChannelId,
    org: OrgId,
    op: OpKind,
    phase: SessionPhase,
}

/// Use case driving one channel membership reconfiguration.
///
/// At most one session may be active per channel at a time; the caller
/// enforces this (e.g. with a lock keyed by channel id), since concurrent
/// delta computation against the same base sequence would race. The session
/// detects (but cannot prevent) a concurrently landed update, surfacing it
/// as a rejected submission.
pub struct ReconfigurationSession<G, C, S, P>
where
    G: LedgerGateway + 'static,
    C: ConfigCodec + 'static,
    S: SignerRegistry + 'static,
    P: PeerAdministration + 'static,
{
    gateway: Arc<G>,
    codec: Arc<C>,
    collector: QuorumCollector<S>,
    synchronizer: MembershipSynchronizer<P>,
    audit: Arc<dyn AuditSink>,
    params: SessionParams,
    cancel: CancellationToken,
}

impl<G, C, S, P> ReconfigurationSession<G, C, S, P>
where
    G: LedgerGateway + 'static,
    C: ConfigCodec + 'static,
    S: SignerRegistry + 'static,
    P: PeerAdministration + 'static,
{
    pub fn new(gateway: Arc<G>, codec: Arc<C>, signers: Arc<S>, peers: Arc<P>) -> Self {
        let params = SessionParams::default();
        Self {
            gateway,
            codec,
            collector: QuorumCollector::new(signers).with_signer_timeout(params.signer_timeout),
            synchronizer: MembershipSynchronizer::new(peers),
            audit: Arc::new(NoAuditSink),
            params,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_params(mut self, params: SessionParams) -> Self {
        self.collector = self.collector.with_signer_timeout(params.signer_timeout);
        self.params = params;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Token observed at every phase boundary up to submission. Once the
    /// envelope is submitted the transaction may still commit, so the
    /// session ignores cancellation and observes the outcome instead.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the session with default (no-op) progress
    pub async fn execute(&self, input: ReconfigInput) -> Result<SessionOutcome, SessionFailure> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Execute the session with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: ReconfigInput,
        progress: &dyn ProgressNotifier,
    ) -> Result<SessionOutcome, SessionFailure> {
        let ReconfigInput {
            channel,
            org,
            op,
            policy,
        } = input;

        let mut ctx = SessionCtx {
            session_id: SessionId::generate(),
            channel,
            org,
            op: op.kind(),
            phase: SessionPhase::Init,
        };

        info!(
            session = %ctx.session_id,
            channel = %ctx.channel,
            org = %ctx.org,
            op = %ctx.op,
            "starting reconfiguration session"
        );
        progress.on_phase_start(&ctx.phase);

        let mut rounds: u32 = 0;
        let mut submitted_once = false;
        let mut endorsements = 0usize;

        let committed_sequence = loop {
            rounds += 1;

            // ---- Fetch ----
            if let Err(e) = self.ensure_live(&ctx) {
                return Err(self.fail(&mut ctx, e, None));
            }
            let blob = match self.fetch_with_retry(&ctx, progress).await {
                Ok(blob) => blob,
                Err(e) => return Err(self.fail(&mut ctx, e, None)),
            };
            self.advance(&mut ctx, SessionPhase::Fetched, progress);

            // ---- Decode ----
            let snapshot = match self.codec.decode(&blob).await {
                Ok(snapshot) => snapshot,
                Err(e) => return Err(self.fail(&mut ctx, e.into(), None)),
            };
            self.advance(&mut ctx, SessionPhase::Decoded, progress);

            // After an ambiguous commit, the re-fetched configuration is the
            // source of truth: if it already reflects the change, the update
            // landed.
            if submitted_once && change_applied(&snapshot, &ctx.org, ctx.op) {
                info!(
                    session = %ctx.session_id,
                    sequence = snapshot.sequence(),
                    "update observed on-chain after ambiguous commit"
                );
                self.advance(&mut ctx, SessionPhase::Committed, progress);
                break snapshot.sequence();
            }

            // ---- Delta ----
            let delta = match compute_delta(&snapshot, &ctx.org, &op) {
                Ok(delta) => delta,
                Err(e) => return Err(self.fail(&mut ctx, e.into(), None)),
            };
            self.advance(&mut ctx, SessionPhase::DeltaComputed, progress);

            // ---- Envelope ----
            let payload = match self.codec.encode_update(&ctx.channel, &delta).await {
                Ok(payload) => payload,
                Err(e) => return Err(self.fail(&mut ctx, e.into(), None)),
            };
            let envelope = UpdateEnvelope::new(ctx.channel.clone(), &delta, payload);
            self.advance(&mut ctx, SessionPhase::EnvelopeBuilt, progress);

            // ---- Collect signatures ----
            if let Err(e) = self.ensure_live(&ctx) {
                return Err(self.fail(&mut ctx, e, None));
            }
            self.advance(&mut ctx, SessionPhase::CollectingSignatures, progress);
            let eligible =
                QuorumCollector::<S>::eligible_signers(&snapshot.member_orgs(), &ctx.org, ctx.op);
            let signatures = match self
                .collector
                .collect_with_progress(&envelope, &policy, &eligible, progress)
                .await
            {
                Ok(signatures) => signatures,
                Err(CollectError::QuorumNotReached { obtained, required }) => {
                    let e = ReconfigError::QuorumNotReached { obtained, required };
                    return Err(self.fail(&mut ctx, e, None));
                }
            };
            endorsements = signatures.len();
            self.advance(&mut ctx, SessionPhase::QuorumReached, progress);

            // ---- Staleness re-validation ----
            // The sequence number is shared mutable state; confirm it is
            // still the one the delta was computed against before submitting.
            match self.current_sequence(&ctx, progress).await {
                Ok(current) if current != delta.base_sequence() => {
                    let detail = format!(
                        "base sequence {} superseded by {}",
                        delta.base_sequence(),
                        current
                    );
                    if rounds < self.params.max_rounds {
                        // Loop back; the loop head re-fetches and takes the
                        // QuorumReached -> Fetched restart edge.
                        warn!(session = %ctx.session_id, "{detail}; restarting from fetch");
                        continue;
                    }
                    return Err(self.fail(&mut ctx, ReconfigError::SubmissionRejected(detail), None));
                }
                Ok(_) => {}
                Err(e) => return Err(self.fail(&mut ctx, e, None)),
            }

            // ---- Submit ----
            if let Err(e) = self.ensure_live(&ctx) {
                return Err(self.fail(&mut ctx, e, None));
            }
            let handle = match self.submit_with_retry(&ctx, &envelope, &signatures, progress).await
            {
                Ok(handle) => handle,
                Err(ReconfigError::SubmissionRejected(reason)) => {
                    if rounds < self.params.max_rounds {
                        warn!(
                            session = %ctx.session_id,
                            "submission rejected ({reason}); restarting from fetch"
                        );
                        continue;
                    }
                    return Err(self.fail(&mut ctx, ReconfigError::SubmissionRejected(reason), None));
                }
                Err(e) => return Err(self.fail(&mut ctx, e, None)),
            };
            submitted_once = true;
            self.advance(&mut ctx, SessionPhase::Submitted, progress);

            // ---- Await commit ----
            match self
                .gateway
                .await_commit(&handle, self.params.commit_timeout)
                .await
            {
                Ok(sequence) => {
                    self.advance(&mut ctx, SessionPhase::Committed, progress);
                    break sequence;
                }
                Err(GatewayError::CommitTimeout(_)) | Err(GatewayError::Unavailable(_))
                    if rounds < self.params.max_rounds =>
                {
                    // Ambiguous: the update may or may not have landed.
                    // Re-fetch and let the decoded configuration decide.
                    warn!(
                        session = %ctx.session_id,
                        "commit not confirmed; re-fetching to resolve"
                    );
                    continue;
                }
                Err(GatewayError::CommitTimeout(_)) => {
                    return Err(self.fail(&mut ctx, ReconfigError::CommitTimeout, None));
                }
                Err(e) => {
                    return Err(self.fail(&mut ctx, map_gateway(e), None));
                }
            }
        };

        // ---- Synchronize ----
        self.advance(&mut ctx, SessionPhase::Synchronizing, progress);
        if let Err(e) = self
            .synchronizer
            .run(&ctx.channel, &ctx.org, ctx.op)
            .await
        {
            // The membership change is final on-chain; only synchronization
            // needs a manual retry.
            let error = ReconfigError::SynchronizationFailed(e.to_string());
            return Err(self.fail(&mut ctx, error, Some(committed_sequence)));
        }
        self.advance(&mut ctx, SessionPhase::Done, progress);

        info!(
            session = %ctx.session_id,
            sequence = committed_sequence,
            endorsements,
            rounds,
            "reconfiguration complete"
        );

        Ok(SessionOutcome {
            session_id: ctx.session_id,
            final_phase: SessionPhase::Done,
            committed_sequence,
            endorsements,
            rounds,
        })
    }

    // ==================== Phase bookkeeping ====================

    fn advance(&self, ctx: &mut SessionCtx, to: SessionPhase, progress: &dyn ProgressNotifier) {
        debug_assert!(
            ctx.phase.can_transition_to(&to),
            "illegal transition {} -> {}",
            ctx.phase,
            to
        );
        self.audit.record(&AuditRecord::transition(
            &ctx.session_id,
            &ctx.channel,
            &ctx.org,
            ctx.op,
            ctx.phase,
            to,
        ));
        debug!(session = %ctx.session_id, from = ctx.phase.as_str(), to = to.as_str(), "phase");
        ctx.phase = to;
        progress.on_phase_start(&ctx.phase);
    }

    fn fail(
        &self,
        ctx: &mut SessionCtx,
        error: ReconfigError,
        committed_sequence: Option<u64>,
    ) -> SessionFailure {
        let phase_reached = ctx.phase;
        self.audit.record(&AuditRecord::failure(
            &ctx.session_id,
            &ctx.channel,
            &ctx.org,
            ctx.op,
            phase_reached,
            error.kind(),
            error.to_string(),
        ));
        warn!(
            session = %ctx.session_id,
            phase = phase_reached.as_str(),
            error = error.kind(),
            "session failed"
        );
        ctx.phase = SessionPhase::Failed;
        SessionFailure {
            session_id: ctx.session_id.clone(),
            channel: ctx.channel.clone(),
            org: ctx.org.clone(),
            op: ctx.op,
            phase_reached,
            committed_sequence,
            error,
        }
    }

    fn ensure_live(&self, ctx: &SessionCtx) -> Result<(), ReconfigError> {
        if ctx.phase.accepts_cancellation() && self.cancel.is_cancelled() {
            return Err(ReconfigError::Cancelled);
        }
        Ok(())
    }

    // ==================== Gateway helpers ====================

    async fn fetch_with_retry(
        &self,
        ctx: &SessionCtx,
        progress: &dyn ProgressNotifier,
    ) -> Result<ConfigBlob, ReconfigError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let reason = match tokio::time::timeout(
                self.params.call_timeout,
                self.gateway.fetch_config(&ctx.channel),
            )
            .await
            {
                Ok(Ok(blob)) => return Ok(blob),
                Ok(Err(GatewayError::Unavailable(reason))) => reason,
                Ok(Err(GatewayError::ChannelNotFound(channel))) => {
                    return Err(ReconfigError::ChannelNotFound(channel));
                }
                Ok(Err(other)) => return Err(map_gateway(other)),
                Err(_) => "configuration fetch timed out".to_string(),
            };

            if attempt >= self.params.max_gateway_attempts {
                return Err(ReconfigError::GatewayUnavailable(reason));
            }
            let delay = self.params.backoff_delay(attempt);
            warn!(attempt, ?delay, "fetch failed ({reason}); backing off");
            progress.on_retry(&ctx.phase, attempt, delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn submit_with_retry(
        &self,
        ctx: &SessionCtx,
        envelope: &UpdateEnvelope,
        signatures: &SignatureSet,
        progress: &dyn ProgressNotifier,
    ) -> Result<CommitHandle, ReconfigError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let reason = match tokio::time::timeout(
                self.params.call_timeout,
                self.gateway.submit(envelope, signatures),
            )
            .await
            {
                Ok(Ok(handle)) => return Ok(handle),
                Ok(Err(GatewayError::Rejected(reason))) => {
                    return Err(ReconfigError::SubmissionRejected(reason));
                }
                Ok(Err(GatewayError::Unavailable(reason))) => reason,
                Ok(Err(other)) => return Err(map_gateway(other)),
                Err(_) => "submission timed out".to_string(),
            };

            if attempt >= self.params.max_gateway_attempts {
                return Err(ReconfigError::GatewayUnavailable(reason));
            }
            let delay = self.params.backoff_delay(attempt);
            warn!(attempt, ?delay, "submit failed ({reason}); backing off");
            progress.on_retry(&ctx.phase, attempt, delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Current configuration sequence number as the network sees it.
    async fn current_sequence(
        &self,
        ctx: &SessionCtx,
        progress: &dyn ProgressNotifier,
    ) -> Result<u64, ReconfigError> {
        let blob = self.fetch_with_retry(ctx, progress).await?;
        let snapshot = self.codec.decode(&blob).await?;
        Ok(snapshot.sequence())
    }
}

fn change_applied(snapshot: &ConfigSnapshot, org: &OrgId, op: OpKind) -> bool {
    match op {
        OpKind::Add => snapshot.has_org(org),
        OpKind::Remove => !snapshot.has_org(org),
    }
}

fn map_gateway(error: GatewayError) -> ReconfigError {
    match error {
        GatewayError::Unavailable(reason) => ReconfigError::GatewayUnavailable(reason),
        GatewayError::ChannelNotFound(channel) => ReconfigError::ChannelNotFound(channel),
        GatewayError::Rejected(reason) => ReconfigError::SubmissionRejected(reason),
        GatewayError::CommitTimeout(_) => ReconfigError::CommitTimeout,
    }
}

#[cfg(test)]
mod tests;

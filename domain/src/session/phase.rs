//! Session phase state machine.

use serde::{Deserialize, Serialize};

/// Phase of a reconfiguration session.
///
/// The happy path runs `Init` through `Done` in order; `Failed` is reachable
/// from any non-terminal phase. Two restart edges exist for the cases where
/// the base configuration moved under the session: back to `Fetched` after a
/// rejected submission or an ambiguous commit, and a shortcut from `Decoded`
/// to `Committed` when re-fetching reveals the update already landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Session created, nothing fetched yet.
    Init,
    /// Latest configuration block fetched from the ordering service.
    Fetched,
    /// Block decoded into a structured configuration snapshot.
    Decoded,
    /// Membership delta computed against the snapshot.
    DeltaComputed,
    /// Delta wrapped into an update envelope.
    EnvelopeBuilt,
    /// Endorsements being collected from organizational signers.
    CollectingSignatures,
    /// Collected signatures satisfy the quorum policy.
    QuorumReached,
    /// Envelope submitted to the ordering service.
    Submitted,
    /// Update committed on-chain.
    Committed,
    /// Joining/departing peer synchronizing with the channel.
    Synchronizing,
    /// Session completed.
    Done,
    /// Session failed.
    Failed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &str {
        match self {
            SessionPhase::Init => "init",
            SessionPhase::Fetched => "fetched",
            SessionPhase::Decoded => "decoded",
            SessionPhase::DeltaComputed => "delta_computed",
            SessionPhase::EnvelopeBuilt => "envelope_built",
            SessionPhase::CollectingSignatures => "collecting_signatures",
            SessionPhase::QuorumReached => "quorum_reached",
            SessionPhase::Submitted => "submitted",
            SessionPhase::Committed => "committed",
            SessionPhase::Synchronizing => "synchronizing",
            SessionPhase::Done => "done",
            SessionPhase::Failed => "failed",
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            SessionPhase::Init => "Init",
            SessionPhase::Fetched => "Fetched",
            SessionPhase::Decoded => "Decoded",
            SessionPhase::DeltaComputed => "Delta Computed",
            SessionPhase::EnvelopeBuilt => "Envelope Built",
            SessionPhase::CollectingSignatures => "Collecting Signatures",
            SessionPhase::QuorumReached => "Quorum Reached",
            SessionPhase::Submitted => "Submitted",
            SessionPhase::Committed => "Committed",
            SessionPhase::Synchronizing => "Synchronizing",
            SessionPhase::Done => "Done",
            SessionPhase::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Done | SessionPhase::Failed)
    }

    /// Cancellation is honoured up to the point of submission; a submitted
    /// transaction may still commit, so the session must observe the outcome.
    pub fn accepts_cancellation(&self) -> bool {
        matches!(
            self,
            SessionPhase::Init
                | SessionPhase::Fetched
                | SessionPhase::Decoded
                | SessionPhase::DeltaComputed
                | SessionPhase::EnvelopeBuilt
                | SessionPhase::CollectingSignatures
                | SessionPhase::QuorumReached
        )
    }

    /// Whether moving from this phase to `next` is a legal transition.
    pub fn can_transition_to(&self, next: &SessionPhase) -> bool {
        use SessionPhase::*;
        if *next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Init, Fetched)
                | (Fetched, Decoded)
                | (Decoded, DeltaComputed)
                | (DeltaComputed, EnvelopeBuilt)
                | (EnvelopeBuilt, CollectingSignatures)
                | (CollectingSignatures, QuorumReached)
                | (QuorumReached, Submitted)
                | (Submitted, Committed)
                | (Committed, Synchronizing)
                | (Synchronizing, Done)
                // restart after staleness or ambiguous commit
                | (QuorumReached, Fetched)
                | (Submitted, Fetched)
                // ambiguous commit resolved by observing the update on-chain
                | (Decoded, Committed)
        )
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

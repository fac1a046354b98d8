use super::*;
use async_trait::async_trait;
use crate::ports::signer_registry::SignerError;
use reconfig_domain::{ConfigDelta, EndorsementSignature, OrgDefinition};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

// ==================== Scripted adapters ====================

/// In-memory ledger holding one channel's membership and sequence number.
/// Submissions are validated against the current sequence, so two sessions
/// racing on the same base configuration behave like the real network.
struct MemoryLedger {
    state: Mutex<LedgerState>,
}

#[derive(Default)]
struct LedgerState {
    channel: String,
    sequence: u64,
    members: Vec<String>,
    /// Fail this many fetches with `Unavailable` first.
    fail_fetches: u32,
    /// Reject the next submit and bump the sequence, simulating a
    /// concurrently landed update.
    reject_next_with_bump: bool,
    /// Answer this many `await_commit` calls with `CommitTimeout` (the
    /// update still applies on submit).
    commit_timeouts: u32,
    /// Base sequences of every attempted submit, accepted or not.
    submit_attempts: Vec<u64>,
}

impl MemoryLedger {
    fn new(channel: &str, sequence: u64, members: &[&str]) -> Self {
        Self {
            state: Mutex::new(LedgerState {
                channel: channel.to_string(),
                sequence,
                members: members.iter().map(|m| m.to_string()).collect(),
                ..Default::default()
            }),
        }
    }

    fn members(&self) -> Vec<String> {
        self.state.lock().unwrap().members.clone()
    }

    fn sequence(&self) -> u64 {
        self.state.lock().unwrap().sequence
    }

    fn submit_attempts(&self) -> Vec<u64> {
        self.state.lock().unwrap().submit_attempts.clone()
    }

    fn config_doc(state: &LedgerState) -> Value {
        let mut groups = serde_json::Map::new();
        for member in &state.members {
            groups.insert(
                member.clone(),
                json!({"values": {"MSP": {"value": {"config": {"name": member}}}}}),
            );
        }
        json!({
            "sequence": state.sequence,
            "channel_group": {"groups": {"Application": {"groups": groups}}}
        })
    }
}

#[async_trait]
impl LedgerGateway for MemoryLedger {
    async fn fetch_config(&self, channel: &ChannelId) -> Result<ConfigBlob, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if state.channel != channel.as_str() {
            return Err(GatewayError::ChannelNotFound(channel.clone()));
        }
        if state.fail_fetches > 0 {
            state.fail_fetches -= 1;
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        let doc = Self::config_doc(&state);
        Ok(ConfigBlob::new(serde_json::to_vec(&doc).unwrap()))
    }

    async fn submit(
        &self,
        envelope: &UpdateEnvelope,
        signatures: &SignatureSet,
    ) -> Result<CommitHandle, GatewayError> {
        assert!(!signatures.is_empty(), "submit without endorsements");
        let update: Value = serde_json::from_slice(envelope.payload()).unwrap();
        let base = update["base_sequence"].as_u64().unwrap();

        let mut state = self.state.lock().unwrap();
        state.submit_attempts.push(base);

        if state.reject_next_with_bump {
            state.reject_next_with_bump = false;
            state.sequence += 1;
            return Err(GatewayError::Rejected(
                "another update landed first".to_string(),
            ));
        }
        if base != state.sequence {
            return Err(GatewayError::Rejected(format!(
                "stale base sequence {} (current {})",
                base, state.sequence
            )));
        }

        let org = update["org"].as_str().unwrap().to_string();
        match update["kind"].as_str().unwrap() {
            "add" => state.members.push(org),
            "remove" => state.members.retain(|m| *m != org),
            other => panic!("unexpected kind {other}"),
        }
        state.sequence += 1;

        Ok(CommitHandle {
            channel: envelope.channel().clone(),
            expected_sequence: state.sequence,
        })
    }

    async fn await_commit(
        &self,
        _handle: &CommitHandle,
        timeout: Duration,
    ) -> Result<u64, GatewayError> {
        let mut state = self.state.lock().unwrap();
        if state.commit_timeouts > 0 {
            state.commit_timeouts -= 1;
            return Err(GatewayError::CommitTimeout(timeout));
        }
        Ok(state.sequence)
    }
}

/// Codec working directly in the JSON document form.
struct TestCodec;

#[async_trait]
impl ConfigCodec for TestCodec {
    async fn decode(&self, blob: &ConfigBlob) -> Result<ConfigSnapshot, CodecError> {
        let doc: Value = serde_json::from_slice(blob.as_bytes())
            .map_err(|e| CodecError::MalformedBlock(e.to_string()))?;
        let sequence = doc["sequence"].as_u64().unwrap_or(0);
        Ok(ConfigSnapshot::original(sequence, doc))
    }

    async fn encode(&self, snapshot: &ConfigSnapshot) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(snapshot.document()).map_err(|e| CodecError::Encode(e.to_string()))
    }

    async fn encode_update(
        &self,
        channel: &ChannelId,
        delta: &ConfigDelta,
    ) -> Result<Vec<u8>, CodecError> {
        let update = json!({
            "channel_id": channel.as_str(),
            "base_sequence": delta.base_sequence(),
            "org": delta.org().as_str(),
            "kind": delta.kind().as_str(),
        });
        serde_json::to_vec(&update).map_err(|e| CodecError::Encode(e.to_string()))
    }
}

struct ScriptedSigners {
    available: HashSet<OrgId>,
}

impl ScriptedSigners {
    fn new(available: &[&str]) -> Self {
        Self {
            available: available.iter().map(|s| OrgId::new(*s)).collect(),
        }
    }
}

#[async_trait]
impl SignerRegistry for ScriptedSigners {
    async fn sign(
        &self,
        org: &OrgId,
        payload: &[u8],
    ) -> Result<EndorsementSignature, SignerError> {
        if self.available.contains(org) {
            Ok(EndorsementSignature::new(
                org.clone(),
                payload.to_vec(),
                format!("Admin@{}", org),
            ))
        } else {
            Err(SignerError::IdentityUnavailable {
                org: org.clone(),
                reason: "credential store offline".to_string(),
            })
        }
    }
}

#[derive(Default)]
struct RecordingPeers {
    calls: Mutex<Vec<String>>,
    fail_pull: bool,
}

#[async_trait]
impl PeerAdministration for RecordingPeers {
    async fn pull_history(
        &self,
        channel: &ChannelId,
        org: &OrgId,
    ) -> Result<u64, crate::ports::peer_admin::SyncError> {
        if self.fail_pull {
            return Err(crate::ports::peer_admin::SyncError::HistoryPull(
                "delivery service down".to_string(),
            ));
        }
        self.calls
            .lock()
            .unwrap()
            .push(format!("pull:{}:{}", channel, org));
        Ok(1)
    }

    async fn activate(
        &self,
        channel: &ChannelId,
        org: &OrgId,
    ) -> Result<(), crate::ports::peer_admin::SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("activate:{}:{}", channel, org));
        Ok(())
    }

    async fn decommission(
        &self,
        channel: &ChannelId,
        org: &OrgId,
    ) -> Result<(), crate::ports::peer_admin::SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("decommission:{}:{}", channel, org));
        Ok(())
    }
}

#[derive(Default)]
struct VecAudit {
    records: Mutex<Vec<AuditRecord>>,
}

impl AuditSink for VecAudit {
    fn record(&self, record: &AuditRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

// ==================== Harness ====================

fn fast_params() -> SessionParams {
    SessionParams::default()
        .with_backoff_base(Duration::from_millis(1))
        .with_commit_timeout(Duration::from_millis(50))
}

type TestSession = ReconfigurationSession<MemoryLedger, TestCodec, ScriptedSigners, RecordingPeers>;

fn session(
    ledger: Arc<MemoryLedger>,
    signers: ScriptedSigners,
    peers: Arc<RecordingPeers>,
) -> TestSession {
    ReconfigurationSession::new(ledger, Arc::new(TestCodec), Arc::new(signers), peers)
        .with_params(fast_params())
}

fn add_org3_input() -> ReconfigInput {
    ReconfigInput::new(
        "mychannel",
        "Org3MSP",
        MembershipOp::Add(OrgDefinition::minimal("Org3MSP")),
    )
}

// ==================== Scenarios ====================

#[tokio::test]
async fn test_add_org_reaches_done() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    let peers = Arc::new(RecordingPeers::default());
    let audit = Arc::new(VecAudit::default());
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP", "Org2MSP", "Org3MSP"]),
        Arc::clone(&peers),
    )
    .with_audit(Arc::clone(&audit) as Arc<dyn AuditSink>);

    let outcome = session.execute(add_org3_input()).await.unwrap();

    assert_eq!(outcome.final_phase, SessionPhase::Done);
    assert_eq!(outcome.committed_sequence, 4);
    assert_eq!(outcome.endorsements, 3);
    assert_eq!(outcome.rounds, 1);
    assert_eq!(ledger.members(), vec!["Org1MSP", "Org2MSP", "Org3MSP"]);

    // Peer synchronized after the commit, not before
    let calls = peers.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            "pull:mychannel:Org3MSP".to_string(),
            "activate:mychannel:Org3MSP".to_string(),
        ]
    );

    // Audit trail walks the happy path in order
    let transitions: Vec<(SessionPhase, SessionPhase)> = audit
        .records
        .lock()
        .unwrap()
        .iter()
        .map(|r| (r.from, r.to))
        .collect();
    let expected = [
        (SessionPhase::Init, SessionPhase::Fetched),
        (SessionPhase::Fetched, SessionPhase::Decoded),
        (SessionPhase::Decoded, SessionPhase::DeltaComputed),
        (SessionPhase::DeltaComputed, SessionPhase::EnvelopeBuilt),
        (SessionPhase::EnvelopeBuilt, SessionPhase::CollectingSignatures),
        (SessionPhase::CollectingSignatures, SessionPhase::QuorumReached),
        (SessionPhase::QuorumReached, SessionPhase::Submitted),
        (SessionPhase::Submitted, SessionPhase::Committed),
        (SessionPhase::Committed, SessionPhase::Synchronizing),
        (SessionPhase::Synchronizing, SessionPhase::Done),
    ];
    assert_eq!(transitions, expected);
}

#[tokio::test]
async fn test_transient_fetch_failures_are_retried() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    ledger.state.lock().unwrap().fail_fetches = 2;
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP", "Org2MSP", "Org3MSP"]),
        Arc::new(RecordingPeers::default()),
    );

    let outcome = session.execute(add_org3_input()).await.unwrap();
    assert_eq!(outcome.final_phase, SessionPhase::Done);
}

#[tokio::test]
async fn test_gateway_exhaustion_fails_session() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    ledger.state.lock().unwrap().fail_fetches = 99;
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP", "Org2MSP", "Org3MSP"]),
        Arc::new(RecordingPeers::default()),
    );

    let failure = session.execute(add_org3_input()).await.unwrap_err();
    assert!(matches!(failure.error, ReconfigError::GatewayUnavailable(_)));
    assert_eq!(failure.phase_reached, SessionPhase::Init);
}

#[tokio::test]
async fn test_channel_not_found_is_fatal() {
    let ledger = Arc::new(MemoryLedger::new("otherchannel", 0, &["Org1MSP"]));
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP"]),
        Arc::new(RecordingPeers::default()),
    );

    let failure = session.execute(add_org3_input()).await.unwrap_err();
    assert!(matches!(failure.error, ReconfigError::ChannelNotFound(_)));
    assert_eq!(failure.channel.as_str(), "mychannel");
    assert_eq!(failure.op, OpKind::Add);
}

#[tokio::test]
async fn test_concurrent_add_exactly_one_wins() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    let signers = &["Org1MSP", "Org2MSP", "Org3MSP"];
    let peers = Arc::new(RecordingPeers::default());

    // No restart rounds: the loser must surface the rejection it observed.
    let params = fast_params().with_max_rounds(1);
    let first = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(signers),
        Arc::clone(&peers),
    )
    .with_params(params.clone());
    let second = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(signers),
        Arc::clone(&peers),
    )
    .with_params(params);

    let (a, b) = tokio::join!(first.execute(add_org3_input()), second.execute(add_org3_input()));

    let (wins, losses): (Vec<_>, Vec<_>) = [a, b].into_iter().partition(|r| r.is_ok());
    assert_eq!(wins.len(), 1, "exactly one session must commit");
    assert_eq!(losses.len(), 1);

    let failure = losses.into_iter().next().unwrap().unwrap_err();
    assert!(
        matches!(
            failure.error,
            ReconfigError::SubmissionRejected(_) | ReconfigError::InvalidMembershipChange(_)
        ),
        "loser saw {:?}",
        failure.error
    );

    // Org3 was admitted exactly once
    let members = ledger.members();
    assert_eq!(
        members.iter().filter(|m| *m == "Org3MSP").count(),
        1,
        "members: {members:?}"
    );
}

#[tokio::test]
async fn test_remove_without_quorum_leaves_membership_unchanged() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    let peers = Arc::new(RecordingPeers::default());
    // Channel policy demands both existing orgs; only Org1 can sign, and the
    // departing Org2 is not an eligible signer anyway.
    let policy: QuorumPolicy = "Org1MSP,Org2MSP".parse().unwrap();
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP"]),
        Arc::clone(&peers),
    );

    let input = ReconfigInput::new("mychannel", "Org2MSP", MembershipOp::Remove)
        .with_policy(policy);
    let failure = session.execute(input).await.unwrap_err();

    assert!(matches!(
        failure.error,
        ReconfigError::QuorumNotReached {
            obtained: 1,
            required: 2
        }
    ));
    assert_eq!(failure.phase_reached, SessionPhase::CollectingSignatures);
    assert_eq!(ledger.members(), vec!["Org1MSP", "Org2MSP"]);
    assert_eq!(ledger.sequence(), 3);
    assert!(peers.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rejected_submit_restarts_against_new_sequence() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    ledger.state.lock().unwrap().reject_next_with_bump = true;
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP", "Org2MSP", "Org3MSP"]),
        Arc::new(RecordingPeers::default()),
    );

    let outcome = session.execute(add_org3_input()).await.unwrap();

    assert_eq!(outcome.final_phase, SessionPhase::Done);
    assert_eq!(outcome.rounds, 2);
    // The retry computed its delta against the advanced sequence, not the
    // stale one.
    assert_eq!(ledger.submit_attempts(), vec![3, 4]);
    assert_eq!(ledger.sequence(), 5);
}

#[tokio::test]
async fn test_commit_timeout_resolved_by_refetch() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    ledger.state.lock().unwrap().commit_timeouts = 1;
    let peers = Arc::new(RecordingPeers::default());
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP", "Org2MSP", "Org3MSP"]),
        Arc::clone(&peers),
    );

    let outcome = session.execute(add_org3_input()).await.unwrap();

    // The update landed despite the missed commit notification; the re-fetch
    // recognised it instead of submitting twice.
    assert_eq!(outcome.final_phase, SessionPhase::Done);
    assert_eq!(ledger.submit_attempts(), vec![3]);
    assert_eq!(
        ledger.members(),
        vec!["Org1MSP", "Org2MSP", "Org3MSP"]
    );
    assert_eq!(peers.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_synchronization_failure_preserves_commit() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    let peers = Arc::new(RecordingPeers {
        fail_pull: true,
        ..Default::default()
    });
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP", "Org2MSP", "Org3MSP"]),
        Arc::clone(&peers),
    );

    let failure = session.execute(add_org3_input()).await.unwrap_err();

    assert!(matches!(
        failure.error,
        ReconfigError::SynchronizationFailed(_)
    ));
    assert!(failure.error.leaves_commit_intact());
    assert_eq!(failure.phase_reached, SessionPhase::Synchronizing);
    assert_eq!(failure.committed_sequence, Some(4));
    // The membership change is final even though the session failed
    assert_eq!(ledger.members(), vec!["Org1MSP", "Org2MSP", "Org3MSP"]);
}

#[tokio::test]
async fn test_cancellation_before_submit() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP", "Org2MSP", "Org3MSP"]),
        Arc::new(RecordingPeers::default()),
    )
    .with_cancellation(cancel);

    let failure = session.execute(add_org3_input()).await.unwrap_err();

    assert!(matches!(failure.error, ReconfigError::Cancelled));
    assert!(ledger.submit_attempts().is_empty());
    assert_eq!(ledger.members(), vec!["Org1MSP", "Org2MSP"]);
}

#[tokio::test]
async fn test_add_existing_org_is_invalid() {
    let ledger = Arc::new(MemoryLedger::new("mychannel", 3, &["Org1MSP", "Org2MSP"]));
    let session = session(
        Arc::clone(&ledger),
        ScriptedSigners::new(&["Org1MSP", "Org2MSP"]),
        Arc::new(RecordingPeers::default()),
    );

    let input = ReconfigInput::new(
        "mychannel",
        "Org2MSP",
        MembershipOp::Add(OrgDefinition::minimal("Org2MSP")),
    );
    let failure = session.execute(input).await.unwrap_err();

    assert!(matches!(
        failure.error,
        ReconfigError::InvalidMembershipChange(MembershipError::AlreadyMember(_))
    ));
    assert_eq!(failure.phase_reached, SessionPhase::Decoded);
}

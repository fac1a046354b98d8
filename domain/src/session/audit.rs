//! Session identifiers and audit records.
//!
//! Every phase transition of a reconfiguration session is captured as an
//! [`AuditRecord`] so an interrupted process can report (or resume) what
//! actually happened. Records are plain serializable values; durable
//! storage is an infrastructure concern.

use crate::channel::{ChannelId, OrgId};
use crate::delta::OpKind;
use crate::session::phase::SessionPhase;
use serde::{Deserialize, Serialize};

/// Unique identifier for one reconfiguration session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a SessionId from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a new unique SessionId using a UUID-like format.
    pub fn generate() -> Self {
        Self(uuid_v4())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for SessionId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One phase-transition record in a session's audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub session_id: SessionId,
    pub channel: ChannelId,
    pub org: OrgId,
    pub op: OpKind,
    pub from: SessionPhase,
    pub to: SessionPhase,
    /// Error kind, present only on transitions into `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form detail (error message, sequence numbers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditRecord {
    /// Record a successful phase transition.
    pub fn transition(
        session_id: &SessionId,
        channel: &ChannelId,
        org: &OrgId,
        op: OpKind,
        from: SessionPhase,
        to: SessionPhase,
    ) -> Self {
        Self {
            session_id: session_id.clone(),
            channel: channel.clone(),
            org: org.clone(),
            op,
            from,
            to,
            error: None,
            detail: None,
        }
    }

    /// Record a transition into `Failed`, preserving the phase reached and
    /// the error kind.
    pub fn failure(
        session_id: &SessionId,
        channel: &ChannelId,
        org: &OrgId,
        op: OpKind,
        phase_reached: SessionPhase,
        error_kind: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.clone(),
            channel: channel.clone(),
            org: org.clone(),
            op,
            from: phase_reached,
            to: SessionPhase::Failed,
            error: Some(error_kind.into()),
            detail: Some(detail.into()),
        }
    }
}

/// Generate a simple UUID v4 (without external dependency)
fn uuid_v4() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    // Simple pseudo-random based on time
    let nanos = now.as_nanos();
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        (nanos >> 96) as u32,
        (nanos >> 80) as u16,
        (nanos >> 64) as u16 & 0x0fff,
        ((nanos >> 48) as u16 & 0x3fff) | 0x8000,
        (nanos & 0xffffffffffff) as u64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generate_format() {
        let id = SessionId::generate();
        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[0].len(), 8);
        assert!(parts[2].starts_with('4'));
    }

    #[test]
    fn test_transition_record_roundtrip() {
        let record = AuditRecord::transition(
            &SessionId::new("s-1"),
            &ChannelId::new("mychannel"),
            &OrgId::new("Org3MSP"),
            OpKind::Add,
            SessionPhase::Init,
            SessionPhase::Fetched,
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("error"));
        let back: AuditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_failure_record_carries_error_kind() {
        let record = AuditRecord::failure(
            &SessionId::new("s-1"),
            &ChannelId::new("mychannel"),
            &OrgId::new("Org2MSP"),
            OpKind::Remove,
            SessionPhase::CollectingSignatures,
            "quorum_not_reached",
            "1 of 2 required endorsements",
        );
        assert_eq!(record.to, SessionPhase::Failed);
        assert_eq!(record.error.as_deref(), Some("quorum_not_reached"));
    }
}

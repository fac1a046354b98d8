//! Domain error types

use crate::channel::OrgId;
use thiserror::Error;

/// Validation errors raised while computing a membership change.
///
/// These are user-correctable input errors: the channel configuration and
/// the requested operation disagree, or the supplied organization definition
/// is not usable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MembershipError {
    #[error("organization {0} is already a member of the channel")]
    AlreadyMember(OrgId),

    #[error("organization {0} is not a member of the channel")]
    NotAMember(OrgId),

    #[error("organization definition for {org} is incomplete: {reason}")]
    IncompleteDefinition { org: OrgId, reason: String },

    #[error("configuration document is malformed: {0}")]
    MalformedConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_member_display() {
        let err = MembershipError::AlreadyMember(OrgId::new("Org3MSP"));
        assert_eq!(
            err.to_string(),
            "organization Org3MSP is already a member of the channel"
        );
    }

    #[test]
    fn test_incomplete_definition_display() {
        let err = MembershipError::IncompleteDefinition {
            org: OrgId::new("Org3MSP"),
            reason: "no root certificates".to_string(),
        };
        assert!(err.to_string().contains("Org3MSP"));
        assert!(err.to_string().contains("no root certificates"));
    }
}

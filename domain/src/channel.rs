//! Channel and organization identifiers.
//!
//! # Identifiers
//! - [`ChannelId`] - Name of a channel within the network
//! - [`OrgId`] - An organization's MSP identifier (e.g. "Org1MSP")
//!
//! # Entities
//! - [`Channel`] - A channel reference together with its current
//!   configuration sequence number

use serde::{Deserialize, Serialize};

/// Name of a channel within the network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for ChannelId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An organization's MSP identifier.
///
/// This is the administrative identity under which an organization signs
/// configuration updates (e.g. "Org1MSP").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrgId(String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T: Into<String>> From<T> for OrgId {
    fn from(s: T) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A channel reference with its current configuration sequence number.
///
/// The sequence number advances only when a configuration update commits;
/// it is the one piece of externally shared mutable state every session must
/// re-validate before submitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    id: ChannelId,
    sequence: u64,
}

impl Channel {
    pub fn new(id: impl Into<ChannelId>, sequence: u64) -> Self {
        Self {
            id: id.into(),
            sequence,
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Record a committed update, advancing the sequence number.
    pub fn advance_to(&mut self, sequence: u64) {
        debug_assert!(sequence >= self.sequence);
        self.sequence = sequence;
    }
}

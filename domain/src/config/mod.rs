//! Structured channel configuration documents

pub mod org_definition;
pub mod snapshot;

pub use org_definition::OrgDefinition;
pub use snapshot::{ConfigSnapshot, SnapshotTag};

//! Infrastructure layer for channel-reconfig
//!
//! This crate contains adapters that implement the ports defined in the
//! application layer: the peer-CLI ledger gateway, the JSON configuration
//! codec, the filesystem signer registry, peer administration, the JSONL
//! audit log, and network profile loading.

pub mod admin;
pub mod codec;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod signing;

// Re-export commonly used types
pub use admin::PeerCliAdministration;
pub use codec::JsonConfigCodec;
pub use config::{NetworkProfile, OrgProfile, ProfileError, ProfileLoader};
pub use gateway::PeerCliGateway;
pub use logging::JsonlAuditLog;
pub use signing::FsSignerRegistry;

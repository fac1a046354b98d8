//! Application layer for channel-reconfig
//!
//! This crate contains the reconfiguration use cases and the port
//! definitions they depend on. It depends only on the domain layer;
//! implementations of the ports (network gateway, codec, signer registry,
//! peer administration, audit log) live in the infrastructure layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::SessionParams;
pub use ports::{
    audit_sink::{AuditSink, NoAuditSink},
    config_codec::{CodecError, ConfigCodec},
    ledger_gateway::{CommitHandle, ConfigBlob, GatewayError, LedgerGateway},
    peer_admin::{PeerAdministration, SyncError},
    progress::{NoProgress, ProgressNotifier},
    signer_registry::{SignerError, SignerRegistry},
};
pub use use_cases::collect_signatures::{CollectError, QuorumCollector};
pub use use_cases::run_reconfiguration::{
    ReconfigError, ReconfigInput, ReconfigurationSession, SessionFailure, SessionOutcome,
};
pub use use_cases::synchronize_membership::MembershipSynchronizer;

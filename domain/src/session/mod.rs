//! Reconfiguration session phases and audit records

pub mod audit;
pub mod phase;

pub use audit::{AuditRecord, SessionId};
pub use phase::SessionPhase;

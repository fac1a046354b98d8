//! Port for durable session audit logging.
//!
//! Defines the [`AuditSink`] trait for recording phase-transition records.
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures the session's
//! ordered phase history in a machine-readable, durable form so an
//! interrupted process can resume or report accurately.

use reconfig_domain::AuditRecord;

/// Port for recording session audit events.
///
/// The `record` method is intentionally synchronous and non-fallible to
/// avoid disrupting the session flow; sink failures are logged by the
/// implementation, never propagated.
pub trait AuditSink: Send + Sync {
    /// Record one phase-transition event.
    fn record(&self, record: &AuditRecord);
}

/// No-op implementation for tests and when auditing is disabled.
pub struct NoAuditSink;

impl AuditSink for NoAuditSink {
    fn record(&self, _record: &AuditRecord) {}
}

//! Progress notification port
//!
//! Defines the interface for reporting progress while a reconfiguration
//! session runs.

use reconfig_domain::{OrgId, SessionPhase};
use std::time::Duration;

/// Callback for progress updates during a reconfiguration session
///
/// Implementations live in the caller (e.g. the CLI) and can display
/// progress in various ways.
pub trait ProgressNotifier: Send + Sync {
    /// Called when the session enters a phase
    fn on_phase_start(&self, phase: &SessionPhase);

    /// Called when a signer request resolves during signature collection
    fn on_signer_result(&self, org: &OrgId, success: bool);

    /// Called before a backoff retry of a transient gateway failure
    fn on_retry(&self, phase: &SessionPhase, attempt: u32, delay: Duration) {
        let _ = (phase, attempt, delay);
    }
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_phase_start(&self, _phase: &SessionPhase) {}
    fn on_signer_result(&self, _org: &OrgId, _success: bool) {}
}

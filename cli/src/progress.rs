//! Console progress reporting

use reconfig_application::ProgressNotifier;
use reconfig_domain::{OrgId, SessionPhase};
use std::time::Duration;

/// Prints phase transitions and signer outcomes to stdout.
pub struct ConsoleProgress;

impl ProgressNotifier for ConsoleProgress {
    fn on_phase_start(&self, phase: &SessionPhase) {
        println!("==> {}", phase.display_name());
    }

    fn on_signer_result(&self, org: &OrgId, success: bool) {
        if success {
            println!("    endorsement from {}", org);
        } else {
            println!("    no endorsement from {} (signer unavailable)", org);
        }
    }

    fn on_retry(&self, phase: &SessionPhase, attempt: u32, delay: Duration) {
        println!(
            "    {} attempt {} failed, retrying in {:?}",
            phase.display_name(),
            attempt,
            delay
        );
    }
}

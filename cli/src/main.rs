//! CLI entrypoint for channel-reconfig
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod cli;
mod progress;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use progress::ConsoleProgress;
use reconfig_application::{
    AuditSink, MembershipSynchronizer, NoAuditSink, NoProgress, ProgressNotifier, ReconfigInput,
    ReconfigurationSession, SessionFailure,
};
use reconfig_domain::{ChannelId, MembershipOp, OpKind, OrgDefinition, OrgId, QuorumPolicy};
use reconfig_infrastructure::{
    FsSignerRegistry, JsonConfigCodec, JsonlAuditLog, NetworkProfile, PeerCliAdministration,
    PeerCliGateway, ProfileLoader,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let profile = ProfileLoader::load(cli.profile.as_ref()).context("loading network profile")?;
    info!(
        orgs = profile.orgs.len(),
        submitter = %profile.network.submitter,
        "network profile loaded"
    );

    match cli.command {
        Command::AddOrg {
            channel,
            org,
            definition,
            policy,
        } => {
            let definition = read_definition(&definition)?;
            let input = ReconfigInput::new(channel, org, MembershipOp::Add(definition))
                .with_policy(resolve_policy(&profile, policy.as_deref())?);
            run_session(&profile, input, cli.quiet).await
        }
        Command::RemoveOrg {
            channel,
            org,
            policy,
        } => {
            let input = ReconfigInput::new(channel, org, MembershipOp::Remove)
                .with_policy(resolve_policy(&profile, policy.as_deref())?);
            run_session(&profile, input, cli.quiet).await
        }
        Command::Sync { channel, org, op } => {
            let kind: OpKind = op.parse().map_err(anyhow::Error::msg)?;
            run_sync(&profile, ChannelId::new(channel), OrgId::new(org), kind).await
        }
    }
}

fn read_definition(path: &Path) -> Result<OrgDefinition> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading organization definition {}", path.display()))?;
    let definition: OrgDefinition = serde_json::from_slice(&bytes)
        .with_context(|| format!("parsing organization definition {}", path.display()))?;
    Ok(definition)
}

fn resolve_policy(profile: &NetworkProfile, flag: Option<&str>) -> Result<QuorumPolicy> {
    match flag {
        Some(policy) => policy.parse().map_err(anyhow::Error::msg),
        None => profile.policy().map_err(Into::into),
    }
}

async fn run_session(profile: &NetworkProfile, input: ReconfigInput, quiet: bool) -> Result<()> {
    // === Dependency Injection ===
    let gateway = Arc::new(PeerCliGateway::new(profile)?);
    let codec = Arc::new(JsonConfigCodec);
    let signers = Arc::new(FsSignerRegistry::from_profile(profile));
    let peers = Arc::new(PeerCliAdministration::new(profile)?);
    let audit: Arc<dyn AuditSink> =
        match JsonlAuditLog::new(profile.network.artifacts_dir.join("reconfig-audit.jsonl")) {
            Some(log) => Arc::new(log),
            None => Arc::new(NoAuditSink),
        };

    // Interrupts cancel the session while that is still possible; after
    // submission the session observes the outcome instead.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling before submission");
                cancel.cancel();
            }
        });
    }

    let session = ReconfigurationSession::new(gateway, codec, signers, peers)
        .with_params(profile.session.clone())
        .with_audit(audit)
        .with_cancellation(cancel);

    let progress: &dyn ProgressNotifier = if quiet { &NoProgress } else { &ConsoleProgress };
    let channel = input.channel.clone();

    match session.execute_with_progress(input, progress).await {
        Ok(outcome) => {
            println!(
                "Reconfiguration of {} complete: sequence {}, {} endorsements ({} round{})",
                channel,
                outcome.committed_sequence,
                outcome.endorsements,
                outcome.rounds,
                if outcome.rounds == 1 { "" } else { "s" },
            );
            Ok(())
        }
        Err(failure) => report_failure(failure),
    }
}

async fn run_sync(
    profile: &NetworkProfile,
    channel: ChannelId,
    org: OrgId,
    kind: OpKind,
) -> Result<()> {
    let peers = Arc::new(PeerCliAdministration::new(profile)?);
    let synchronizer = MembershipSynchronizer::new(peers);

    synchronizer
        .run(&channel, &org, kind)
        .await
        .with_context(|| format!("synchronizing {} on {}", org, channel))?;
    println!("Synchronization of {} on {} complete", org, channel);
    Ok(())
}

fn report_failure(failure: SessionFailure) -> Result<()> {
    eprintln!(
        "Reconfiguration failed at {}: {}",
        failure.phase_reached, failure.error
    );
    if let Some(sequence) = failure.committed_sequence {
        eprintln!(
            "The membership change committed (sequence {}); retry synchronization with:",
            sequence
        );
        eprintln!(
            "  channel-reconfig sync --channel {} --org {} --op {}",
            failure.channel, failure.org, failure.op
        );
    }
    Err(failure.into())
}

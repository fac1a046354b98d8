//! Command-line interface definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Channel membership reconfiguration for a permissioned ledger network
#[derive(Parser, Debug)]
#[command(name = "channel-reconfig", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the network profile (defaults to ./reconfig.toml)
    #[arg(long, global = true)]
    pub profile: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add an organization to a running channel
    AddOrg {
        /// Channel to reconfigure
        #[arg(long)]
        channel: String,

        /// MSP identifier of the joining organization
        #[arg(long)]
        org: String,

        /// JSON file with the organization's membership definition
        #[arg(long)]
        definition: PathBuf,

        /// Quorum policy override ("all", "atleast:N", or an MSP list)
        #[arg(long)]
        policy: Option<String>,
    },

    /// Remove an organization from a running channel
    RemoveOrg {
        /// Channel to reconfigure
        #[arg(long)]
        channel: String,

        /// MSP identifier of the departing organization
        #[arg(long)]
        org: String,

        /// Quorum policy override ("all", "atleast:N", or an MSP list)
        #[arg(long)]
        policy: Option<String>,
    },

    /// Retry peer synchronization for an already-committed change
    Sync {
        /// Channel the change committed on
        #[arg(long)]
        channel: String,

        /// MSP identifier of the affected organization
        #[arg(long)]
        org: String,

        /// The committed operation (add or remove)
        #[arg(long)]
        op: String,
    },
}

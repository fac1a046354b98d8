//! Ledger gateway adapters

pub mod peer_cli;

pub use peer_cli::PeerCliGateway;

//! Peer administration adapters

pub mod peer_cli_admin;

pub use peer_cli_admin::PeerCliAdministration;

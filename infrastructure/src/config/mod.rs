//! Network profile configuration from TOML + environment

pub mod loader;
pub mod profile;

pub use loader::ProfileLoader;
pub use profile::{NetworkProfile, NetworkSection, OrgProfile, ProfileError};

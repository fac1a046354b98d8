//! Signer registry adapters

pub mod fs_registry;

pub use fs_registry::FsSignerRegistry;

//! Configuration for the vault engine.

pub mod settings;

pub use settings::{Mode, SecretSource, Settings, VaultConfig};

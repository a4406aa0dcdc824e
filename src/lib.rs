//! Strongroom — an encrypted, tamper-evident, hardware-bound key/value
//! vault for desktop applications.
//!
//! One [`VaultEngine`] instance owns all vault state.  Construct it with
//! a [`VaultConfig`], call [`VaultEngine::init`], then use the data
//! operations; every mutation is flushed to disk before the call
//! returns.
//!
//! Cross-process access to one vault directory is unsupported:
//! concurrent writers can corrupt the container, and guarding against
//! that is the caller's responsibility.

pub mod audit;
pub mod config;
pub mod crypto;
pub mod decoy;
pub mod destruct;
pub mod engine;
pub mod errors;
pub mod hardware;
pub mod integrity;
pub mod plugins;
pub mod store;

// Re-export the public surface.
pub use audit::{AuditAction, AuditEntry, AuditLog, AuditOutcome};
pub use config::{Mode, SecretSource, Settings, VaultConfig};
pub use destruct::{DestructCallback, DestructEvent, DestructTrigger};
pub use engine::{VaultEngine, VaultStatus};
pub use errors::{Result, VaultError};
pub use hardware::MachineIdentity;
pub use plugins::{HookDecision, VaultPlugin};
pub use store::{VaultMetadata, VaultRecord};

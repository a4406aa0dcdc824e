//! Store module — the on-disk shape of a vault.
//!
//! This module provides:
//! - `VaultRecord` / `RecordEntry`, the in-memory key/value map (`record`)
//! - `VaultMetadata`, the per-vault header data (`metadata`)
//! - Binary envelopes and atomic writes (`format`)
//! - `PersistenceStore`, the full write/read pipeline (`persistence`)

pub mod format;
pub mod metadata;
pub mod persistence;
pub mod record;

// Re-export the most commonly used items.
pub use metadata::{VaultMetadata, SCHEMA_VERSION};
pub use persistence::{
    PersistenceStore, CHECKSUMS_FILE, CONTAINER_FILE, DECOY_DIR, METADATA_FILE,
};
pub use record::{RecordEntry, VaultRecord};

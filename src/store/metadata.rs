//! Vault metadata — created once, read on every init.
//!
//! The metadata is persisted encrypted in its own file so a reader can
//! validate hardware binding and detect config drift before paying the
//! cost of decrypting the (potentially much larger) record container.
//! The salt and KDF costs are duplicated in the file's cleartext prefix
//! because they are inputs to key derivation; on load the encrypted copy
//! must match the prefix, so swapping the cleartext salt is detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::format::{base64_decode, base64_encode};
use crate::crypto::kdf::KdfParams;

/// Current metadata schema version.
pub const SCHEMA_VERSION: u8 = 1;

/// Per-vault metadata.  Read-only after creation except `last_modified`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultMetadata {
    /// Metadata schema version.
    pub version: u8,

    /// Salt for Argon2id key derivation (base64 in JSON).
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub salt: Vec<u8>,

    /// Argon2 costs used at creation; re-opens derive with exactly these.
    pub kdf: KdfParams,

    /// When the vault was first initialized.
    pub created_at: DateTime<Utc>,

    /// Updated on every successful mutation.
    pub last_modified: DateTime<Utc>,

    /// Base64 SHA-256 of the machine identity, or the `unbound` sentinel
    /// when hardware binding is disabled.
    pub fingerprint_hash: String,

    /// Hash of the behavior-relevant configuration at creation time.
    /// Drift against the running config is audited, not fatal.
    pub config_hash: String,
}

impl VaultMetadata {
    pub fn new(
        salt: Vec<u8>,
        kdf: KdfParams,
        fingerprint_hash: String,
        config_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            version: SCHEMA_VERSION,
            salt,
            kdf,
            created_at: now,
            last_modified: now,
            fingerprint_hash,
            config_hash,
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

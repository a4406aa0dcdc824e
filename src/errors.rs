use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in Strongroom.
///
/// The taxonomy matters more than the messages: `Integrity` and
/// `HardwareMismatch` form the tamper class and are the only variants
/// that can route an operation into the self-destruct path.
#[derive(Debug, Error)]
pub enum VaultError {
    // --- Configuration ---
    #[error("Config error: {0}")]
    Config(String),

    // --- Crypto ---
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed — wrong key or corrupted data")]
    Decryption,

    // --- Tamper class ---
    #[error("Integrity violation in '{file}': {reason}")]
    Integrity { file: String, reason: String },

    #[error("Hardware fingerprint mismatch — vault is bound to another machine")]
    HardwareMismatch,

    // --- Plugin hooks ---
    #[error("Operation rejected by plugin '{plugin}': {reason}")]
    PluginRejected { plugin: String, reason: String },

    // --- Lifecycle preconditions ---
    #[error("Vault is not initialized — call init() first")]
    NotInitialized,

    #[error("Vault has been destroyed — all data operations are rejected")]
    VaultDestroyed,

    // --- Storage ---
    #[error("Vault not found at {0}")]
    VaultNotFound(PathBuf),

    #[error("Invalid vault format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl VaultError {
    /// True for the tamper class: errors that may trigger destruction.
    pub fn is_violation(&self) -> bool {
        matches!(
            self,
            VaultError::Integrity { .. } | VaultError::HardwareMismatch
        )
    }
}

/// Convenience type alias for Strongroom results.
pub type Result<T> = std::result::Result<T, VaultError>;

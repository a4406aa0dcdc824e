//! Passphrase-based key derivation using Argon2id.
//!
//! Argon2id is memory-hard on purpose: an attacker who steals the vault
//! files must pay the configured memory cost for every guess, which is
//! what makes offline brute-force against a copied container expensive.
//! Cost parameters are configurable but floored — a config file cannot
//! talk the vault into a trivially crackable setting.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

use crate::errors::{Result, VaultError};

/// Salt length in bytes (256 bits).
pub const SALT_LEN: usize = 32;

/// Derived key length in bytes (256 bits, AES-256).
pub const KEY_LEN: usize = 32;

/// Minimum tolerated memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id cost parameters.
///
/// Stored in the vault metadata at creation so a re-open always derives
/// with the exact settings the vault was created under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Iteration count (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Derive a 32-byte key from a passphrase and salt with explicit costs.
///
/// Deterministic: the same passphrase + salt + params always produce the
/// same key.
pub fn derive_key(passphrase: &[u8], salt: &[u8], kdf: &KdfParams) -> Result<[u8; KEY_LEN]> {
    if kdf.memory_kib < MIN_MEMORY_KIB {
        return Err(VaultError::KeyDerivation(format!(
            "memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
            kdf.memory_kib
        )));
    }
    if kdf.iterations < 1 {
        return Err(VaultError::KeyDerivation(
            "iterations must be at least 1".into(),
        ));
    }
    if kdf.parallelism < 1 {
        return Err(VaultError::KeyDerivation(
            "parallelism must be at least 1".into(),
        ));
    }

    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(KEY_LEN))
        .map_err(|e| VaultError::KeyDerivation(format!("invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut key)
        .map_err(|e| VaultError::KeyDerivation(format!("Argon2id hashing failed: {e}")))?;

    Ok(key)
}

/// Generate a cryptographically random 32-byte salt.
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    salt
}

//! AES-256-GCM authenticated encryption.
//!
//! Every `encrypt` call draws a fresh random 96-bit nonce — nonce reuse
//! under the same key voids the AEAD guarantees, so nothing here ever
//! accepts a caller-supplied nonce.  The nonce is prepended to the
//! ciphertext so a single opaque blob carries everything needed for
//! decryption:
//!
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//!
//! A failed tag check is reported as [`VaultError::Decryption`].  Callers
//! in the persistence layer fold that into the tamper class: a forged
//! ciphertext and a corrupted file are indistinguishable by design.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::errors::{Result, VaultError};

/// AES-256-GCM nonce length in bytes.
const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under a 32-byte `key`, returning nonce || ciphertext.
pub fn encrypt(key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| VaultError::Encryption(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| VaultError::Encryption(format!("AEAD failure: {e}")))?;

    let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Any failure — short input, bad key, failed tag verification — collapses
/// into the single [`VaultError::Decryption`] variant so an attacker
/// learns nothing about which stage rejected the input.
pub fn decrypt(key: &[u8], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN {
        return Err(VaultError::Decryption);
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| VaultError::Decryption)?;

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| VaultError::Decryption)
}

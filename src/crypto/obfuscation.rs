//! Keyed byte-stream obfuscation, the outermost layer of the container
//! pipeline.
//!
//! After compression the payload is masked with a ChaCha20 keystream
//! under a key derived independently of the AEAD key, then sealed with
//! an HMAC-SHA256 stage tag keyed by the same obfuscation key.  The tag
//! lets a reader reject a tampered file before spending any work on
//! decompression or decryption, and a mismatch here is a tamper signal
//! of the same class as an AEAD failure.
//!
//! Blob layout:
//!
//!   [ 12-byte nonce | masked payload | 32-byte HMAC over nonce+masked ]

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{ChaCha20, Key, Nonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::errors::{Result, VaultError};

/// ChaCha20 nonce length in bytes.
const NONCE_LEN: usize = 12;

/// HMAC-SHA256 stage-tag length in bytes.
const TAG_LEN: usize = 32;

/// Mask `data` with a fresh-nonce ChaCha20 keystream and append the
/// keyed stage tag.
pub fn apply(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let mut masked = data.to_vec();
    let mut cipher = ChaCha20::new(Key::from_slice(key), Nonce::from_slice(&nonce));
    cipher.apply_keystream(&mut masked);

    let mut blob = Vec::with_capacity(NONCE_LEN + masked.len() + TAG_LEN);
    blob.extend_from_slice(&nonce);
    blob.extend_from_slice(&masked);

    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .map_err(|e| VaultError::Encryption(format!("invalid HMAC key: {e}")))?;
    mac.update(&blob);
    blob.extend_from_slice(&mac.finalize().into_bytes());
    Ok(blob)
}

/// Verify the stage tag and unmask a blob produced by [`apply`].
///
/// The tag is verified in constant time; any mismatch or truncation is
/// reported as [`VaultError::Decryption`] so callers treat it exactly
/// like a failed AEAD tag.
pub fn strip(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>> {
    if blob.len() < NONCE_LEN + TAG_LEN {
        return Err(VaultError::Decryption);
    }

    let (body, stored_tag) = blob.split_at(blob.len() - TAG_LEN);

    let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(|_| VaultError::Decryption)?;
    mac.update(body);
    mac.verify_slice(stored_tag)
        .map_err(|_| VaultError::Decryption)?;

    let (nonce, masked) = body.split_at(NONCE_LEN);
    let mut data = masked.to_vec();
    let mut cipher = ChaCha20::new(Key::from_slice(key), Nonce::from_slice(nonce));
    cipher.apply_keystream(&mut data);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let key = [0x5Au8; 32];
        let data = b"compressed ciphertext bytes";

        let blob = apply(&key, data).unwrap();
        assert_eq!(blob.len(), NONCE_LEN + data.len() + TAG_LEN);

        let recovered = strip(&key, &blob).unwrap();
        assert_eq!(recovered, data);
    }

    #[test]
    fn output_differs_per_call() {
        let key = [0x5Au8; 32];
        assert_ne!(apply(&key, b"same").unwrap(), apply(&key, b"same").unwrap());
    }

    #[test]
    fn flipped_byte_is_rejected_by_tag() {
        let key = [0x77u8; 32];
        let mut blob = apply(&key, b"payload").unwrap();
        blob[NONCE_LEN + 2] ^= 0x80;
        assert!(matches!(strip(&key, &blob), Err(VaultError::Decryption)));
    }

    #[test]
    fn wrong_key_is_rejected_by_tag() {
        let blob = apply(&[0x01u8; 32], b"payload").unwrap();
        assert!(matches!(
            strip(&[0x02u8; 32], &blob),
            Err(VaultError::Decryption)
        ));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let key = [0x01u8; 32];
        assert!(strip(&key, &[0u8; 10]).is_err());
    }
}

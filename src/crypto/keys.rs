//! Master key handling and HKDF-SHA256 sub-key derivation.
//!
//! A single Argon2-derived master key fans out into independent sub-keys,
//! one per concern, via HKDF with distinct `info` strings:
//!
//! - record key      — encrypts the container payload
//! - metadata key    — encrypts the metadata payload
//! - obfuscation key — drives the keystream layered over the container
//!
//! The record and obfuscation keys additionally take the vault's binding
//! string (the creation-time hardware fingerprint hash, or the unbound
//! sentinel) as HKDF salt: a hardware-bound container cannot be decrypted
//! on another machine even if the fingerprint comparison were bypassed.
//! The metadata key deliberately does *not* depend on the binding, so the
//! stored fingerprint can be read and compared before any record work.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::crypto::kdf::KEY_LEN;
use crate::errors::{Result, VaultError};

/// HKDF context strings. Each sub-key gets its own domain separator.
const INFO_RECORD: &[u8] = b"strongroom:record-key";
const INFO_METADATA: &[u8] = b"strongroom:metadata-key";
const INFO_OBFUSCATION: &[u8] = b"strongroom:obfuscation-key";
const INFO_METADATA_OBFUSCATION: &[u8] = b"strongroom:metadata-obfuscation-key";

/// The Argon2-derived master key, zeroed on drop.
///
/// Held only while the vault is in the ready state; every lifecycle
/// transition out of ready drops it.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
    /// Creation-time binding (fingerprint hash or sentinel). Not secret.
    #[zeroize(skip)]
    binding: String,
}

impl MasterKey {
    pub fn new(bytes: [u8; KEY_LEN], binding: String) -> Self {
        Self { bytes, binding }
    }

    /// Same key material under a different binding string.  Used once
    /// per open: metadata is decrypted first, then the key is rebound to
    /// the fingerprint recorded at creation.
    pub fn rebind(&self, binding: String) -> Self {
        Self {
            bytes: self.bytes,
            binding,
        }
    }

    pub fn binding(&self) -> &str {
        &self.binding
    }

    /// Sub-key for encrypting the record container (binding-dependent).
    pub fn record_key(&self) -> Result<[u8; KEY_LEN]> {
        expand(&self.bytes, Some(self.binding.as_bytes()), INFO_RECORD)
    }

    /// Sub-key for encrypting the metadata file (binding-independent).
    pub fn metadata_key(&self) -> Result<[u8; KEY_LEN]> {
        expand(&self.bytes, None, INFO_METADATA)
    }

    /// Obfuscation sub-key for the metadata file (binding-independent —
    /// metadata must be readable before the binding is known).
    pub fn metadata_obfuscation_key(&self) -> Result<[u8; KEY_LEN]> {
        expand(&self.bytes, None, INFO_METADATA_OBFUSCATION)
    }

    /// Sub-key for the post-compression obfuscation keystream
    /// (binding-dependent).
    pub fn obfuscation_key(&self) -> Result<[u8; KEY_LEN]> {
        expand(&self.bytes, Some(self.binding.as_bytes()), INFO_OBFUSCATION)
    }
}

/// HKDF-SHA256 extract-and-expand.
///
/// The input already has full entropy from Argon2id; the optional salt
/// carries the binding string into the derivation.
fn expand(ikm: &[u8], salt: Option<&[u8]>, info: &[u8]) -> Result<[u8; KEY_LEN]> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);

    let mut okm = [0u8; KEY_LEN];
    hk.expand(info, &mut okm)
        .map_err(|e| VaultError::KeyDerivation(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

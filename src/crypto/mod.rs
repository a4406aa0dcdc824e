//! Cryptographic primitives for Strongroom.
//!
//! This module provides:
//! - AES-256-GCM encryption and decryption (`encryption`)
//! - Argon2id passphrase-based key derivation (`kdf`)
//! - Master-key wrapper and HKDF sub-key derivation (`keys`)
//! - ChaCha20 keystream obfuscation with stage checksum (`obfuscation`)

pub mod encryption;
pub mod kdf;
pub mod keys;
pub mod obfuscation;

// Re-export the most commonly used items.
pub use encryption::{decrypt, encrypt};
pub use kdf::{derive_key, generate_salt, KdfParams};
pub use keys::MasterKey;

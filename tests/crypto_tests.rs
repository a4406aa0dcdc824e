//! Integration tests for the Strongroom crypto layer.

use strongroom::crypto::kdf::{derive_key, generate_salt, KdfParams, SALT_LEN};
use strongroom::crypto::keys::MasterKey;
use strongroom::crypto::{decrypt, encrypt, obfuscation};
use strongroom::errors::VaultError;

/// Minimum-cost Argon2 settings keep the suite fast.
fn cheap_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    }
}

// ---------------------------------------------------------------------------
// AEAD round-trip
// ---------------------------------------------------------------------------

#[test]
fn encrypt_decrypt_roundtrip() {
    let key = [0xABu8; 32];
    let plaintext = b"{\"api_token\":\"sk-12345\"}";

    let blob = encrypt(&key, plaintext).expect("encrypt should succeed");

    // Blob must carry nonce (12) + tag (16) on top of the plaintext.
    assert!(blob.len() >= plaintext.len() + 28);

    let recovered = decrypt(&key, &blob).expect("decrypt should succeed");
    assert_eq!(recovered, plaintext);
}

#[test]
fn ciphertext_differs_each_call() {
    let key = [0xCDu8; 32];
    let a = encrypt(&key, b"same plaintext").unwrap();
    let b = encrypt(&key, b"same plaintext").unwrap();
    assert_ne!(a, b, "fresh nonce per call must change the output");
}

#[test]
fn decrypt_with_wrong_key_fails() {
    let blob = encrypt(&[0x11u8; 32], b"secret").unwrap();
    assert!(matches!(
        decrypt(&[0x22u8; 32], &blob),
        Err(VaultError::Decryption)
    ));
}

// ---------------------------------------------------------------------------
// Key derivation
// ---------------------------------------------------------------------------

#[test]
fn derived_key_is_deterministic() {
    let salt = [9u8; SALT_LEN];
    let a = derive_key(b"passphrase", &salt, &cheap_kdf()).unwrap();
    let b = derive_key(b"passphrase", &salt, &cheap_kdf()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn different_passphrases_diverge() {
    let salt = [9u8; SALT_LEN];
    let a = derive_key(b"passphrase-one", &salt, &cheap_kdf()).unwrap();
    let b = derive_key(b"passphrase-two", &salt, &cheap_kdf()).unwrap();
    assert_ne!(a, b);
}

#[test]
fn cost_parameters_change_the_key() {
    let salt = [9u8; SALT_LEN];
    let heavier = KdfParams {
        iterations: 2,
        ..cheap_kdf()
    };
    let a = derive_key(b"passphrase", &salt, &cheap_kdf()).unwrap();
    let b = derive_key(b"passphrase", &salt, &heavier).unwrap();
    assert_ne!(a, b);
}

#[test]
fn generated_salts_are_unique() {
    assert_ne!(generate_salt(), generate_salt());
}

// ---------------------------------------------------------------------------
// Sub-key fan-out and binding
// ---------------------------------------------------------------------------

#[test]
fn binding_isolates_record_key_across_machines() {
    let here = MasterKey::new([0x42; 32], "machine-a-hash".into());
    let there = here.rebind("machine-b-hash".into());

    // The record encrypted here cannot decrypt there.
    let blob = encrypt(&here.record_key().unwrap(), b"bound secret").unwrap();
    assert!(decrypt(&there.record_key().unwrap(), &blob).is_err());

    // But the metadata key is binding-independent.
    assert_eq!(
        here.metadata_key().unwrap(),
        there.metadata_key().unwrap()
    );
}

// ---------------------------------------------------------------------------
// Full pipeline layering
// ---------------------------------------------------------------------------

#[test]
fn obfuscation_layers_over_encryption() {
    let master = MasterKey::new([0x37; 32], "unbound".into());
    let plaintext = b"layered pipeline input";

    let encrypted = encrypt(&master.record_key().unwrap(), plaintext).unwrap();
    let compressed = lz4_flex::compress_prepend_size(&encrypted);
    let obfuscated = obfuscation::apply(&master.obfuscation_key().unwrap(), &compressed).unwrap();

    // Unwind in reverse order.
    let stripped = obfuscation::strip(&master.obfuscation_key().unwrap(), &obfuscated).unwrap();
    let decompressed = lz4_flex::decompress_size_prepended(&stripped).unwrap();
    let recovered = decrypt(&master.record_key().unwrap(), &decompressed).unwrap();

    assert_eq!(recovered, plaintext);
}

#[test]
fn obfuscation_tamper_is_caught_before_decryption() {
    let key = [0x66u8; 32];
    let mut blob = obfuscation::apply(&key, b"inner bytes").unwrap();
    let mid = blob.len() / 2;
    blob[mid] ^= 0x01;

    assert!(matches!(
        obfuscation::strip(&key, &blob),
        Err(VaultError::Decryption)
    ));
}

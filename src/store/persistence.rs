//! Persistence — the serialize→encrypt→compress→obfuscate pipeline and
//! the files it produces.
//!
//! Write pipeline for the container (and, with its own sub-key, the
//! metadata file):
//!
//! 1. canonical JSON bytes
//! 2. AES-256-GCM encrypt
//! 3. LZ4 compress (`compress_prepend_size`)
//! 4. ChaCha20 keystream obfuscation + stage checksum
//! 5. envelope + atomic write
//!
//! Encryption runs *before* compression.  That ordering is the on-disk
//! contract; reordering the stages changes the format and every
//! existing vault would stop reading.
//!
//! On read, each stage unwinds in reverse and any failure — bad
//! envelope, stage-checksum mismatch, LZ4 error, AEAD failure, JSON
//! parse error — is mapped to an [`VaultError::Integrity`] for the file
//! involved.  A reader cannot distinguish corruption from attack, so the
//! persistence layer does not try.

use std::fs;
use std::path::{Path, PathBuf};

use zeroize::Zeroize;

use super::format::{self, EnvelopeKind, KdfPrefix};
use super::metadata::VaultMetadata;
use super::record::VaultRecord;
use crate::crypto::keys::MasterKey;
use crate::crypto::{encryption, obfuscation};
use crate::errors::{Result, VaultError};

/// Logical file names inside the vault directory.
pub const CONTAINER_FILE: &str = "container";
pub const METADATA_FILE: &str = "metadata";
pub const CHECKSUMS_FILE: &str = "checksums";
pub const DECOY_DIR: &str = "decoys";

/// Reads and writes the vault's on-disk artifacts under one directory.
pub struct PersistenceStore {
    dir: PathBuf,
}

impl PersistenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn container_path(&self) -> PathBuf {
        self.dir.join(CONTAINER_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    // ------------------------------------------------------------------
    // Record container
    // ------------------------------------------------------------------

    /// Run the full write pipeline and atomically replace the container.
    pub fn save_record(&self, record: &VaultRecord, master: &MasterKey) -> Result<()> {
        let json = serde_json::to_vec(record)
            .map_err(|e| VaultError::Serialization(format!("record: {e}")))?;

        let mut record_key = master.record_key()?;
        let encrypted = encryption::encrypt(&record_key, &json);
        record_key.zeroize();
        let encrypted = encrypted?;

        let compressed = lz4_flex::compress_prepend_size(&encrypted);

        let mut obf_key = master.obfuscation_key()?;
        let obfuscated = obfuscation::apply(&obf_key, &compressed);
        obf_key.zeroize();
        let obfuscated = obfuscated?;

        let envelope = format::encode(EnvelopeKind::Container, &obfuscated);
        format::write_atomic(&self.container_path(), &envelope)
    }

    /// Reverse the pipeline.  Every stage failure is a tamper signal.
    pub fn load_record(&self, master: &MasterKey) -> Result<VaultRecord> {
        let path = self.container_path();
        if !path.exists() {
            return Err(VaultError::VaultNotFound(path));
        }
        let data = fs::read(&path)?;

        let body = format::decode(EnvelopeKind::Container, &data)
            .map_err(|e| tampered(CONTAINER_FILE, &e.to_string()))?;

        let mut obf_key = master.obfuscation_key()?;
        let compressed = obfuscation::strip(&obf_key, body);
        obf_key.zeroize();
        let compressed =
            compressed.map_err(|_| tampered(CONTAINER_FILE, "obfuscation checksum mismatch"))?;

        let encrypted = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|_| tampered(CONTAINER_FILE, "LZ4 stream invalid"))?;

        let mut record_key = master.record_key()?;
        let json = encryption::decrypt(&record_key, &encrypted);
        record_key.zeroize();
        let json = json.map_err(|_| tampered(CONTAINER_FILE, "AEAD authentication failed"))?;

        serde_json::from_slice(&json)
            .map_err(|e| tampered(CONTAINER_FILE, &format!("record JSON: {e}")))
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Write metadata through the same pipeline, with the salt and KDF
    /// costs duplicated in the cleartext prefix.
    pub fn save_metadata(&self, meta: &VaultMetadata, master: &MasterKey) -> Result<()> {
        let json = serde_json::to_vec(meta)
            .map_err(|e| VaultError::Serialization(format!("metadata: {e}")))?;

        let mut meta_key = master.metadata_key()?;
        let encrypted = encryption::encrypt(&meta_key, &json);
        meta_key.zeroize();
        let encrypted = encrypted?;

        let compressed = lz4_flex::compress_prepend_size(&encrypted);

        let mut obf_key = master.metadata_obfuscation_key()?;
        let obfuscated = obfuscation::apply(&obf_key, &compressed);
        obf_key.zeroize();
        let obfuscated = obfuscated?;

        let prefix = KdfPrefix {
            salt: meta.salt.clone(),
            params: meta.kdf,
        };
        let body = format::encode_keyed_body(&prefix, &obfuscated)?;
        let envelope = format::encode(EnvelopeKind::Metadata, &body);
        format::write_atomic(&self.metadata_path(), &envelope)
    }

    /// Read just the cleartext KDF prefix — the inputs key derivation
    /// needs before anything can be decrypted.  `Ok(None)` means no
    /// metadata file exists yet (first init).
    pub fn read_kdf_prefix(&self) -> Result<Option<KdfPrefix>> {
        let path = self.metadata_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;

        let body = format::decode(EnvelopeKind::Metadata, &data)
            .map_err(|e| tampered(METADATA_FILE, &e.to_string()))?;
        let (prefix, _) =
            format::decode_keyed_body(body).map_err(|e| tampered(METADATA_FILE, &e.to_string()))?;
        Ok(Some(prefix))
    }

    /// Decrypt and validate the full metadata.
    ///
    /// The salt inside the encrypted payload must equal the cleartext
    /// prefix salt — a swapped prefix is tampering.
    pub fn load_metadata(&self, master: &MasterKey) -> Result<VaultMetadata> {
        let path = self.metadata_path();
        if !path.exists() {
            return Err(VaultError::VaultNotFound(path));
        }
        let data = fs::read(&path)?;

        let body = format::decode(EnvelopeKind::Metadata, &data)
            .map_err(|e| tampered(METADATA_FILE, &e.to_string()))?;
        let (prefix, payload) =
            format::decode_keyed_body(body).map_err(|e| tampered(METADATA_FILE, &e.to_string()))?;

        let mut obf_key = master.metadata_obfuscation_key()?;
        let compressed = obfuscation::strip(&obf_key, payload);
        obf_key.zeroize();
        let compressed =
            compressed.map_err(|_| tampered(METADATA_FILE, "obfuscation checksum mismatch"))?;

        let encrypted = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|_| tampered(METADATA_FILE, "LZ4 stream invalid"))?;

        let mut meta_key = master.metadata_key()?;
        let json = encryption::decrypt(&meta_key, &encrypted);
        meta_key.zeroize();
        let json = json.map_err(|_| tampered(METADATA_FILE, "AEAD authentication failed"))?;

        let meta: VaultMetadata = serde_json::from_slice(&json)
            .map_err(|e| tampered(METADATA_FILE, &format!("metadata JSON: {e}")))?;

        if meta.salt != prefix.salt {
            return Err(tampered(METADATA_FILE, "cleartext salt does not match payload"));
        }

        Ok(meta)
    }
}

fn tampered(file: &str, reason: &str) -> VaultError {
    VaultError::Integrity {
        file: file.to_string(),
        reason: reason.to_string(),
    }
}

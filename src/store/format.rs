//! Binary envelope format and atomic file writes.
//!
//! Every Strongroom artifact that carries encrypted payload is wrapped in
//! a small binary envelope:
//!
//! ```text
//! [SRVT: 4 bytes][version: 1 byte][kind: 1 byte][body]
//! ```
//!
//! For the container the body is the pipeline output.  For the metadata
//! file and export blobs the body starts with a cleartext KDF prefix —
//! the salt and Argon2 cost parameters a reader needs *before* it can
//! derive the key that decrypts the rest:
//!
//! ```text
//! [salt: 32 bytes][memory_kib: u32 LE][iterations: u32 LE][parallelism: u32 LE][payload]
//! ```
//!
//! Writes are atomic: a hidden temp file in the same directory, fsynced,
//! then renamed over the target, with a best-effort directory sync so the
//! rename itself is durable.  A reader can never observe a half-written
//! envelope.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::crypto::kdf::{KdfParams, SALT_LEN};
use crate::errors::{Result, VaultError};

/// Magic bytes at the start of every envelope.
const MAGIC: &[u8; 4] = b"SRVT";

/// Current envelope format version.
pub const FORMAT_VERSION: u8 = 1;

/// Fixed prefix: 4 (magic) + 1 (version) + 1 (kind).
const HEADER_LEN: usize = 6;

/// Cleartext KDF prefix: salt + three u32 cost fields.
const KDF_PREFIX_LEN: usize = SALT_LEN + 12;

/// What an envelope carries; mixing kinds up is a format error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvelopeKind {
    Container = 1,
    Metadata = 2,
    Export = 3,
}

/// Salt and KDF costs stored in the clear ahead of an encrypted payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfPrefix {
    pub salt: Vec<u8>,
    pub params: KdfParams,
}

/// Wrap a body in the magic/version/kind envelope.
pub fn encode(kind: EnvelopeKind, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + body.len());
    buf.extend_from_slice(MAGIC);
    buf.push(FORMAT_VERSION);
    buf.push(kind as u8);
    buf.extend_from_slice(body);
    buf
}

/// Validate the envelope header and return the body.
pub fn decode(kind: EnvelopeKind, data: &[u8]) -> Result<&[u8]> {
    if data.len() < HEADER_LEN {
        return Err(VaultError::InvalidFormat(
            "file too small to be a vault envelope".into(),
        ));
    }
    if &data[0..4] != MAGIC {
        return Err(VaultError::InvalidFormat("missing SRVT magic bytes".into()));
    }
    let version = data[4];
    if version != FORMAT_VERSION {
        return Err(VaultError::InvalidFormat(format!(
            "unsupported format version {version}, expected {FORMAT_VERSION}"
        )));
    }
    if data[5] != kind as u8 {
        return Err(VaultError::InvalidFormat(format!(
            "wrong envelope kind {} (expected {})",
            data[5], kind as u8
        )));
    }
    Ok(&data[HEADER_LEN..])
}

/// Serialize a KDF prefix followed by the payload.
pub fn encode_keyed_body(prefix: &KdfPrefix, payload: &[u8]) -> Result<Vec<u8>> {
    if prefix.salt.len() != SALT_LEN {
        return Err(VaultError::InvalidFormat(format!(
            "salt must be {SALT_LEN} bytes, got {}",
            prefix.salt.len()
        )));
    }

    let mut buf = Vec::with_capacity(KDF_PREFIX_LEN + payload.len());
    buf.extend_from_slice(&prefix.salt);
    buf.extend_from_slice(&prefix.params.memory_kib.to_le_bytes());
    buf.extend_from_slice(&prefix.params.iterations.to_le_bytes());
    buf.extend_from_slice(&prefix.params.parallelism.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Split a keyed body back into its KDF prefix and payload.
pub fn decode_keyed_body(body: &[u8]) -> Result<(KdfPrefix, &[u8])> {
    if body.len() < KDF_PREFIX_LEN {
        return Err(VaultError::InvalidFormat(
            "body too small for KDF prefix".into(),
        ));
    }

    let (salt, rest) = body.split_at(SALT_LEN);
    let read_u32 = |range: std::ops::Range<usize>| -> Result<u32> {
        Ok(u32::from_le_bytes(rest[range].try_into().map_err(
            |_| VaultError::InvalidFormat("truncated KDF prefix".into()),
        )?))
    };
    let memory_kib = read_u32(0..4)?;
    let iterations = read_u32(4..8)?;
    let parallelism = read_u32(8..12)?;

    Ok((
        KdfPrefix {
            salt: salt.to_vec(),
            params: KdfParams {
                memory_kib,
                iterations,
                parallelism,
            },
        },
        &rest[12..],
    ))
}

/// Monotonic counter for unique temp names within the process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to `path` atomically.
///
/// The temp file lives in the same directory (rename is only atomic
/// within one filesystem) and carries a leading dot so integrity scans
/// skip it if a crash leaves it behind.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_path = parent.join(format!(
        ".{}.tmp.{n}",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    let mut file = File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    sync_dir(parent);
    Ok(())
}

/// Best-effort directory sync so the rename is durable across a crash.
fn sync_dir(path: &Path) {
    match File::open(path) {
        Ok(dir) => {
            if let Err(err) = dir.sync_all() {
                tracing::warn!(path = %path.display(), error = %err, "directory sync failed");
            }
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "directory open failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

pub(crate) fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

pub(crate) fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

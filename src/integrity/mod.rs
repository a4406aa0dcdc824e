//! Checksum manifest — tamper evidence for every persisted artifact.
//!
//! The manifest maps logical file names (relative to the vault directory)
//! to SHA-256 digests and sizes.  It is recomputed after every successful
//! write and verified before every read of the vault.  It is deliberately
//! *not* encrypted — its job is tamper evidence, not secrecy — but its
//! absence once a vault exists is itself a tamper signal, which the
//! engine enforces.
//!
//! A violation is any of: a tracked file missing, a tracked file with a
//! different digest or size, or an unexpected file inside the vault
//! directory tree.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::{Result, VaultError};
use crate::store::format::write_atomic;
use crate::store::{CHECKSUMS_FILE, DECOY_DIR};

/// Root-level names that are legitimately present but never tracked.
/// Everything else in the vault directory must appear in the manifest.
const UNTRACKED: &[&str] = &[CHECKSUMS_FILE, "audit.db", DECOY_DIR];

/// Digest and size of one tracked file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChecksum {
    /// Base64 SHA-256 of the file contents.
    pub digest: String,
    /// File size in bytes.
    pub size: u64,
}

/// The on-disk manifest: logical name -> checksum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChecksumManifest {
    pub files: BTreeMap<String, FileChecksum>,
}

impl ChecksumManifest {
    /// Hash every named file under `dir` into a fresh manifest.
    pub fn compute(dir: &Path, names: &[String]) -> Result<Self> {
        let mut files = BTreeMap::new();
        for name in names {
            files.insert(name.clone(), checksum_file(&dir.join(name))?);
        }
        Ok(Self { files })
    }

    /// Recompute digests and compare against the manifest.
    ///
    /// Returns the first violation found; scanning order is the sorted
    /// map order, so failures are deterministic.  A missing *decoy* is
    /// not a violation — decoys are write-once artifacts regenerated
    /// wholesale at the next init — but a modified one is.
    pub fn verify(&self, dir: &Path) -> Result<()> {
        for (name, expected) in &self.files {
            let path = dir.join(name);
            if !path.exists() {
                if name.starts_with(DECOY_DIR) {
                    continue;
                }
                return Err(VaultError::Integrity {
                    file: name.clone(),
                    reason: "tracked file is missing".into(),
                });
            }

            let actual = checksum_file(&path)?;
            if actual.size != expected.size {
                return Err(VaultError::Integrity {
                    file: name.clone(),
                    reason: format!("size changed ({} -> {})", expected.size, actual.size),
                });
            }

            let matches: bool = actual
                .digest
                .as_bytes()
                .ct_eq(expected.digest.as_bytes())
                .into();
            if !matches {
                return Err(VaultError::Integrity {
                    file: name.clone(),
                    reason: "checksum mismatch".into(),
                });
            }
        }

        self.scan_unexpected(dir)
    }

    /// Detect files that were not present at manifest time.
    ///
    /// Hidden files (leading dot) are ignored so an interrupted atomic
    /// write can never look like an attack.
    fn scan_unexpected(&self, dir: &Path) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || UNTRACKED.contains(&name.as_str()) {
                continue;
            }
            if !self.files.contains_key(&name) {
                return Err(VaultError::Integrity {
                    file: name,
                    reason: "unexpected file not present at manifest time".into(),
                });
            }
        }

        let decoys = dir.join(DECOY_DIR);
        if decoys.is_dir() {
            for entry in fs::read_dir(&decoys)? {
                let entry = entry?;
                let name = format!(
                    "{DECOY_DIR}/{}",
                    entry.file_name().to_string_lossy()
                );
                if !self.files.contains_key(&name) {
                    return Err(VaultError::Integrity {
                        file: name,
                        reason: "unexpected file not present at manifest time".into(),
                    });
                }
            }
        }

        Ok(())
    }

    /// True if any tracked decoy has been deleted from disk.
    pub fn has_missing_decoys(&self, dir: &Path) -> bool {
        self.files
            .keys()
            .filter(|name| name.starts_with(DECOY_DIR))
            .any(|name| !dir.join(name).exists())
    }

    /// Rebuild the decoy entries from what is on disk, keeping every
    /// non-decoy entry untouched.  Used after wholesale regeneration.
    pub fn with_refreshed_decoys(&self, dir: &Path) -> Result<Self> {
        let mut files: BTreeMap<String, FileChecksum> = self
            .files
            .iter()
            .filter(|(name, _)| !name.starts_with(DECOY_DIR))
            .map(|(name, sum)| (name.clone(), sum.clone()))
            .collect();

        let decoys = dir.join(DECOY_DIR);
        if decoys.is_dir() {
            for entry in fs::read_dir(&decoys)? {
                let entry = entry?;
                let name = format!("{DECOY_DIR}/{}", entry.file_name().to_string_lossy());
                files.insert(name, checksum_file(&entry.path())?);
            }
        }

        Ok(Self { files })
    }

    /// Write the manifest as plain JSON, atomically.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(self)
            .map_err(|e| VaultError::Serialization(format!("manifest: {e}")))?;
        write_atomic(&dir.join(CHECKSUMS_FILE), &bytes)
    }

    /// Load the manifest; `Ok(None)` if no manifest file exists.
    ///
    /// A present-but-unparsable manifest is a violation, not a format
    /// error — the file does not get corrupted by accident.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CHECKSUMS_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)?;
        let manifest = serde_json::from_slice(&bytes).map_err(|e| VaultError::Integrity {
            file: CHECKSUMS_FILE.into(),
            reason: format!("manifest is not valid JSON: {e}"),
        })?;
        Ok(Some(manifest))
    }
}

/// SHA-256 + size of a single file.
fn checksum_file(path: &Path) -> Result<FileChecksum> {
    let bytes = fs::read(path)?;
    let digest = Sha256::digest(&bytes);
    Ok(FileChecksum {
        digest: BASE64.encode(digest),
        size: bytes.len() as u64,
    })
}

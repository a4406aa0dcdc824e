//! Vault configuration.
//!
//! [`VaultConfig`] is what the engine consumes: a passphrase source plus
//! behavior flags.  Production mode implies stricter defaults — destroy
//! on violation, decoys on, debugger checks on — but every flag can be
//! overridden individually, which is why the strict flags are `Option`s
//! resolved through mode-aware getters.
//!
//! [`Settings`] is the optional file-loadable subset (TOML, every field
//! defaulted) for hosts that keep vault policy in a config file; combine
//! it with a [`SecretSource`] to get a full `VaultConfig`.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::kdf::KdfParams;
use crate::errors::{Result, VaultError};
use crate::hardware::MachineIdentity;

/// Upper bound on configurable decoys; keeps init time bounded.
const MAX_DECOYS: usize = 64;

/// Deployment mode.  Production hardens every resolvable default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

/// Where the passphrase comes from: a literal, or a supplier invoked
/// exactly once per `init`/`export`.
pub enum SecretSource {
    Literal(String),
    Supplier(Box<dyn Fn() -> Result<String> + Send + Sync>),
}

impl SecretSource {
    /// Produce the passphrase.  A failing supplier or an empty result is
    /// a key-derivation error — there is no usable key without it.
    pub fn resolve(&self) -> Result<String> {
        let passphrase = match self {
            SecretSource::Literal(s) => s.clone(),
            SecretSource::Supplier(f) => f()?,
        };
        if passphrase.is_empty() {
            return Err(VaultError::KeyDerivation("passphrase is empty".into()));
        }
        Ok(passphrase)
    }
}

impl From<&str> for SecretSource {
    fn from(s: &str) -> Self {
        SecretSource::Literal(s.to_string())
    }
}

impl From<String> for SecretSource {
    fn from(s: String) -> Self {
        SecretSource::Literal(s)
    }
}

// Never print the passphrase, not even in debug output.
impl fmt::Debug for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretSource::Literal(_) => f.write_str("SecretSource::Literal(..)"),
            SecretSource::Supplier(_) => f.write_str("SecretSource::Supplier(..)"),
        }
    }
}

/// Full engine configuration.
#[derive(Debug)]
pub struct VaultConfig {
    /// Name of the vault subdirectory under the storage root.
    pub vault_name: String,

    /// Absolute override of the resolved vault directory.
    pub storage_path: Option<PathBuf>,

    pub mode: Mode,

    pub passphrase: SecretSource,

    /// Master switch for the destruction subsystem.
    pub self_destruct_enabled: bool,

    /// Bind the vault to this machine's fingerprint.
    pub hardware_bound: bool,

    /// Decoy file count; `None` resolves per mode (production: 3).
    pub decoy_count: Option<usize>,

    /// Destroy on tamper; `None` resolves per mode (production: yes).
    pub destroy_on_violation: Option<bool>,

    /// Check for debugger attachment at init; `None` resolves per mode.
    pub debugger_checks: Option<bool>,

    /// Argon2id cost parameters.
    pub kdf: KdfParams,

    /// Host-supplied machine identity; `None` probes the OS.
    pub identity: Option<MachineIdentity>,
}

impl VaultConfig {
    pub fn new(passphrase: impl Into<SecretSource>) -> Self {
        Self {
            vault_name: "vault".to_string(),
            storage_path: None,
            mode: Mode::Development,
            passphrase: passphrase.into(),
            self_destruct_enabled: true,
            hardware_bound: true,
            decoy_count: None,
            destroy_on_violation: None,
            debugger_checks: None,
            kdf: KdfParams::default(),
            identity: None,
        }
    }

    pub fn is_production(&self) -> bool {
        self.mode == Mode::Production
    }

    pub fn decoy_count(&self) -> usize {
        self.decoy_count
            .unwrap_or(if self.is_production() { 3 } else { 0 })
    }

    pub fn destroy_on_violation(&self) -> bool {
        self.destroy_on_violation.unwrap_or(self.is_production())
    }

    pub fn debugger_checks(&self) -> bool {
        self.debugger_checks.unwrap_or(self.is_production())
    }

    /// Validate before any engine work touches the disk.
    pub fn validate(&self) -> Result<()> {
        if self.vault_name.is_empty() {
            return Err(VaultError::Config("vault_name cannot be empty".into()));
        }
        if self.vault_name.len() > 64 {
            return Err(VaultError::Config(
                "vault_name cannot exceed 64 characters".into(),
            ));
        }
        if !self
            .vault_name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
        {
            return Err(VaultError::Config(format!(
                "vault_name '{}' contains invalid characters — only ASCII letters, digits, underscores, hyphens, and periods are allowed",
                self.vault_name
            )));
        }
        if self.decoy_count() > MAX_DECOYS {
            return Err(VaultError::Config(format!(
                "decoy_count cannot exceed {MAX_DECOYS}"
            )));
        }
        Ok(())
    }

    /// Resolve the vault directory from the host-supplied storage root.
    pub fn resolve_dir(&self, root: &Path) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(|| root.join(&self.vault_name))
    }

    /// Hash of the behavior-relevant settings, stored in metadata at
    /// creation so later inits can detect config drift.
    pub fn config_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "mode={:?}|destruct={}|bound={}|decoys={}|destroy={}|kdf={}/{}/{}",
            self.mode,
            self.self_destruct_enabled,
            self.hardware_bound,
            self.decoy_count(),
            self.destroy_on_violation(),
            self.kdf.memory_kib,
            self.kdf.iterations,
            self.kdf.parallelism,
        ));
        BASE64.encode(hasher.finalize())
    }
}

// ---------------------------------------------------------------------------
// File-loadable settings
// ---------------------------------------------------------------------------

/// The TOML-loadable subset of [`VaultConfig`].  Every field defaults so
/// a missing or partial file still yields a working configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_vault_name")]
    pub vault_name: String,

    #[serde(default)]
    pub mode: Mode,

    #[serde(default)]
    pub decoy_count: Option<usize>,

    #[serde(default = "default_true")]
    pub self_destruct_enabled: bool,

    #[serde(default = "default_true")]
    pub hardware_bound: bool,

    #[serde(default)]
    pub destroy_on_violation: Option<bool>,

    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    /// Argon2 memory cost in KiB (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_vault_name() -> String {
    "vault".to_string()
}

fn default_true() -> bool {
    true
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_name: default_vault_name(),
            mode: Mode::default(),
            decoy_count: None,
            self_destruct_enabled: true,
            hardware_bound: true,
            destroy_on_violation: None,
            storage_path: None,
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for next to the storage root.
    const FILE_NAME: &'static str = ".strongroom.toml";

    /// Load settings from `<dir>/.strongroom.toml`.
    ///
    /// A missing file yields defaults; a present-but-unparsable file is
    /// a configuration error.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        toml::from_str(&contents).map_err(|e| {
            VaultError::Config(format!("failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Combine with a passphrase source into a full engine config.
    pub fn into_config(self, passphrase: impl Into<SecretSource>) -> VaultConfig {
        VaultConfig {
            vault_name: self.vault_name,
            storage_path: self.storage_path,
            mode: self.mode,
            passphrase: passphrase.into(),
            self_destruct_enabled: self.self_destruct_enabled,
            hardware_bound: self.hardware_bound,
            decoy_count: self.decoy_count,
            destroy_on_violation: self.destroy_on_violation,
            debugger_checks: None,
            kdf: KdfParams {
                memory_kib: self.argon2_memory_kib,
                iterations: self.argon2_iterations,
                parallelism: self.argon2_parallelism,
            },
            identity: None,
        }
    }
}

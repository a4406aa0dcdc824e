//! The vault engine — lifecycle state machine and public API.
//!
//! One `VaultEngine` instance owns everything: the in-memory record, the
//! derived key, the audit log, the plugin registry, and the destruction
//! subsystem.  The lifecycle is `Locked → Ready → Destroyed`; every data
//! operation is gated on `Ready`, and every mutation is flushed to disk
//! before the call returns, so on-disk and in-memory state agree at
//! every observable point.
//!
//! Violations (checksum mismatch, hardware mismatch, debugger
//! attachment) are always audited.  With `destroy_on_violation` they
//! route into the self-destruct engine and the vault ends `Destroyed`;
//! otherwise the key is dropped and the vault returns to `Locked`.  The
//! only sanctioned recovery after destruction is a fresh `init`, which
//! recreates an empty vault.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use zeroize::Zeroize;

use crate::audit::{AuditAction, AuditEntry, AuditLog, AuditOutcome};
use crate::config::VaultConfig;
use crate::crypto::encryption;
use crate::crypto::kdf;
use crate::crypto::keys::MasterKey;
use crate::decoy;
use crate::destruct::{self, DestructCallback, DestructTrigger, SelfDestructEngine};
use crate::errors::{Result, VaultError};
use crate::hardware::{self, MachineIdentity, UNBOUND_SENTINEL};
use crate::integrity::ChecksumManifest;
use crate::plugins::{PluginHooks, VaultPlugin};
use crate::store::format::{self, EnvelopeKind, KdfPrefix};
use crate::store::{
    PersistenceStore, VaultMetadata, VaultRecord, CHECKSUMS_FILE, CONTAINER_FILE, METADATA_FILE,
};

/// Longest accepted record key.
const MAX_KEY_LEN: usize = 256;

/// Lifecycle state visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultStatus {
    Locked,
    Ready,
    Destroyed,
}

/// The vault engine.  Construct with [`VaultEngine::new`], then `init()`.
pub struct VaultEngine {
    dir: PathBuf,
    config: VaultConfig,
    status: VaultStatus,
    master_key: Option<MasterKey>,
    record: VaultRecord,
    metadata: Option<VaultMetadata>,
    store: PersistenceStore,
    hooks: PluginHooks,
    audit: AuditLog,
    destructor: SelfDestructEngine,
    /// Fingerprint of the machine we are running on right now.
    fingerprint: String,
}

impl VaultEngine {
    /// Build an engine rooted at `root` (the host-resolved storage
    /// directory).  `config.storage_path` overrides the resolved
    /// `<root>/<vault_name>` directory entirely.
    pub fn new(root: impl AsRef<Path>, config: VaultConfig) -> Result<Self> {
        config.validate()?;

        let dir = config.resolve_dir(root.as_ref());
        let identity = config
            .identity
            .clone()
            .unwrap_or_else(MachineIdentity::collect);
        let fingerprint = identity.fingerprint();

        let simulate = !config.is_production();

        Ok(Self {
            store: PersistenceStore::new(dir.clone()),
            audit: AuditLog::new(None, fingerprint.clone()),
            destructor: SelfDestructEngine::new(simulate),
            dir,
            config,
            status: VaultStatus::Locked,
            master_key: None,
            record: VaultRecord::new(),
            metadata: None,
            hooks: PluginHooks::new(),
            fingerprint,
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Initialize the vault: derive the key, verify hardware and
    /// integrity, load or create the container, and transition to ready.
    ///
    /// Callable from any state.  After destruction this is the sanctioned
    /// recovery path and recreates an empty vault.
    pub fn init(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        self.audit.attach_sink(&self.dir);

        // Any stale key from a previous session is dropped up front.
        self.master_key = None;

        if self.status == VaultStatus::Destroyed {
            self.destructor.rearm();
        }

        if self.config.debugger_checks() && destruct::debugger_attached() {
            let err = VaultError::Integrity {
                file: "process".into(),
                reason: "debugger attachment detected".into(),
            };
            self.audit.append(AuditAction::Init, None, AuditOutcome::Violation);
            return self.react_to_violation(err, DestructTrigger::DebuggerDetected);
        }

        let outcome = match self.store.read_kdf_prefix() {
            Ok(Some(prefix)) => self.open_existing(prefix),
            Ok(None) => self.create_fresh(),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(()) => {
                self.status = VaultStatus::Ready;
                self.audit.append(AuditAction::Init, None, AuditOutcome::Success);
                Ok(())
            }
            Err(err) if err.is_violation() => {
                self.audit.append(AuditAction::Init, None, AuditOutcome::Violation);
                let trigger = match err {
                    VaultError::HardwareMismatch => DestructTrigger::HardwareMismatch,
                    _ => DestructTrigger::IntegrityViolation,
                };
                self.react_to_violation(err, trigger)
            }
            Err(err) => {
                // Non-violation failure (bad passphrase, IO): stay locked.
                self.master_key = None;
                self.status = VaultStatus::Locked;
                Err(err)
            }
        }
    }

    /// Open an existing vault whose metadata prefix was just read.
    fn open_existing(&mut self, prefix: KdfPrefix) -> Result<()> {
        let mut passphrase = self.config.passphrase.resolve()?.into_bytes();
        let derived = kdf::derive_key(&passphrase, &prefix.salt, &prefix.params);
        passphrase.zeroize();
        let mut derived = derived?;

        // The metadata key does not depend on the binding, so a probe
        // key is enough to read the stored fingerprint.
        let probe = MasterKey::new(derived, UNBOUND_SENTINEL.to_string());
        derived.zeroize();
        let meta = self.store.load_metadata(&probe)?;

        if self.config.hardware_bound {
            hardware::verify(&meta.fingerprint_hash, &self.fingerprint)?;
        }

        let manifest = ChecksumManifest::load(&self.dir)?.ok_or(VaultError::Integrity {
            file: CHECKSUMS_FILE.into(),
            reason: "checksum manifest is missing".into(),
        })?;

        // Deleted decoys are regenerated wholesale before verification;
        // a *modified* decoy is still a violation.
        if manifest.has_missing_decoys(&self.dir) {
            decoy::generate(&self.dir, self.config.decoy_count())?;
            let manifest = manifest.with_refreshed_decoys(&self.dir)?;
            manifest.save(&self.dir)?;
            manifest.verify(&self.dir)?;
        } else {
            manifest.verify(&self.dir)?;
        }

        if meta.config_hash != self.config.config_hash() {
            self.audit
                .append(AuditAction::ConfigDrift, None, AuditOutcome::Success);
        }

        // Rebind to the creation-time fingerprint for record work.
        let master = probe.rebind(meta.fingerprint_hash.clone());
        let record = self.store.load_record(&master)?;

        // Regenerate decoys wholesale if the configured count is not on
        // disk; refresh failures are best-effort.
        let on_disk = decoy::list(&self.dir)?;
        if on_disk.len() != self.config.decoy_count() {
            decoy::generate(&self.dir, self.config.decoy_count())?;
            self.rewrite_manifest()?;
        } else if let Err(err) = decoy::refresh(&self.dir) {
            tracing::warn!(error = %err, "decoy refresh failed");
        }

        self.metadata = Some(meta);
        self.record = record;
        self.master_key = Some(master);
        Ok(())
    }

    /// First init: create metadata, an empty record, decoys, and the
    /// checksum manifest.
    fn create_fresh(&mut self) -> Result<()> {
        // A vault directory with artifacts but no metadata has been
        // selectively deleted — that is tampering, not a fresh start.
        for leftover in [CONTAINER_FILE, CHECKSUMS_FILE] {
            if self.dir.join(leftover).exists() {
                return Err(VaultError::Integrity {
                    file: METADATA_FILE.into(),
                    reason: "metadata missing but other vault files exist".into(),
                });
            }
        }

        let mut passphrase = self.config.passphrase.resolve()?.into_bytes();
        let salt = kdf::generate_salt();
        let derived = kdf::derive_key(&passphrase, &salt, &self.config.kdf);
        passphrase.zeroize();
        let mut derived = derived?;

        let fingerprint_hash = if self.config.hardware_bound {
            self.fingerprint.clone()
        } else {
            UNBOUND_SENTINEL.to_string()
        };
        let master = MasterKey::new(derived, fingerprint_hash.clone());
        derived.zeroize();

        let meta = VaultMetadata::new(
            salt.to_vec(),
            self.config.kdf,
            fingerprint_hash,
            self.config.config_hash(),
        );

        self.store.save_metadata(&meta, &master)?;

        let record = VaultRecord::new();
        self.store.save_record(&record, &master)?;

        decoy::generate(&self.dir, self.config.decoy_count())?;
        self.rewrite_manifest()?;

        self.metadata = Some(meta);
        self.record = record;
        self.master_key = Some(master);
        Ok(())
    }

    /// Current lifecycle state.
    pub fn status(&self) -> VaultStatus {
        self.status
    }

    /// Snapshot of the vault metadata, if loaded.
    pub fn metadata(&self) -> Option<VaultMetadata> {
        self.metadata.clone()
    }

    /// Ordered audit trail for this session.
    pub fn audit_log(&self) -> &[AuditEntry] {
        self.audit.entries()
    }

    /// The resolved vault directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Register a plugin; hooks run in registration order.
    pub fn register_plugin(&mut self, plugin: Box<dyn VaultPlugin>) {
        self.hooks.register(plugin);
    }

    /// Register a destruction callback, fired exactly once per
    /// destruction event, after the wipe completes (or is simulated).
    pub fn on_destruct(&mut self, callback: DestructCallback) {
        self.destructor.on_destruct(callback);
    }

    // ------------------------------------------------------------------
    // Data operations
    // ------------------------------------------------------------------

    /// Fetch a value; `Ok(None)` if the key is absent.
    pub fn get_item(&mut self, key: &str) -> Result<Option<Value>> {
        self.ensure_ready()?;
        validate_key(key)?;

        if let Err(err) = self.hooks.before_read(key) {
            self.audit
                .append(AuditAction::Get, Some(key), AuditOutcome::Rejected);
            return Err(err);
        }

        self.opportunistic_verify(AuditAction::Get, Some(key))?;

        let value = self.record.get(key).cloned();
        self.audit
            .append(AuditAction::Get, Some(key), AuditOutcome::Success);
        Ok(value)
    }

    /// Insert or update a value, flushed to disk before returning.
    pub fn set_item(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        self.ensure_ready()?;
        validate_key(key)?;

        let value = serde_json::to_value(value)
            .map_err(|e| VaultError::Serialization(format!("value for '{key}': {e}")))?;

        if let Err(err) = self.hooks.before_write(key, &value) {
            self.audit
                .append(AuditAction::Set, Some(key), AuditOutcome::Rejected);
            return Err(err);
        }

        self.record.set(key, value.clone());
        self.flush()?;

        // Only after the write is durable do the side-effect hooks see it.
        self.hooks.after_write(key, &value);
        self.audit
            .append(AuditAction::Set, Some(key), AuditOutcome::Success);
        Ok(())
    }

    /// Remove a key.  Removing an absent key is a no-op, not an error.
    pub fn remove_item(&mut self, key: &str) -> Result<()> {
        self.ensure_ready()?;
        validate_key(key)?;

        if let Err(err) = self.hooks.before_delete(key) {
            self.audit
                .append(AuditAction::Remove, Some(key), AuditOutcome::Rejected);
            return Err(err);
        }

        if self.record.remove(key) {
            self.flush()?;
            self.hooks.after_delete(key);
        }
        self.audit
            .append(AuditAction::Remove, Some(key), AuditOutcome::Success);
        Ok(())
    }

    /// Remove every entry.  A veto on any key aborts the whole clear.
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_ready()?;

        let keys = self.record.keys();
        for key in &keys {
            if let Err(err) = self.hooks.before_delete(key) {
                self.audit
                    .append(AuditAction::Clear, Some(key.as_str()), AuditOutcome::Rejected);
                return Err(err);
            }
        }

        self.record.clear();
        self.flush()?;

        for key in &keys {
            self.hooks.after_delete(key);
        }
        self.audit
            .append(AuditAction::Clear, None, AuditOutcome::Success);
        Ok(())
    }

    /// Keys in insertion order.
    pub fn list_keys(&mut self) -> Result<Vec<String>> {
        self.ensure_ready()?;
        let keys = self.record.keys();
        self.audit
            .append(AuditAction::ListKeys, None, AuditOutcome::Success);
        Ok(keys)
    }

    // ------------------------------------------------------------------
    // Export / import
    // ------------------------------------------------------------------

    /// Re-encrypt the current record under a caller-supplied password
    /// for portable backup, independent of the vault's own key.
    pub fn export_vault(&mut self, password: &str) -> Result<Vec<u8>> {
        self.ensure_ready()?;
        if password.is_empty() {
            return Err(VaultError::KeyDerivation(
                "export password is empty".into(),
            ));
        }

        let salt = kdf::generate_salt();
        let params = self.config.kdf;
        let mut key = kdf::derive_key(password.as_bytes(), &salt, &params)?;

        let json = serde_json::to_vec(&self.record)
            .map_err(|e| VaultError::Serialization(format!("record: {e}")))?;
        let encrypted = encryption::encrypt(&key, &json);
        key.zeroize();
        let encrypted = encrypted?;

        let body = format::encode_keyed_body(
            &KdfPrefix {
                salt: salt.to_vec(),
                params,
            },
            &encrypted,
        )?;
        let blob = format::encode(EnvelopeKind::Export, &body);

        self.audit
            .append(AuditAction::Export, None, AuditOutcome::Success);
        Ok(blob)
    }

    /// Decode a blob produced by [`VaultEngine::export_vault`].
    ///
    /// A wrong password fails with [`VaultError::Decryption`] — never
    /// silently wrong data.
    pub fn import_vault(blob: &[u8], password: &str) -> Result<VaultRecord> {
        let body = format::decode(EnvelopeKind::Export, blob)?;
        let (prefix, payload) = format::decode_keyed_body(body)?;

        let mut key = kdf::derive_key(password.as_bytes(), &prefix.salt, &prefix.params)?;
        let json = encryption::decrypt(&key, payload);
        key.zeroize();
        let json = json?;

        serde_json::from_slice(&json)
            .map_err(|e| VaultError::Serialization(format!("exported record: {e}")))
    }

    // ------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------

    /// Manual self-destruct.
    pub fn self_destruct(&mut self) -> Result<()> {
        if self.status == VaultStatus::Destroyed {
            return Err(VaultError::VaultDestroyed);
        }
        if !self.config.self_destruct_enabled {
            return Err(VaultError::Config(
                "self-destruct is disabled by configuration".into(),
            ));
        }

        self.destroy_now(DestructTrigger::Manual);
        Ok(())
    }

    /// Route a violation per policy: destroy, or drop the key and lock.
    fn react_to_violation(&mut self, err: VaultError, trigger: DestructTrigger) -> Result<()> {
        self.master_key = None;
        if self.config.destroy_on_violation() && self.config.self_destruct_enabled {
            self.destroy_now(trigger);
        } else {
            self.status = VaultStatus::Locked;
        }
        Err(err)
    }

    /// Wipe tracked files, clear memory, fire callbacks, go terminal.
    fn destroy_now(&mut self, trigger: DestructTrigger) {
        let tracked = self.tracked_files();
        self.destructor.destroy(&self.dir, &tracked, trigger);

        self.record.clear();
        self.master_key = None;
        self.metadata = None;
        self.status = VaultStatus::Destroyed;

        let outcome = if trigger == DestructTrigger::Manual {
            AuditOutcome::Success
        } else {
            AuditOutcome::Violation
        };
        self.audit.append(AuditAction::SelfDestruct, None, outcome);
    }

    /// Every artifact the wipe must cover, decoys included.
    fn tracked_files(&self) -> Vec<PathBuf> {
        let mut files = vec![
            self.dir.join(CONTAINER_FILE),
            self.dir.join(METADATA_FILE),
            self.dir.join(CHECKSUMS_FILE),
        ];
        if let Ok(decoys) = decoy::list(&self.dir) {
            files.extend(decoys.iter().map(|name| self.dir.join(name)));
        }
        files
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    fn ensure_ready(&self) -> Result<()> {
        match self.status {
            VaultStatus::Ready => Ok(()),
            VaultStatus::Locked => Err(VaultError::NotInitialized),
            VaultStatus::Destroyed => Err(VaultError::VaultDestroyed),
        }
    }

    /// Persist the record, bump `last_modified`, and rebuild the
    /// manifest — synchronously, before the mutating call returns.
    fn flush(&mut self) -> Result<()> {
        let master = self.master_key.as_ref().ok_or(VaultError::NotInitialized)?;

        self.store.save_record(&self.record, master)?;

        if let Some(meta) = self.metadata.as_mut() {
            meta.touch();
            self.store.save_metadata(meta, master)?;
        }

        self.rewrite_manifest()
    }

    fn rewrite_manifest(&self) -> Result<()> {
        let mut names = vec![CONTAINER_FILE.to_string(), METADATA_FILE.to_string()];
        names.extend(decoy::list(&self.dir)?);
        ChecksumManifest::compute(&self.dir, &names)?.save(&self.dir)
    }

    /// In production the manifest is re-verified on reads; a mismatch
    /// takes the same violation path as an init-time failure.
    fn opportunistic_verify(&mut self, action: AuditAction, key: Option<&str>) -> Result<()> {
        if !self.config.is_production() {
            return Ok(());
        }

        let verdict = match ChecksumManifest::load(&self.dir) {
            Ok(Some(manifest)) => manifest.verify(&self.dir),
            Ok(None) => Err(VaultError::Integrity {
                file: CHECKSUMS_FILE.into(),
                reason: "checksum manifest is missing".into(),
            }),
            Err(err) => Err(err),
        };

        match verdict {
            Ok(()) => Ok(()),
            Err(err) if err.is_violation() => {
                self.audit.append(action, key, AuditOutcome::Violation);
                self.react_to_violation(err, DestructTrigger::IntegrityViolation)
            }
            Err(err) => Err(err),
        }
    }
}

/// Record keys: non-empty, bounded length.  Keys are map keys, not file
/// names, so the character set is unrestricted.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(VaultError::Config("key cannot be empty".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(VaultError::Config(format!(
            "key cannot exceed {MAX_KEY_LEN} characters"
        )));
    }
    Ok(())
}

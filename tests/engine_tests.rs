//! Integration tests for the vault engine lifecycle and data API.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use strongroom::crypto::kdf::KdfParams;
use strongroom::errors::VaultError;
use strongroom::{
    AuditAction, HookDecision, Mode, VaultConfig, VaultEngine, VaultPlugin, VaultStatus,
};
use tempfile::TempDir;

/// Minimum-cost Argon2 settings keep the suite fast.
fn cheap_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    }
}

fn config(passphrase: &str) -> VaultConfig {
    let mut config = VaultConfig::new(passphrase);
    config.kdf = cheap_kdf();
    config.hardware_bound = false;
    config
}

fn ready_engine(root: &Path, passphrase: &str) -> VaultEngine {
    let mut engine = VaultEngine::new(root, config(passphrase)).unwrap();
    engine.init().unwrap();
    engine
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn init_creates_vault_artifacts() {
    let tmp = TempDir::new().unwrap();
    let engine = ready_engine(tmp.path(), "init-pw");

    assert_eq!(engine.status(), VaultStatus::Ready);
    assert!(engine.dir().join("container").exists());
    assert!(engine.dir().join("metadata").exists());
    assert!(engine.dir().join("checksums").exists());
}

#[test]
fn data_ops_require_init() {
    let tmp = TempDir::new().unwrap();
    let mut engine = VaultEngine::new(tmp.path(), config("pw")).unwrap();

    assert_eq!(engine.status(), VaultStatus::Locked);
    assert!(matches!(
        engine.get_item("k"),
        Err(VaultError::NotInitialized)
    ));
    assert!(matches!(
        engine.set_item("k", "v"),
        Err(VaultError::NotInitialized)
    ));
    assert!(matches!(engine.clear(), Err(VaultError::NotInitialized)));
    assert!(matches!(
        engine.list_keys(),
        Err(VaultError::NotInitialized)
    ));
}

#[test]
fn wrong_passphrase_leaves_vault_locked_and_recoverable() {
    let tmp = TempDir::new().unwrap();
    {
        let mut engine = ready_engine(tmp.path(), "right-pw");
        engine.set_item("k", "v").unwrap();
    }

    // A wrong passphrase is indistinguishable from tamper, but without
    // destroy-on-violation the vault just stays locked.
    let mut engine = VaultEngine::new(tmp.path(), config("wrong-pw")).unwrap();
    let err = engine.init().unwrap_err();
    assert!(err.is_violation());
    assert_eq!(engine.status(), VaultStatus::Locked);

    // Re-init with the right passphrase recovers.
    let mut engine = VaultEngine::new(tmp.path(), config("right-pw")).unwrap();
    engine.init().unwrap();
    assert_eq!(engine.get_item("k").unwrap(), Some(json!("v")));
}

#[test]
fn metadata_snapshot_is_available_when_ready() {
    let tmp = TempDir::new().unwrap();
    let engine = ready_engine(tmp.path(), "pw");

    let meta = engine.metadata().expect("metadata after init");
    assert_eq!(meta.fingerprint_hash, "unbound");
    assert_eq!(meta.kdf, cheap_kdf());
    assert!(!meta.salt.is_empty());
}

// ---------------------------------------------------------------------------
// Round-trip and ordering
// ---------------------------------------------------------------------------

#[test]
fn set_get_roundtrip_for_supported_values() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");

    let values = [
        ("string", json!("plain text")),
        ("number", json!(42.5)),
        ("bool", json!(true)),
        ("null", json!(null)),
        ("array", json!([1, "two", false])),
        ("nested", json!({ "outer": { "inner": [1, 2, 3] } })),
    ];

    for (key, value) in &values {
        engine.set_item(key, value).unwrap();
    }
    for (key, value) in &values {
        assert_eq!(engine.get_item(key).unwrap().as_ref(), Some(value));
    }
}

#[test]
fn values_persist_across_engine_instances() {
    let tmp = TempDir::new().unwrap();
    {
        let mut engine = ready_engine(tmp.path(), "pw");
        engine.set_item("db_url", "postgres://localhost/db").unwrap();
        engine.set_item("retries", 3).unwrap();
    }

    let mut engine = ready_engine(tmp.path(), "pw");
    assert_eq!(
        engine.get_item("db_url").unwrap(),
        Some(json!("postgres://localhost/db"))
    );
    assert_eq!(engine.get_item("retries").unwrap(), Some(json!(3)));
}

#[test]
fn list_keys_preserves_insertion_order() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");

    engine.set_item("zebra", 1).unwrap();
    engine.set_item("apple", 2).unwrap();
    engine.set_item("mango", 3).unwrap();
    // Updating an existing key must not move it.
    engine.set_item("zebra", 99).unwrap();

    assert_eq!(engine.list_keys().unwrap(), vec!["zebra", "apple", "mango"]);
}

#[test]
fn remove_absent_key_is_a_noop() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");

    engine.remove_item("never-existed").unwrap();

    engine.set_item("k", "v").unwrap();
    engine.remove_item("k").unwrap();
    engine.remove_item("k").unwrap();
    assert_eq!(engine.get_item("k").unwrap(), None);
}

#[test]
fn clear_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");

    engine.set_item("a", 1).unwrap();
    engine.set_item("b", 2).unwrap();

    engine.clear().unwrap();
    assert!(engine.list_keys().unwrap().is_empty());

    engine.clear().unwrap();
    assert!(engine.list_keys().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Plugins
// ---------------------------------------------------------------------------

struct DenyDeletes;

impl VaultPlugin for DenyDeletes {
    fn name(&self) -> &str {
        "deny-deletes"
    }

    fn before_delete(&self, _key: &str) -> HookDecision {
        HookDecision::Veto("deletes are frozen".into())
    }
}

#[test]
fn before_delete_veto_leaves_key_present() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");

    engine.set_item("protected", "value").unwrap();
    engine.register_plugin(Box::new(DenyDeletes));

    let err = engine.remove_item("protected").unwrap_err();
    assert!(matches!(err, VaultError::PluginRejected { .. }));
    assert_eq!(engine.get_item("protected").unwrap(), Some(json!("value")));

    // Clear is a delete-all and is vetoed the same way.
    assert!(engine.clear().is_err());
    assert_eq!(engine.list_keys().unwrap(), vec!["protected"]);
}

/// Confirms the write was durable by reading it back through a second
/// engine instance opened inside the hook.
struct DurabilityProbe {
    root: PathBuf,
    observed: Arc<AtomicBool>,
}

impl VaultPlugin for DurabilityProbe {
    fn name(&self) -> &str {
        "durability-probe"
    }

    fn after_write(&self, key: &str, value: &Value) -> strongroom::Result<()> {
        let mut reader = VaultEngine::new(&self.root, config("pw")).unwrap();
        reader.init().unwrap();
        let persisted = reader.get_item(key).unwrap();
        assert_eq!(persisted.as_ref(), Some(value), "value must be on disk");
        self.observed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn after_write_observes_durably_persisted_value() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");

    let observed = Arc::new(AtomicBool::new(false));
    engine.register_plugin(Box::new(DurabilityProbe {
        root: tmp.path().to_path_buf(),
        observed: Arc::clone(&observed),
    }));

    engine.set_item("token", "abc123").unwrap();
    assert!(observed.load(Ordering::SeqCst));
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

#[test]
fn export_import_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "vault-pw");

    engine.set_item("first", json!({ "deep": [1, 2] })).unwrap();
    engine.set_item("second", "text").unwrap();

    let blob = engine.export_vault("backup-pw").unwrap();

    let record = VaultEngine::import_vault(&blob, "backup-pw").unwrap();
    assert_eq!(record.keys(), vec!["first", "second"]);
    assert_eq!(record.get("first"), Some(&json!({ "deep": [1, 2] })));
}

#[test]
fn import_with_wrong_password_fails() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "vault-pw");
    engine.set_item("k", "v").unwrap();

    let blob = engine.export_vault("backup-pw").unwrap();
    assert!(matches!(
        VaultEngine::import_vault(&blob, "not-the-password"),
        Err(VaultError::Decryption)
    ));
}

#[test]
fn import_rejects_garbage() {
    assert!(VaultEngine::import_vault(b"not an export blob", "pw").is_err());
}

#[test]
fn export_requires_nonempty_password() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");
    assert!(matches!(
        engine.export_vault(""),
        Err(VaultError::KeyDerivation(_))
    ));
}

// ---------------------------------------------------------------------------
// Decoys
// ---------------------------------------------------------------------------

#[test]
fn init_generates_configured_decoy_count() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config("pw");
    cfg.decoy_count = Some(3);

    let mut engine = VaultEngine::new(tmp.path(), cfg).unwrap();
    engine.init().unwrap();

    let decoy_dir = engine.dir().join("decoys");
    let count = std::fs::read_dir(&decoy_dir).unwrap().count();
    assert_eq!(count, 3);

    // The real artifacts are still exactly container/metadata/checksums.
    assert!(engine.dir().join("container").exists());
    assert!(engine.dir().join("metadata").exists());
    assert!(engine.dir().join("checksums").exists());
}

#[test]
fn deleted_decoys_are_regenerated_wholesale() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config("pw");
    cfg.decoy_count = Some(2);
    let mut engine = VaultEngine::new(tmp.path(), cfg).unwrap();
    engine.init().unwrap();
    let dir = engine.dir().to_path_buf();
    drop(engine);

    std::fs::remove_dir_all(dir.join("decoys")).unwrap();

    let mut cfg = config("pw");
    cfg.decoy_count = Some(2);
    let mut engine = VaultEngine::new(tmp.path(), cfg).unwrap();
    engine.init().unwrap();

    assert_eq!(std::fs::read_dir(dir.join("decoys")).unwrap().count(), 2);
}

// ---------------------------------------------------------------------------
// Self-destruct
// ---------------------------------------------------------------------------

#[test]
fn manual_destruct_is_terminal() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");
    engine.set_item("k", "v").unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    engine.on_destruct(Box::new(move |event| {
        assert!(event.simulated, "development mode simulates the wipe");
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));

    engine.self_destruct().unwrap();

    assert_eq!(engine.status(), VaultStatus::Destroyed);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(matches!(
        engine.get_item("k"),
        Err(VaultError::VaultDestroyed)
    ));
    assert!(matches!(
        engine.set_item("k", "v"),
        Err(VaultError::VaultDestroyed)
    ));
    assert!(matches!(
        engine.self_destruct(),
        Err(VaultError::VaultDestroyed)
    ));

    // Simulated destruction leaves the files on disk.
    assert!(engine.dir().join("container").exists());
}

#[test]
fn production_destruct_removes_every_artifact() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config("pw");
    cfg.mode = Mode::Production;
    cfg.decoy_count = Some(2);

    let mut engine = VaultEngine::new(tmp.path(), cfg).unwrap();
    engine.init().unwrap();
    engine.set_item("k", "v").unwrap();
    let dir = engine.dir().to_path_buf();

    engine.self_destruct().unwrap();

    assert_eq!(engine.status(), VaultStatus::Destroyed);
    assert!(!dir.join("container").exists());
    assert!(!dir.join("metadata").exists());
    assert!(!dir.join("checksums").exists());
    assert!(!dir.join("decoys").exists());
}

#[test]
fn destruct_callbacks_run_in_registration_order() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");

    let order = Arc::new(Mutex::new(Vec::new()));
    for id in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        engine.on_destruct(Box::new(move |_| {
            order.lock().unwrap().push(id);
            Ok(())
        }));
    }

    engine.self_destruct().unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
}

#[test]
fn reinit_after_destruction_recreates_empty_vault() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config("pw");
    cfg.mode = Mode::Production;
    cfg.decoy_count = Some(0);

    let mut engine = VaultEngine::new(tmp.path(), cfg).unwrap();
    engine.init().unwrap();
    engine.set_item("doomed", "data").unwrap();
    engine.self_destruct().unwrap();

    // The sanctioned recovery path: re-init yields an empty, ready vault.
    engine.init().unwrap();
    assert_eq!(engine.status(), VaultStatus::Ready);
    assert!(engine.list_keys().unwrap().is_empty());
}

#[test]
fn disabled_self_destruct_rejects_manual_trigger() {
    let tmp = TempDir::new().unwrap();
    let mut cfg = config("pw");
    cfg.self_destruct_enabled = false;

    let mut engine = VaultEngine::new(tmp.path(), cfg).unwrap();
    engine.init().unwrap();

    assert!(matches!(
        engine.self_destruct(),
        Err(VaultError::Config(_))
    ));
    assert_eq!(engine.status(), VaultStatus::Ready);
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

#[test]
fn audit_records_operations_in_order() {
    let tmp = TempDir::new().unwrap();
    let mut engine = ready_engine(tmp.path(), "pw");

    engine.set_item("k", "v").unwrap();
    engine.get_item("k").unwrap();
    engine.remove_item("k").unwrap();

    let actions: Vec<AuditAction> = engine.audit_log().iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Init,
            AuditAction::Set,
            AuditAction::Get,
            AuditAction::Remove
        ]
    );

    // Key names are recorded; values never are.
    assert_eq!(engine.audit_log()[1].key.as_deref(), Some("k"));
    assert!(!engine.audit_log()[0].fingerprint.is_empty());
}

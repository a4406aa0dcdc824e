//! Audit log — append-only record of lifecycle and data-access events.
//!
//! Entries are always held in an in-memory ordered list owned by the
//! engine.  With the default `audit-log` feature a SQLite sink at
//! `<vault_dir>/audit.db` mirrors every entry for durability.
//!
//! Designed for graceful degradation: appending never fails the
//! triggering vault operation.  If the database can't be opened or
//! written to, the entry still lands in memory and a `tracing` warning
//! is the only trace of the problem.  The audit trail is *not* wiped by
//! self-destruct — it is the record of the destruction.

use std::path::Path;

use chrono::{DateTime, Utc};

#[cfg(feature = "audit-log")]
use rusqlite::Connection;

/// What a vault operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Init,
    Get,
    Set,
    Remove,
    Clear,
    ListKeys,
    Export,
    SelfDestruct,
    ConfigDrift,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Init => "init",
            AuditAction::Get => "get",
            AuditAction::Set => "set",
            AuditAction::Remove => "remove",
            AuditAction::Clear => "clear",
            AuditAction::ListKeys => "list_keys",
            AuditAction::Export => "export",
            AuditAction::SelfDestruct => "self_destruct",
            AuditAction::ConfigDrift => "config_drift",
        }
    }
}

/// How the operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Violation,
    Rejected,
}

impl AuditOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Violation => "violation",
            AuditOutcome::Rejected => "rejected",
        }
    }
}

/// A single immutable audit entry.  Key names are recorded; values never.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub key: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub fingerprint: String,
    pub outcome: AuditOutcome,
}

/// Append-only audit log with an optional SQLite sink.
pub struct AuditLog {
    entries: Vec<AuditEntry>,
    fingerprint: String,
    #[cfg(feature = "audit-log")]
    conn: Option<Connection>,
}

impl AuditLog {
    /// Create a log stamped with the machine fingerprint.  `dir` is where
    /// the SQLite sink lives; pass `None` to keep the log memory-only.
    pub fn new(dir: Option<&Path>, fingerprint: String) -> Self {
        #[cfg(feature = "audit-log")]
        let conn = dir.and_then(open_sink);
        #[cfg(not(feature = "audit-log"))]
        let _ = dir;

        Self {
            entries: Vec::new(),
            fingerprint,
            #[cfg(feature = "audit-log")]
            conn,
        }
    }

    /// Attach the SQLite sink once the vault directory exists.  No-op if
    /// a sink is already open or the feature is disabled.
    pub fn attach_sink(&mut self, dir: &Path) {
        #[cfg(feature = "audit-log")]
        if self.conn.is_none() {
            self.conn = open_sink(dir);
        }
        #[cfg(not(feature = "audit-log"))]
        let _ = dir;
    }

    /// Record an event.  Fire-and-forget — sink errors are swallowed.
    pub fn append(&mut self, action: AuditAction, key: Option<&str>, outcome: AuditOutcome) {
        let entry = AuditEntry {
            action,
            key: key.map(str::to_string),
            timestamp: Utc::now(),
            fingerprint: self.fingerprint.clone(),
            outcome,
        };

        #[cfg(feature = "audit-log")]
        if let Some(conn) = &self.conn {
            let result = conn.execute(
                "INSERT INTO audit_log (timestamp, action, key_name, fingerprint, outcome)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    entry.timestamp.to_rfc3339(),
                    entry.action.as_str(),
                    entry.key,
                    entry.fingerprint,
                    entry.outcome.as_str(),
                ],
            );
            if let Err(err) = result {
                tracing::warn!(error = %err, "audit sink write failed");
            }
        }

        self.entries.push(entry);
    }

    /// Ordered snapshot of everything recorded this session.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }
}

/// Open (or create) the SQLite sink, owner-only permissions.
#[cfg(feature = "audit-log")]
fn open_sink(dir: &Path) -> Option<Connection> {
    let db_path = dir.join("audit.db");
    let conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(err) => {
            tracing::warn!(error = %err, "audit sink unavailable");
            return None;
        }
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(&db_path, perms);
    }

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp   TEXT NOT NULL,
            action      TEXT NOT NULL,
            key_name    TEXT,
            fingerprint TEXT NOT NULL,
            outcome     TEXT NOT NULL
        );",
    )
    .ok()?;

    Some(conn)
}

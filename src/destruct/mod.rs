//! Self-destruct — secure overwrite-then-delete of all vault artifacts.
//!
//! Destruction is a protocol, not cleanup: every tracked file is
//! overwritten with random bytes for a fixed number of passes, then one
//! all-zero pass, each pass individually fsynced so a crash mid-wipe
//! still leaves no readable remnants, and only then deleted.  Wipe
//! errors on one file never abort the wipe of the others.
//!
//! The engine is a three-state machine: `Idle → Destroying → Destroyed`.
//! `Destroyed` is terminal and destruction fires at most once; callbacks
//! registered via `on_destruct` run exactly once per destruction, in
//! registration order, after the wipe — a callback error is logged and
//! the rest still run.
//!
//! In simulated mode (the development default) the same transitions,
//! callbacks, and audit trail fire but no file is touched.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::errors::Result;
use crate::store::DECOY_DIR;

/// Random-overwrite passes before the final zero pass.
const OVERWRITE_PASSES: usize = 3;

/// Lifecycle of the destruction subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestructState {
    Idle,
    Destroying,
    Destroyed,
}

/// What pulled the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestructTrigger {
    IntegrityViolation,
    HardwareMismatch,
    Manual,
    DebuggerDetected,
}

impl DestructTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            DestructTrigger::IntegrityViolation => "integrity_violation",
            DestructTrigger::HardwareMismatch => "hardware_mismatch",
            DestructTrigger::Manual => "manual",
            DestructTrigger::DebuggerDetected => "debugger_detected",
        }
    }
}

/// Passed to every destruction callback.
#[derive(Debug, Clone)]
pub struct DestructEvent {
    pub trigger: DestructTrigger,
    pub simulated: bool,
    pub timestamp: DateTime<Utc>,
}

/// A destruction observer.  Errors are caught and logged, never allowed
/// to abort the wipe or the remaining callbacks.
pub type DestructCallback = Box<dyn FnMut(&DestructEvent) -> Result<()>>;

/// The destruction state machine and wipe executor.
pub struct SelfDestructEngine {
    state: DestructState,
    simulate: bool,
    callbacks: Vec<DestructCallback>,
}

impl SelfDestructEngine {
    pub fn new(simulate: bool) -> Self {
        Self {
            state: DestructState::Idle,
            simulate,
            callbacks: Vec::new(),
        }
    }

    pub fn state(&self) -> DestructState {
        self.state
    }

    pub fn on_destruct(&mut self, callback: DestructCallback) {
        self.callbacks.push(callback);
    }

    /// Re-arm after a sanctioned re-init of a destroyed vault.
    pub fn rearm(&mut self) {
        self.state = DestructState::Idle;
    }

    /// Execute destruction of `tracked` files under `dir`.
    ///
    /// Idempotent: once `Destroyed`, further calls do nothing (callbacks
    /// included — exactly-once per destruction event).
    pub fn destroy(&mut self, dir: &Path, tracked: &[PathBuf], trigger: DestructTrigger) {
        if self.state == DestructState::Destroyed {
            return;
        }
        self.state = DestructState::Destroying;

        if !self.simulate {
            for path in tracked {
                if let Err(err) = wipe_file(path) {
                    tracing::warn!(path = %path.display(), error = %err, "wipe failed");
                }
            }
            // Decoy directory itself, once its files are gone.
            let decoys = dir.join(DECOY_DIR);
            if decoys.exists() {
                if let Err(err) = fs::remove_dir_all(&decoys) {
                    tracing::warn!(error = %err, "decoy directory removal failed");
                }
            }
        }

        self.state = DestructState::Destroyed;

        let event = DestructEvent {
            trigger,
            simulated: self.simulate,
            timestamp: Utc::now(),
        };
        for callback in &mut self.callbacks {
            if let Err(err) = callback(&event) {
                tracing::warn!(error = %err, "destruct callback failed");
            }
        }
    }
}

/// Overwrite a file in place, then delete it.
///
/// Each pass is independently fsynced before the next begins.
fn wipe_file(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let len = fs::metadata(path)?.len() as usize;

    {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let mut noise = vec![0u8; len];

        for _ in 0..OVERWRITE_PASSES {
            rand::rngs::OsRng.fill_bytes(&mut noise);
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&noise)?;
            file.sync_all()?;
        }

        noise.fill(0);
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&noise)?;
        file.sync_all()?;
    }

    fs::remove_file(path)?;
    Ok(())
}

/// Detect a tracing/inspection attachment on the running process.
///
/// Linux: a nonzero `TracerPid` in `/proc/self/status`.  Platforms
/// without a cheap, reliable probe report `false` — destruction must
/// never fire spuriously.
pub fn debugger_attached() -> bool {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("TracerPid:") {
                    return rest.trim().parse::<u32>().map(|pid| pid != 0).unwrap_or(false);
                }
            }
        }
        false
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

//! Hardware binding — a stable machine fingerprint.
//!
//! The fingerprint is a SHA-256 digest over durable machine identifiers:
//! the OS machine id, the primary network interface MAC, the hostname,
//! and the platform name/architecture.  It is computed at vault creation,
//! stored (hashed) in the metadata, and recomputed at every init; a
//! mismatch is a violation of the same class as a checksum failure.
//!
//! Binding is optional.  When disabled the metadata records the
//! [`UNBOUND_SENTINEL`] and no comparison ever runs.
//!
//! The host process may supply its own [`MachineIdentity`] instead of the
//! OS probe — useful for platforms with a better identity source and for
//! exercising the mismatch path in tests.

use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::{Result, VaultError};

/// Recorded in metadata when hardware binding is disabled.
pub const UNBOUND_SENTINEL: &str = "unbound";

/// The raw identifiers a fingerprint is derived from.
///
/// Missing components are allowed — a machine without a readable machine
/// id still fingerprints on whatever is available — but the combination
/// must be stable across reboots for binding to hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineIdentity {
    /// Persistent OS installation id (e.g. `/etc/machine-id`).
    pub machine_id: Option<String>,
    /// MAC address of the first durable network interface.
    pub primary_mac: Option<String>,
    /// Host name.
    pub hostname: Option<String>,
    /// Platform name and architecture (`linux/x86_64`).
    pub platform: String,
}

impl MachineIdentity {
    /// Probe the running OS for identity components.
    pub fn collect() -> Self {
        Self {
            machine_id: read_machine_id(),
            primary_mac: read_primary_mac(),
            hostname: read_hostname(),
            platform: format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }

    /// Hash the identity into a base64 SHA-256 fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"machine-id:");
        hasher.update(self.machine_id.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|mac:");
        hasher.update(self.primary_mac.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|host:");
        hasher.update(self.hostname.as_deref().unwrap_or("").as_bytes());
        hasher.update(b"|platform:");
        hasher.update(self.platform.as_bytes());
        BASE64.encode(hasher.finalize())
    }
}

/// Compare a stored fingerprint against the current one in constant time.
///
/// A stored [`UNBOUND_SENTINEL`] always passes — unbound vaults are never
/// checked.
pub fn verify(stored: &str, current: &str) -> Result<()> {
    if stored == UNBOUND_SENTINEL {
        return Ok(());
    }

    if stored.as_bytes().ct_eq(current.as_bytes()).into() {
        Ok(())
    } else {
        Err(VaultError::HardwareMismatch)
    }
}

/// Read the persistent OS machine id, trying the usual locations.
fn read_machine_id() -> Option<String> {
    const CANDIDATES: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];
    CANDIDATES
        .iter()
        .find_map(|p| read_trimmed(Path::new(p)))
        .filter(|s| !s.is_empty())
}

/// First non-loopback interface MAC, lowest interface name first so the
/// choice is stable across probes.
fn read_primary_mac() -> Option<String> {
    let mut names: Vec<_> = fs::read_dir("/sys/class/net")
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n != "lo")
        .collect();
    names.sort();

    names.into_iter().find_map(|name| {
        let mac = read_trimmed(&Path::new("/sys/class/net").join(name).join("address"))?;
        (!mac.is_empty() && mac != "00:00:00:00:00:00").then_some(mac)
    })
}

fn read_hostname() -> Option<String> {
    const CANDIDATES: &[&str] = &["/proc/sys/kernel/hostname", "/etc/hostname"];
    CANDIDATES
        .iter()
        .find_map(|p| read_trimmed(Path::new(p)))
        .or_else(|| std::env::var("HOSTNAME").ok())
        .filter(|s| !s.is_empty())
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

//! Decoy files — plausible-looking non-vault artifacts.
//!
//! Decoys sit in `<vault-dir>/decoys/` next to the real container so
//! size and byte-prefix heuristics cannot single out the real file.
//! Each decoy opens with the genuine header bytes of a recognizable
//! format (PNG, ZIP, SQLite, gzip) or reads as rotating log text, with a
//! randomized body and size.  They hold no vault data, are never read
//! back except to refresh timestamps, and are tracked by the checksum
//! manifest exactly like the real files — tampering with a decoy costs
//! the attacker the same as tampering with the container.

use std::fs;
use std::path::Path;

use chrono::{Duration, Utc};
use rand::RngCore;

use crate::errors::Result;
use crate::store::DECOY_DIR;

/// Smallest and largest decoy body, in bytes.
const MIN_BODY: usize = 2 * 1024;
const MAX_BODY: usize = 32 * 1024;

/// The file styles decoys cycle through.
#[derive(Debug, Clone, Copy)]
enum Style {
    Png,
    Zip,
    Sqlite,
    Gzip,
    Log,
}

const STYLES: &[Style] = &[Style::Png, Style::Zip, Style::Sqlite, Style::Gzip, Style::Log];

impl Style {
    fn file_name(self, index: usize) -> String {
        match self {
            Style::Png => format!("assets-{index}.png"),
            Style::Zip => format!("bundle-{index}.zip"),
            Style::Sqlite => format!("index-{index}.db"),
            Style::Gzip => format!("archive-{index}.gz"),
            Style::Log => format!("session-{index}.log"),
        }
    }

    fn header(self) -> &'static [u8] {
        match self {
            Style::Png => &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
            Style::Zip => &[b'P', b'K', 0x03, 0x04],
            Style::Sqlite => b"SQLite format 3\0",
            Style::Gzip => &[0x1F, 0x8B, 0x08, 0x00],
            Style::Log => &[],
        }
    }

    fn body(self, len: usize) -> Vec<u8> {
        match self {
            Style::Log => log_text(len),
            _ => {
                let mut body = vec![0u8; len];
                rand::rngs::OsRng.fill_bytes(&mut body);
                body
            }
        }
    }
}

/// Generate `count` decoys under `<dir>/decoys/`, replacing any that
/// already exist.  Returns the manifest-relative names of the new files.
pub fn generate(dir: &Path, count: usize) -> Result<Vec<String>> {
    let decoy_dir = dir.join(DECOY_DIR);
    if decoy_dir.exists() {
        fs::remove_dir_all(&decoy_dir)?;
    }
    if count == 0 {
        return Ok(Vec::new());
    }
    fs::create_dir_all(&decoy_dir)?;

    let mut names = Vec::with_capacity(count);
    for index in 0..count {
        let style = STYLES[index % STYLES.len()];
        let file_name = style.file_name(index);

        let len = random_len();
        let mut bytes = Vec::with_capacity(style.header().len() + len);
        bytes.extend_from_slice(style.header());
        bytes.extend_from_slice(&style.body(len));

        fs::write(decoy_dir.join(&file_name), &bytes)?;
        names.push(format!("{DECOY_DIR}/{file_name}"));
    }

    Ok(names)
}

/// Manifest-relative names of decoys currently on disk, sorted.
pub fn list(dir: &Path) -> Result<Vec<String>> {
    let decoy_dir = dir.join(DECOY_DIR);
    if !decoy_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names: Vec<String> = fs::read_dir(&decoy_dir)?
        .filter_map(|e| e.ok())
        .map(|e| format!("{DECOY_DIR}/{}", e.file_name().to_string_lossy()))
        .collect();
    names.sort();
    Ok(names)
}

/// Rewrite each decoy with its own bytes, bumping modification times
/// without changing content (digests stay valid).
pub fn refresh(dir: &Path) -> Result<()> {
    let decoy_dir = dir.join(DECOY_DIR);
    if !decoy_dir.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(&decoy_dir)? {
        let path = entry?.path();
        let bytes = fs::read(&path)?;
        fs::write(&path, &bytes)?;
    }
    Ok(())
}

fn random_len() -> usize {
    let span = (MAX_BODY - MIN_BODY) as u32;
    MIN_BODY + (rand::rngs::OsRng.next_u32() % span) as usize
}

/// Plausible rotating-log text: timestamped lines over the past days.
fn log_text(target_len: usize) -> Vec<u8> {
    const LINES: &[&str] = &[
        "INFO  session refresh completed",
        "DEBUG cache miss for layout bundle",
        "INFO  window focus gained",
        "WARN  retrying asset fetch (attempt 2)",
        "INFO  settings synced to disk",
        "DEBUG gc pass finished in 12ms",
    ];

    let mut out = Vec::with_capacity(target_len + 64);
    let mut stamp = Utc::now() - Duration::days(3);
    let mut pick = rand::rngs::OsRng.next_u32() as usize;

    while out.len() < target_len {
        let line = LINES[pick % LINES.len()];
        pick = pick.wrapping_mul(31).wrapping_add(7);
        stamp += Duration::seconds((pick % 900) as i64 + 5);
        out.extend_from_slice(format!("{} {line}\n", stamp.format("%Y-%m-%d %H:%M:%S")).as_bytes());
    }
    out
}

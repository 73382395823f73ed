//! Session and tab identity.
//!
//! The session id correlates every request with one sandbox container and
//! survives restarts; the tab id identifies this process in health calls.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

const SESSION_PREFIX: &str = "session-";
const SESSION_SUFFIX_LEN: usize = 7;

/// Generates `session-<7 lowercase alphanumerics>`.
pub fn generate_session_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{SESSION_PREFIX}{}", &random[..SESSION_SUFFIX_LEN])
}

/// Generates a per-process tab id.
pub fn generate_tab_id() -> String {
    format!("tab-{}", uuid::Uuid::new_v4())
}

/// Reads the persisted session id, creating and storing one if absent.
///
/// # Errors
/// Returns an error if the file cannot be read or written.
pub fn load_or_create(path: &Path) -> Result<String> {
    if path.exists() {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session id from {}", path.display()))?;
        let id = contents.trim();
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }
    rotate(path)
}

/// Replaces the persisted session id with a fresh one.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn rotate(path: &Path) -> Result<String> {
    let id = generate_session_id();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, format!("{id}\n"))
        .with_context(|| format!("Failed to write session id to {}", path.display()))?;
    tracing::info!(session_id = %id, "created session id");
    Ok(id)
}

/// Resolves the session id: an explicit override wins and is not persisted.
///
/// # Errors
/// Returns an error if the persisted id cannot be loaded or created.
pub fn resolve(explicit: Option<&str>, path: &Path) -> Result<String> {
    match explicit.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => load_or_create(path),
    }
}

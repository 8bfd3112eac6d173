//! Persisted pad server settings.
//!
//! Stored as JSON under the platform config directory
//! (`<config dir>/pad-sync/config.json`). Settings are re-read before
//! every operation, so an edit here is picked up by the next command or
//! watch event without restarting anything.

use anyhow::{Context, Result};
use pad_sync_core::PadConfig;
use std::path::{Path, PathBuf};

/// Default location of the settings file.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pad-sync")
        .join("config.json")
}

/// Load settings, falling back to defaults when the file does not exist.
/// A malformed file is an error rather than silently reverting to
/// defaults, so a typo cannot point commands at the wrong server.
pub fn load(path: &Path) -> Result<PadConfig> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("malformed settings file: {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PadConfig::default()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Persist settings, creating the parent directory if needed.
pub fn save(path: &Path, config: &PadConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    std::fs::write(path, raw).with_context(|| format!("failed to write {}", path.display()))
}

//! Persisted UI hints.
//!
//! Written immediately before a navigation instruction is issued so the web
//! UI can suppress its default splash redirect. The UI layer is the only
//! reader and clearer of these keys; the host only ever writes them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const HINTS_FILE: &str = "ui-hints.json";

/// Key/value hints mirrored into the UI's persistent store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiHints {
    #[serde(rename = "nativeNavigationPending", default)]
    pub native_navigation_pending: Option<String>,
    #[serde(rename = "nativeNavigationPath", default)]
    pub native_navigation_path: Option<String>,
}

fn default_dir() -> Result<PathBuf> {
    let base = dirs::data_dir().context("no user data directory available on this host")?;
    Ok(base.join("order-alert-cli"))
}

fn hints_path(dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match dir {
        Some(d) => d.to_path_buf(),
        None => default_dir()?,
    };
    Ok(dir.join(HINTS_FILE))
}

/// Record that a native navigation to `path_hint` is pending. Returns the
/// file written.
pub fn write_nav_hints(dir: Option<&Path>, path_hint: &str) -> Result<PathBuf> {
    let file = hints_path(dir)?;
    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let hints = UiHints {
        native_navigation_pending: Some("true".to_string()),
        native_navigation_path: Some(path_hint.to_string()),
    };
    let json = serde_json::to_string_pretty(&hints)?;
    fs::write(&file, json).with_context(|| format!("writing {}", file.display()))?;
    Ok(file)
}

/// Read the current hints. A missing file reads as empty hints.
pub fn read_nav_hints(dir: Option<&Path>) -> Result<UiHints> {
    let file = hints_path(dir)?;
    if !file.exists() {
        return Ok(UiHints::default());
    }
    let raw =
        fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))
}

/// Drop the hints file, as the UI does once it has honored the redirect.
pub fn clear_nav_hints(dir: Option<&Path>) -> Result<()> {
    let file = hints_path(dir)?;
    if file.exists() {
        fs::remove_file(&file).with_context(|| format!("removing {}", file.display()))?;
    }
    Ok(())
}

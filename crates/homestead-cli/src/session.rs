//! The signed in actor, kept between runs in `~/.config/homestead/session.json`.
use anyhow::{Context, Result};
use homestead::auth::Actor;
use std::fs;
use std::path::{Path, PathBuf};

pub fn session_path() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
    Ok(home_dir
        .join(".config")
        .join("homestead")
        .join("session.json"))
}

pub fn load_from(path: &Path) -> Result<Option<Actor>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read session file {}", path.display()))?;
    let actor = serde_json::from_str(&content)
        .with_context(|| format!("Session file {} is corrupt", path.display()))?;
    Ok(Some(actor))
}

pub fn save_to(path: &Path, actor: &Actor) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(actor)?;
    fs::write(path, content)
        .with_context(|| format!("Failed to write session file {}", path.display()))?;
    Ok(())
}

/// Remove the saved session; false when there was none
pub fn clear_at(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}

pub fn load() -> Result<Option<Actor>> {
    load_from(&session_path()?)
}

pub fn save(actor: &Actor) -> Result<()> {
    save_to(&session_path()?, actor)
}

pub fn clear() -> Result<bool> {
    clear_at(&session_path()?)
}

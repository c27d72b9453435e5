//! Centralized path management for vedit.
//! Every root can be redirected through an environment variable, which keeps
//! test runs away from the real user directories.

use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "vedit";

fn env_override(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn ensure_dir(dir: PathBuf, what: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating {what} directory at {}", dir.display()))?;
    Ok(dir)
}

/// Get the vedit config directory
pub fn vedit_config_dir() -> Result<PathBuf> {
    let config_dir = match env_override("VEDIT_CONFIG_DIR") {
        Some(dir) => dir,
        None => dirs::config_dir()
            .context("Unable to determine user config directory")?
            .join(APP_DIR_NAME),
    };
    ensure_dir(config_dir, "config")
}

/// Get the vedit data directory (session snapshot, job history)
pub fn vedit_data_dir() -> Result<PathBuf> {
    let data_dir = match env_override("VEDIT_DATA_DIR") {
        Some(dir) => dir,
        None => data_root(dirs::data_dir(), dirs::home_dir())?.join(APP_DIR_NAME),
    };
    ensure_dir(data_dir, "data")
}

/// Platform data directory, else the XDG default below the home directory
fn data_root(data_dir: Option<PathBuf>, home_dir: Option<PathBuf>) -> Result<PathBuf> {
    data_dir
        .or_else(|| home_dir.map(|home| home.join(".local").join("share")))
        .context("Unable to determine user data directory")
}

/// Get the vedit cache root. Not created here: the scratch area below it is
/// created on demand and may be purged at any time.
pub fn vedit_cache_dir() -> Result<PathBuf> {
    if let Some(dir) = env_override("VEDIT_CACHE_DIR") {
        return Ok(dir);
    }
    Ok(dirs::cache_dir()
        .context("Unable to determine user cache directory")?
        .join(APP_DIR_NAME))
}

/// Get the public videos directory ("Movies" on macOS, XDG videos on Linux)
pub fn public_videos_dir() -> Result<PathBuf> {
    if let Some(dir) = env_override("VEDIT_VIDEOS_DIR") {
        return Ok(dir);
    }
    if let Some(dir) = dirs::video_dir() {
        return Ok(dir);
    }
    Ok(dirs::home_dir()
        .context("Unable to determine home directory for the videos folder")?
        .join("Videos"))
}

//! Filesystem locations for configuration, logs and cache.

use std::env;
use std::path::{Path, PathBuf};

/// Directory name used under every base directory.
const APP_DIR: &str = "brewdeck";

/// What: Pick a base directory from an XDG variable value or `$HOME` + segments.
///
/// Inputs:
/// - `xdg`: Value of the XDG variable, if set.
/// - `home`: Value of `$HOME`, if set.
/// - `home_default`: Segments appended to `home` when `xdg` is unset or blank.
///
/// Output: Resolved base directory; `.` stands in for a missing `$HOME`.
fn resolve_base(xdg: Option<&str>, home: Option<&str>, home_default: &[&str]) -> PathBuf {
    if let Some(p) = xdg
        && !p.trim().is_empty()
    {
        return PathBuf::from(p);
    }
    let mut base = PathBuf::from(home.unwrap_or("."));
    for seg in home_default {
        base = base.join(seg);
    }
    base
}

fn xdg_base_dir(var: &str, home_default: &[&str]) -> PathBuf {
    let xdg = env::var(var).ok();
    let home = env::var("HOME").ok();
    resolve_base(xdg.as_deref(), home.as_deref(), home_default)
}

/// Return `$HOME/.config/brewdeck`, ensuring it exists.
fn home_config_dir() -> Option<PathBuf> {
    let home = env::var("HOME").ok()?;
    let dir = Path::new(&home).join(".config").join(APP_DIR);
    std::fs::create_dir_all(&dir).is_ok().then_some(dir)
}

/// Config directory for brewdeck (ensured to exist).
///
/// Prefers `$HOME/.config/brewdeck`, then `$XDG_CONFIG_HOME/brewdeck`.
pub fn config_dir() -> PathBuf {
    if let Some(dir) = home_config_dir() {
        return dir;
    }
    let dir = xdg_base_dir("XDG_CONFIG_HOME", &[".config"]).join(APP_DIR);
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Logs directory under config: `$HOME/.config/brewdeck/logs` (ensured to exist)
pub fn logs_dir() -> PathBuf {
    let dir = config_dir().join("logs");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Default settings file location.
pub fn settings_path() -> PathBuf {
    config_dir().join("settings.conf")
}

/// Default cache root: `$XDG_CACHE_HOME/brewdeck`, else `$HOME/.cache/brewdeck`.
///
/// Not created here; the cache creates it on first save.
pub fn cache_dir() -> PathBuf {
    xdg_base_dir("XDG_CACHE_HOME", &[".cache"]).join(APP_DIR)
}

//! Autostart Integration (autostart)
//!
//! Toggles launch-at-login by writing or removing a `.desktop` entry in the
//! user's XDG autostart directory. The entry runs the binary with
//! `--startup` so a stale entry can be told apart from a manual launch.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const DESKTOP_FILE: &str = "aster-welcome.desktop";

fn desktop_entry() -> String {
    [
        "[Desktop Entry]",
        "Type=Application",
        "Name=AsterOS Welcome",
        "Comment=Welcome to AsterOS",
        "Exec=aster-welcome --startup",
        "Icon=aster-welcome",
        "Terminal=false",
        "X-GNOME-Autostart-enabled=true",
        "",
    ]
    .join("\n")
}

pub fn autostart_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not find config directory")?;
    Ok(config_dir.join("autostart"))
}

pub fn enable_in(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(DESKTOP_FILE);
    fs::write(&path, desktop_entry())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub fn disable_in(dir: &Path) -> Result<()> {
    let path = dir.join(DESKTOP_FILE);
    if path.exists() {
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

pub fn is_enabled_in(dir: &Path) -> bool {
    dir.join(DESKTOP_FILE).exists()
}

pub fn enable() -> Result<PathBuf> {
    enable_in(&autostart_dir()?)
}

pub fn disable() -> Result<()> {
    disable_in(&autostart_dir()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_disable_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("autostart");
        assert!(!is_enabled_in(&dir));

        let path = enable_in(&dir).unwrap();
        assert!(is_enabled_in(&dir));
        let entry = fs::read_to_string(&path).unwrap();
        assert!(entry.starts_with("[Desktop Entry]"));
        assert!(entry.contains("Exec=aster-welcome --startup"));

        disable_in(&dir).unwrap();
        assert!(!is_enabled_in(&dir));
    }

    #[test]
    fn test_disable_is_a_no_op_without_entry() {
        let tmp = tempfile::tempdir().unwrap();
        disable_in(tmp.path()).unwrap();
    }
}

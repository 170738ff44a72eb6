//! Application Settings (settings)
//!
//! A flat JSON settings document stored in the user's config directory.
//! Read once at startup and rewritten on every change, so toggles survive
//! restarts. Keys missing from an older file are filled with defaults and
//! written back immediately, so a partial file heals itself.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const SETTINGS_FILE: &str = "settings.json";

// --- Settings Model ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub auto_start_enabled: bool,
    pub log_directory: String,
    pub current_log_file: String,
    pub show_install_info: bool,

    // ISO tab feature toggles (operators can hide switches per image)
    pub show_update_toggle: bool,
    pub show_git_toggle: bool,
    pub show_github_toggle: bool,

    // Installer package identities
    pub installer_package: String,
    pub installer_config_package: String,
    pub installer_repo: String,
    pub installer_config_repo: String,

    // Installer preflight checks and DNS selection (ISO mode)
    pub internet_check_enabled: bool,
    pub memory_check_enabled: bool,
    pub storage_check_enabled: bool,
    pub dns_choice: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            auto_start_enabled: true,
            log_directory: "~/.cache/aster-welcome/logs".to_string(),
            current_log_file: String::new(),
            show_install_info: true,
            show_update_toggle: true,
            show_git_toggle: true,
            show_github_toggle: true,
            installer_package: "calamares-core".to_string(),
            installer_config_package: "calamares-configuration".to_string(),
            installer_repo: "asteros-linux/calamares-core".to_string(),
            installer_config_repo: "asteros-linux/calamares-configuration".to_string(),
            internet_check_enabled: true,
            memory_check_enabled: true,
            storage_check_enabled: true,
            dns_choice: "isp".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `<dir>/settings.json`.
    /// A missing file materializes the defaults; an unreadable one is
    /// replaced by defaults after a console warning. Either way the merged
    /// document is persisted so every key exists on disk afterwards.
    pub fn load(dir: &Path) -> Result<Settings> {
        let path = dir.join(SETTINGS_FILE);
        let settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str::<Settings>(&content) {
                Ok(parsed) => parsed,
                Err(e) => {
                    // Logging may not be up yet when this runs, so use stderr.
                    eprintln!(
                        "Warning: {} is not valid JSON ({}), falling back to defaults",
                        path.display(),
                        e
                    );
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };
        settings.save(dir)?;
        Ok(settings)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// The log directory with `~` expanded.
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.log_directory).to_string())
    }
}

// --- Store ---

/// Shared handle to the settings file. Widgets hold an `Rc<Store>` and call
/// `update`, which persists the change immediately.
pub struct Store {
    dir: PathBuf,
    values: RefCell<Settings>,
}

impl Store {
    pub fn open() -> Result<Rc<Store>> {
        let dir = default_dir()?;
        Ok(Rc::new(Store::open_at(dir)?))
    }

    pub fn open_at(dir: PathBuf) -> Result<Store> {
        let values = Settings::load(&dir)?;
        Ok(Store {
            dir,
            values: RefCell::new(values),
        })
    }

    /// A snapshot of the current values.
    pub fn get(&self) -> Settings {
        self.values.borrow().clone()
    }

    /// Mutates the settings and writes them back. A failed write is logged
    /// and the in-memory value kept, so the session keeps working.
    pub fn update(&self, mutate: impl FnOnce(&mut Settings)) {
        let mut values = self.values.borrow_mut();
        mutate(&mut values);
        if let Err(e) = values.save(&self.dir) {
            warn!("Failed to save settings: {e:#}");
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }
}

pub fn default_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not find config directory")?;
    Ok(config_dir.join("aster-welcome"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_materialize_on_first_load() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert!(settings.auto_start_enabled);
        assert!(settings.show_install_info);
        assert_eq!(settings.dns_choice, "isp");
        // The file now exists with every key written out
        let on_disk = fs::read_to_string(tmp.path().join(SETTINGS_FILE)).unwrap();
        assert!(on_disk.contains("auto_start_enabled"));
        assert!(on_disk.contains("installer_package"));
    }

    #[test]
    fn test_toggle_persists_and_reloads_identically() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open_at(tmp.path().to_path_buf()).unwrap();
        store.update(|s| {
            s.auto_start_enabled = false;
            s.show_install_info = false;
        });
        let reloaded = Store::open_at(tmp.path().to_path_buf()).unwrap();
        assert!(!reloaded.get().auto_start_enabled);
        assert!(!reloaded.get().show_install_info);
        assert!(reloaded.get().show_update_toggle);
    }

    #[test]
    fn test_partial_file_self_heals() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join(SETTINGS_FILE),
            r#"{"auto_start_enabled": false}"#,
        )
        .unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert!(!settings.auto_start_enabled);
        assert!(settings.internet_check_enabled);
        let on_disk = fs::read_to_string(tmp.path().join(SETTINGS_FILE)).unwrap();
        assert!(on_disk.contains("internet_check_enabled"));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(SETTINGS_FILE), "{not json").unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert!(settings.auto_start_enabled);
    }

    #[test]
    fn test_log_dir_expands_tilde() {
        let settings = Settings::default();
        let dir = settings.log_dir();
        assert!(!dir.to_string_lossy().starts_with('~'));
    }
}

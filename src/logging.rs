//! Log Setup (logging)
//!
//! Writes a per-run log file named `welcome-<timestamp>.log` into the
//! configured log directory and mirrors INFO-and-up onto stderr. Old log
//! files are pruned so only the newest few runs are kept.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub const LOG_PREFIX: &str = "welcome-";
pub const LOGS_TO_KEEP: usize = 5;

/// Initializes the global subscriber. Returns the path of the new log file
/// and a guard that must stay alive for the duration of the process, or
/// buffered lines are lost on exit.
pub fn init(log_dir: &Path) -> Result<(WorkerGuard, PathBuf)> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    if let Err(e) = prune_old_logs(log_dir, LOGS_TO_KEEP) {
        eprintln!("Warning: could not prune old log files: {e:#}");
    }

    let file_name = format!("{}{}.log", LOG_PREFIX, Local::now().format("%Y-%m-%d_%H_%M_%S"));
    let path = log_dir.join(file_name);
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::DEBUG);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        );

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok((guard, path))
}

/// Deletes old `welcome-*.log` files, keeping the newest `keep`. The
/// timestamp in the file name is zero padded, so a lexicographic sort is a
/// chronological one. Returns how many files were removed.
pub fn prune_old_logs(log_dir: &Path, keep: usize) -> Result<usize> {
    let mut logs: Vec<PathBuf> = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to list {}", log_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(LOG_PREFIX) && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect();

    logs.sort();
    logs.reverse();

    let mut removed = 0;
    for stale in logs.iter().skip(keep) {
        fs::remove_file(stale)
            .with_context(|| format!("Failed to remove {}", stale.display()))?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), "x").unwrap();
    }

    #[test]
    fn test_prune_keeps_newest() {
        let tmp = tempfile::tempdir().unwrap();
        for day in 1..=8 {
            touch(tmp.path(), &format!("welcome-2026-03-0{day}_10_00_00.log"));
        }
        let removed = prune_old_logs(tmp.path(), 5).unwrap();
        assert_eq!(removed, 3);
        assert!(!tmp.path().join("welcome-2026-03-01_10_00_00.log").exists());
        assert!(!tmp.path().join("welcome-2026-03-03_10_00_00.log").exists());
        assert!(tmp.path().join("welcome-2026-03-04_10_00_00.log").exists());
        assert!(tmp.path().join("welcome-2026-03-08_10_00_00.log").exists());
    }

    #[test]
    fn test_prune_ignores_unrelated_files() {
        let tmp = tempfile::tempdir().unwrap();
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "welcome-2026-03-01_10_00_00.log");
        let removed = prune_old_logs(tmp.path(), 5).unwrap();
        assert_eq!(removed, 0);
        assert!(tmp.path().join("notes.txt").exists());
    }
}

//! Batch Jobs (batch)
//!
//! The one recurring pattern in this application: an ordered queue of log
//! messages and shell invocations executed strictly in order on a worker
//! thread, streaming status lines back to the GUI over a channel.
//!
//! 1. **Sequential:** steps run one after another, and the queue halts at
//!    the first failing step. No retries, no branching recovery.
//! 2. **Non-blocking:** `start()` spawns a `std::thread` and returns a
//!    receiver; the GUI polls it from a `glib` timeout so widgets are only
//!    touched on the main loop.
//! 3. **Mirrored logging:** every line sent to the console pane is also
//!    written to the log file through `tracing`.

use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::{Context, Result, bail};
use notify_rust::{Notification, Urgency};

use crate::packages;

pub const SIDELOAD_DIR: &str = "/tmp/aster-welcome-github";
const PACMAN_DB_LOCK: &str = "/var/lib/pacman/db.lck";

// --- Levels ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        }
    }

    /// Console pane colors, one per level.
    pub fn color(self) -> &'static str {
        match self {
            Level::Debug => "#808080",
            Level::Info => "#89b4fa",
            Level::Warning => "#ffa500",
            Level::Error => "#ff5555",
        }
    }
}

// --- Steps and Events ---

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A log line with no process behind it.
    Note(Level, String),
    /// Exec an argv, capture and log its output, fail the job on nonzero.
    Run(Vec<String>),
    /// Same, through `sh -c`.
    Shell(String),
    /// Spawn without waiting. Fails only if the spawn itself errors.
    Detach(Vec<String>),
    /// Install the packages unless they are all present already.
    InstallMissing {
        packages: Vec<String>,
        post_install: Option<Vec<String>>,
    },
    /// Uninstall whichever of the packages are actually installed.
    RemoveInstalled(Vec<String>),
    /// Refresh the pacman database, then reinstall only the outdated ones.
    UpdatePackages {
        packages: Vec<String>,
        clear_db_lock: bool,
    },
    /// Download and install a newer patch-compatible GitHub release, if any.
    SideloadRelease { package: String, repo: String },
}

#[derive(Debug)]
pub enum Event {
    Line(Level, String),
    Finished { ok: bool },
}

// --- The Job ---

pub struct BatchJob {
    label: String,
    steps: Vec<Step>,
}

impl BatchJob {
    pub fn new(label: impl Into<String>) -> BatchJob {
        BatchJob {
            label: label.into(),
            steps: Vec::new(),
        }
    }

    pub fn add(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub fn note(&mut self, level: Level, message: impl Into<String>) {
        self.steps.push(Step::Note(level, message.into()));
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Runs the queue on a worker thread. The returned receiver yields one
    /// `Line` per log message and a final `Finished`.
    pub fn start(self) -> Receiver<Event> {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let ok = self.run_all(&tx);
            if !ok {
                // Mirror the updater's habit: a desktop notification so a
                // failure is visible even with the console collapsed.
                let _ = Notification::new()
                    .summary("AsterOS Welcome")
                    .body(&format!(
                        "The task \"{}\" failed. Check the console for details.",
                        self.label
                    ))
                    .urgency(Urgency::Critical)
                    .show();
            }
            let _ = tx.send(Event::Finished { ok });
        });
        rx
    }

    fn run_all(&self, tx: &Sender<Event>) -> bool {
        for step in &self.steps {
            if let Err(e) = execute_step(step, tx) {
                emit(tx, Level::Error, format!("{e:#}"));
                emit(
                    tx,
                    Level::Error,
                    format!("Aborting \"{}\": remaining steps skipped.", self.label),
                );
                return false;
            }
        }
        true
    }
}

// --- Step Execution ---

fn execute_step(step: &Step, tx: &Sender<Event>) -> Result<()> {
    match step {
        Step::Note(level, message) => {
            emit(tx, *level, message.clone());
            Ok(())
        }
        Step::Run(argv) => run_logged(tx, argv),
        Step::Shell(script) => {
            let argv = vec!["sh".to_string(), "-c".to_string(), script.clone()];
            run_logged(tx, &argv)
        }
        Step::Detach(argv) => {
            let (cmd, args) = argv
                .split_first()
                .context("Tried to launch an empty command")?;
            Command::new(cmd)
                .args(args)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .with_context(|| format!("Failed to launch `{}`", argv.join(" ")))?;
            emit(tx, Level::Info, format!("Launched `{}`.", argv.join(" ")));
            Ok(())
        }
        Step::InstallMissing {
            packages,
            post_install,
        } => {
            if !packages::any_missing(packages) {
                emit(
                    tx,
                    Level::Debug,
                    format!("Already installed: {}.", packages.join(", ")),
                );
                return Ok(());
            }
            emit(
                tx,
                Level::Info,
                format!("Installing: {}...", packages.join(", ")),
            );
            run_logged(tx, &packages::install_args(packages))?;
            if let Some(post) = post_install {
                run_logged(tx, post)?;
            }
            Ok(())
        }
        Step::RemoveInstalled(packages) => {
            let present: Vec<String> = packages
                .iter()
                .filter(|p| packages::installed(p))
                .cloned()
                .collect();
            if present.is_empty() {
                emit(tx, Level::Debug, "No conflicting packages to remove.".to_string());
                return Ok(());
            }
            emit(
                tx,
                Level::Info,
                format!("Removing conflicting packages: {}...", present.join(", ")),
            );
            run_logged(tx, &packages::uninstall_args(&present))
        }
        Step::UpdatePackages {
            packages,
            clear_db_lock,
        } => {
            if *clear_db_lock {
                run_logged(
                    tx,
                    &argv(&["pkexec", "rm", "-f", PACMAN_DB_LOCK]),
                )?;
            }
            emit(tx, Level::Info, "Refreshing the package database...".to_string());
            run_logged(tx, &argv(&["pkexec", "pacman", "-Sy"]))?;
            let outdated = packages::filter_outdated(packages);
            if outdated.is_empty() {
                emit(
                    tx,
                    Level::Info,
                    format!("Already up to date: {}.", packages.join(", ")),
                );
                return Ok(());
            }
            emit(
                tx,
                Level::Info,
                format!("Updating: {}...", outdated.join(", ")),
            );
            run_logged(tx, &packages::install_args(&outdated))
        }
        Step::SideloadRelease { package, repo } => sideload_release(tx, package, repo),
    }
}

/// Checks GitHub for a newer patch-compatible release of `package` and, if
/// one exists, downloads its package asset with curl and installs it.
/// "No newer release" is a success, not a failure.
fn sideload_release(tx: &Sender<Event>, package: &str, repo: &str) -> Result<()> {
    emit(
        tx,
        Level::Debug,
        format!("Checking {} for a newer `{}` release...", repo, package),
    );
    let local_full = match packages::installed_version(package) {
        Ok(v) => v,
        Err(e) => {
            emit(tx, Level::Debug, format!("{e:#}; skipping the GitHub check."));
            return Ok(());
        }
    };
    let local = packages::upstream_version(&local_full).to_string();
    let release = match packages::latest_release(repo) {
        Ok(r) => r,
        Err(e) => {
            emit(
                tx,
                Level::Warning,
                format!("Could not query GitHub for {}: {e:#}", repo),
            );
            return Ok(());
        }
    };
    let remote = release.version().to_string();

    let newer = packages::compare_versions(&local, &remote)
        .map(|order| order < 0)
        .unwrap_or(false);
    if !newer {
        emit(
            tx,
            Level::Debug,
            format!("No newer release of `{}` on GitHub ({} vs {}).", package, local, remote),
        );
        return Ok(());
    }
    if !packages::patch_level_only(&local, &remote) {
        emit(
            tx,
            Level::Info,
            format!(
                "`{}` {} on GitHub is a major change over {}; a newer ISO is needed instead.",
                package, remote, local
            ),
        );
        return Ok(());
    }
    let asset = match release.package_asset() {
        Some(asset) => asset.clone(),
        None => {
            emit(
                tx,
                Level::Warning,
                format!("Release {} of {} has no installable package asset.", remote, repo),
            );
            return Ok(());
        }
    };

    emit(
        tx,
        Level::Info,
        format!("Downloading `{}` {} from GitHub...", package, remote),
    );
    let file = format!("{}/{}.pkg.tar.zst", SIDELOAD_DIR, package);
    run_logged(tx, &argv(&["rm", "-rf", SIDELOAD_DIR]))?;
    run_logged(tx, &argv(&["mkdir", "-p", SIDELOAD_DIR]))?;
    run_logged(
        tx,
        &argv(&[
            "curl",
            "--silent",
            "--location",
            "--output",
            file.as_str(),
            asset.browser_download_url.as_str(),
        ]),
    )?;
    emit(tx, Level::Info, "Installing the downloaded package...".to_string());
    run_logged(tx, &argv(&["pkexec", "rm", "-f", PACMAN_DB_LOCK]))?;
    run_logged(tx, &argv(&["pkexec", "pacman", "-U", "--noconfirm", file.as_str()]))
}

// --- Plumbing ---

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Runs an argv to completion, forwarding stdout as debug lines and stderr
/// as warnings. A nonzero exit fails the step.
fn run_logged(tx: &Sender<Event>, argv: &[String]) -> Result<()> {
    let (cmd, args) = argv.split_first().context("Tried to run an empty command")?;
    let joined = argv.join(" ");
    emit(tx, Level::Debug, format!("$ {}", joined));

    let output = Command::new(cmd)
        .args(args)
        .output()
        .with_context(|| format!("Failed to spawn `{}`", joined))?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        if !line.trim().is_empty() {
            emit(tx, Level::Debug, line.to_string());
        }
    }
    for line in String::from_utf8_lossy(&output.stderr).lines() {
        if !line.trim().is_empty() {
            emit(tx, Level::Warning, line.to_string());
        }
    }

    if !output.status.success() {
        bail!(
            "`{}` exited with code {}",
            joined,
            output.status.code().unwrap_or(-1)
        );
    }
    Ok(())
}

fn emit(tx: &Sender<Event>, level: Level, message: String) {
    match level {
        Level::Debug => tracing::debug!("{message}"),
        Level::Info => tracing::info!("{message}"),
        Level::Warning => tracing::warn!("{message}"),
        Level::Error => tracing::error!("{message}"),
    }
    let _ = tx.send(Event::Line(level, message));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: Receiver<Event>) -> (Vec<(Level, String)>, bool) {
        let mut lines = Vec::new();
        loop {
            match rx.recv().expect("job thread hung up without Finished") {
                Event::Line(level, message) => lines.push((level, message)),
                Event::Finished { ok } => return (lines, ok),
            }
        }
    }

    #[test]
    fn test_steps_run_in_order() {
        let mut job = BatchJob::new("ordering");
        job.note(Level::Info, "first");
        job.add(Step::Shell("echo second".to_string()));
        job.note(Level::Info, "third");
        let (lines, ok) = drain(job.start());
        assert!(ok);
        let messages: Vec<&str> = lines.iter().map(|(_, m)| m.as_str()).collect();
        let first = messages.iter().position(|m| *m == "first").unwrap();
        let second = messages.iter().position(|m| *m == "second").unwrap();
        let third = messages.iter().position(|m| *m == "third").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_queue_halts_on_first_failure() {
        let mut job = BatchJob::new("halting");
        job.add(Step::Shell("true".to_string()));
        job.add(Step::Shell("false".to_string()));
        job.note(Level::Info, "unreachable");
        let (lines, ok) = drain(job.start());
        assert!(!ok);
        assert!(lines.iter().all(|(_, m)| m != "unreachable"));
        assert!(
            lines
                .iter()
                .any(|(level, m)| *level == Level::Error && m.contains("exited with code 1"))
        );
    }

    #[test]
    fn test_stderr_becomes_warnings() {
        let mut job = BatchJob::new("stderr");
        job.add(Step::Shell("echo complaint >&2".to_string()));
        let (lines, ok) = drain(job.start());
        assert!(ok);
        assert!(
            lines
                .iter()
                .any(|(level, m)| *level == Level::Warning && m == "complaint")
        );
    }

    #[test]
    fn test_detach_does_not_wait() {
        let mut job = BatchJob::new("detach");
        job.add(Step::Detach(vec!["sleep".to_string(), "30".to_string()]));
        let started = std::time::Instant::now();
        let (_, ok) = drain(job.start());
        assert!(ok);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_detach_of_unknown_binary_fails() {
        let mut job = BatchJob::new("detach-missing");
        job.add(Step::Detach(vec!["definitely-not-a-real-binary".to_string()]));
        let (_, ok) = drain(job.start());
        assert!(!ok);
    }

    #[test]
    fn test_run_of_empty_argv_fails() {
        let mut job = BatchJob::new("empty");
        job.add(Step::Run(vec![]));
        let (_, ok) = drain(job.start());
        assert!(!ok);
    }
}

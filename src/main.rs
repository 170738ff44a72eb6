//! AsterOS Welcome
//!
//! The window that greets users on a fresh AsterOS install or on the live
//! ISO: links, a fixed menu of maintenance utilities installed on demand
//! through pacman, and the Calamares installer bootstrapper.
//!
//! 1. Reads settings from `~/.config/aster-welcome/settings.json`.
//! 2. Logs every run to a timestamped file, keeping the newest five.
//! 3. Loads the GTK interface; `--iso` enables the Install tab.

use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use gtk4::prelude::*;
use tracing::info;

mod autostart;
mod batch;
mod helpers;
mod launcher;
mod logging;
mod packages;
mod settings;
mod style;
mod ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Toolkit {
    Gtk,
}

#[derive(Debug, Parser)]
#[command(name = "aster-welcome", version, about = "The AsterOS welcome application")]
struct Args {
    /// UI toolkit to load
    #[arg(long, value_enum, default_value = "gtk")]
    ui: Toolkit,

    /// Run in ISO mode (live installer image); enables the Install tab
    #[arg(long)]
    iso: bool,

    /// Set by the autostart entry so a stale entry can be ignored
    #[arg(long)]
    startup: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    println!("AsterOS Welcome\n");

    let store = settings::Store::open().context("Could not open the settings store")?;

    // The autostart entry is removed when the toggle goes off, but a stale
    // copy may still fire once. Leave quietly instead of popping a window.
    if args.startup && !store.get().auto_start_enabled {
        println!("Auto start is disabled; exiting.");
        return Ok(());
    }

    let log_dir = store.get().log_dir();
    let (_guard, log_path) = logging::init(&log_dir).context("Could not set up logging")?;
    store.update(|s| s.current_log_file = log_path.display().to_string());
    info!("Logging to {}", log_path.display());

    // Reconcile the autostart entry with the setting, in case the config
    // was copied over from another machine.
    if !args.iso {
        match autostart::autostart_dir() {
            Ok(dir) => {
                if store.get().auto_start_enabled && !autostart::is_enabled_in(&dir) {
                    if let Err(e) = autostart::enable_in(&dir) {
                        tracing::warn!("Could not write the autostart entry: {e:#}");
                    }
                }
            }
            Err(e) => tracing::warn!("Could not locate the autostart directory: {e:#}"),
        }
    }

    match args.ui {
        Toolkit::Gtk => run_gtk(store, args.iso),
    }
    Ok(())
}

fn run_gtk(settings: Rc<settings::Store>, iso: bool) {
    info!("Loading the GTK interface (iso mode: {iso})...");

    let app = gtk4::Application::builder()
        .application_id("org.asteros.welcome")
        .build();

    let ctx = Rc::new(ui::AppContext { settings, iso });
    app.connect_activate(move |app| ui::build_ui(app, &ctx));

    // clap already consumed the command line; give GTK an empty one.
    app.run_with_args::<&str>(&[]);
}

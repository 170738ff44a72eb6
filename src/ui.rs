//! Main Window (ui)
//!
//! Builds the welcome window in code: a header with busy/ready lights, a
//! stack of pages (Install on the ISO, Links, Utilities), a collapsible
//! console pane fed by batch jobs, and a footer with the auto-start toggle.
//!
//! Threading rule: batch jobs run on worker threads and only this module
//! touches widgets, always from the main loop via `glib::timeout_add_local`
//! polls on the job's event channel.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use gtk4::prelude::*;
use gtk4::{Application, ApplicationWindow};

use crate::autostart;
use crate::batch::{Event, Level};
use crate::helpers;
use crate::launcher::{self, DnsChoice, Preflight, Utility};
use crate::packages;
use crate::settings::Store;
use crate::style;

pub struct AppContext {
    pub settings: Rc<Store>,
    pub iso: bool,
}

// --- Links Page Data ---

const LINKS: &[(&str, &str, &str)] = &[
    ("Website", "web-browser-symbolic", "https://asteros.org/"),
    ("AsterOS Wiki", "accessories-dictionary-symbolic", "https://wiki.asteros.org/"),
    ("Arch Wiki", "accessories-dictionary-symbolic", "https://wiki.archlinux.org/"),
    ("Service Status", "network-transmit-receive-symbolic", "https://status.asteros.org/"),
    ("Discord", "user-available-symbolic", "https://discord.gg/asteros"),
    ("Forum", "system-users-symbolic", "https://forum.asteros.org/"),
    ("Facebook", "emblem-shared-symbolic", "https://www.facebook.com/asteroslinux/"),
    ("Twitter", "user-status-pending-symbolic", "https://twitter.com/asteroslinux"),
    ("Feedback", "mail-send-symbolic", "https://asteros.org/contact/"),
    ("Donate", "emblem-favorite-symbolic", "https://asteros.org/donate/"),
    ("Source Code", "applications-engineering-symbolic", "https://github.com/asteros-linux"),
    ("About Us", "help-about-symbolic", "https://asteros.org/about/"),
];

const CONTACT_EMAIL: &str = "team@asteros.org";

// --- Console Pane ---

/// The log pane plus the header lights. Cheap to clone; all clones share
/// the same widgets.
#[derive(Clone)]
pub struct ConsolePane {
    inner: Rc<ConsoleInner>,
}

struct ConsoleInner {
    view: gtk4::TextView,
    buffer: gtk4::TextBuffer,
    end_mark: gtk4::TextMark,
    status: gtk4::Label,
    ready_light: gtk4::Label,
    busy_light: gtk4::Label,
    lights: gtk4::Box,
    container: gtk4::Box,
    active_jobs: Cell<u32>,
}

impl ConsolePane {
    pub fn new() -> ConsolePane {
        let view = gtk4::TextView::builder()
            .editable(false)
            .cursor_visible(false)
            .monospace(true)
            .wrap_mode(gtk4::WrapMode::WordChar)
            .css_classes(vec!["console".to_string()])
            .build();
        let buffer = view.buffer();
        let end_mark = buffer.create_mark(None, &buffer.end_iter(), false);

        let scrolled = gtk4::ScrolledWindow::builder()
            .min_content_height(150)
            .build();
        scrolled.set_child(Some(&view));

        let expander = gtk4::Expander::builder().label("Console").build();
        expander.set_child(Some(&scrolled));

        let status = gtk4::Label::builder()
            .label("Ready.")
            .halign(gtk4::Align::Start)
            .ellipsize(gtk4::pango::EllipsizeMode::End)
            .css_classes(vec!["status-line".to_string()])
            .build();

        let container = gtk4::Box::new(gtk4::Orientation::Vertical, 4);
        container.append(&expander);
        container.append(&status);

        // The header lights: green for ready, red for busy. Both stay
        // visible; only one is lit at a time.
        let ready_light = gtk4::Label::builder()
            .label("●")
            .css_classes(vec![
                "light".to_string(),
                "light-ready".to_string(),
                "lit".to_string(),
            ])
            .tooltip_text("Ready")
            .build();
        let busy_light = gtk4::Label::builder()
            .label("●")
            .css_classes(vec!["light".to_string(), "light-busy".to_string()])
            .tooltip_text("Working")
            .build();
        let lights = gtk4::Box::new(gtk4::Orientation::Horizontal, 6);
        lights.set_valign(gtk4::Align::Center);
        lights.append(&ready_light);
        lights.append(&busy_light);

        ConsolePane {
            inner: Rc::new(ConsoleInner {
                view,
                buffer,
                end_mark,
                status,
                ready_light,
                busy_light,
                lights,
                container,
                active_jobs: Cell::new(0),
            }),
        }
    }

    pub fn widget(&self) -> &gtk4::Box {
        &self.inner.container
    }

    pub fn lights(&self) -> &gtk4::Box {
        &self.inner.lights
    }

    /// Appends one line to the pane, colored by level, and mirrors
    /// non-debug messages onto the status label.
    pub fn append(&self, level: Level, message: &str) {
        let inner = &self.inner;
        let markup = format!(
            "- <span color=\"{}\">{:>8}: </span>{}\n",
            level.color(),
            level.label(),
            glib::markup_escape_text(message)
        );
        let mut end = inner.buffer.end_iter();
        inner.buffer.insert_markup(&mut end, &markup);
        inner.buffer.move_mark(&inner.end_mark, &inner.buffer.end_iter());
        inner.view.scroll_mark_onscreen(&inner.end_mark);

        if level != Level::Debug {
            inner.status.set_text(message);
        }
    }

    /// Starts draining a job's event channel on the main loop. Lights go
    /// red until every attached job has finished.
    pub fn attach(&self, rx: Receiver<Event>) {
        let inner = &self.inner;
        inner.active_jobs.set(inner.active_jobs.get() + 1);
        inner.ready_light.remove_css_class("lit");
        inner.busy_light.add_css_class("lit");

        let pane = self.clone();
        glib::timeout_add_local(Duration::from_millis(100), move || {
            loop {
                match rx.try_recv() {
                    Ok(Event::Line(level, message)) => pane.append(level, &message),
                    Ok(Event::Finished { ok }) => {
                        pane.finish(ok);
                        return glib::ControlFlow::Break;
                    }
                    Err(TryRecvError::Empty) => return glib::ControlFlow::Continue,
                    Err(TryRecvError::Disconnected) => {
                        pane.finish(false);
                        return glib::ControlFlow::Break;
                    }
                }
            }
        });
    }

    fn finish(&self, ok: bool) {
        let inner = &self.inner;
        let remaining = inner.active_jobs.get().saturating_sub(1);
        inner.active_jobs.set(remaining);
        if remaining == 0 {
            inner.busy_light.remove_css_class("lit");
            inner.ready_light.add_css_class("lit");
            if ok {
                inner.status.set_text("Ready.");
            }
        }
        if !ok {
            inner.status.set_text("Task failed. See the console for details.");
        }
    }
}

// --- Window Assembly ---

pub fn build_ui(app: &Application, ctx: &Rc<AppContext>) {
    style::load_css();

    let window = ApplicationWindow::builder()
        .application(app)
        .title("Welcome to AsterOS!")
        .default_width(780)
        .default_height(600)
        .build();

    let console = ConsolePane::new();

    let root = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
    root.set_margin_top(14);
    root.set_margin_bottom(14);
    root.set_margin_start(14);
    root.set_margin_end(14);

    // --- Header ---
    let title = gtk4::Label::builder()
        .label("Welcome to AsterOS!")
        .css_classes(vec!["app-title".to_string()])
        .halign(gtk4::Align::Start)
        .build();
    let subtitle = gtk4::Label::builder()
        .label(if ctx.iso {
            "Live session: install AsterOS, or look around first."
        } else {
            "Links and maintenance utilities for your system."
        })
        .css_classes(vec!["app-subtitle".to_string()])
        .halign(gtk4::Align::Start)
        .build();
    let title_box = gtk4::Box::new(gtk4::Orientation::Vertical, 2);
    title_box.append(&title);
    title_box.append(&subtitle);

    let spacer = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);
    spacer.set_hexpand(true);

    let header = gtk4::Box::new(gtk4::Orientation::Horizontal, 10);
    header.append(&title_box);
    header.append(&spacer);
    header.append(console.lights());

    // --- Pages ---
    let stack = gtk4::Stack::new();
    stack.set_vexpand(true);
    let switcher = gtk4::StackSwitcher::builder()
        .stack(&stack)
        .halign(gtk4::Align::Center)
        .build();

    if ctx.iso {
        let install_page = build_install_page(ctx, &console);
        stack.add_titled(&install_page, Some("install"), "Install");
    }
    let links_page = build_links_page(&window, &console);
    stack.add_titled(&links_page, Some("links"), "Links");
    let utilities_page = build_utilities_page(&window, &console);
    stack.add_titled(&utilities_page, Some("utilities"), "Utilities");

    // First visit to the Utilities page brings up the install-info dialog,
    // unless the user opted out of it.
    let ctx_info = ctx.clone();
    let window_info = window.clone();
    stack.connect_visible_child_name_notify(move |stack| {
        let on_utilities = stack
            .visible_child_name()
            .map(|name| name == "utilities")
            .unwrap_or(false);
        if on_utilities && ctx_info.settings.get().show_install_info {
            show_install_info_dialog(&window_info, &ctx_info);
        }
    });

    // --- Footer ---
    let footer = gtk4::Box::new(gtk4::Orientation::Horizontal, 10);

    if !ctx.iso {
        let startup_toggle = gtk4::CheckButton::with_label("Launch at login");
        startup_toggle.set_active(ctx.settings.get().auto_start_enabled);
        let ctx_startup = ctx.clone();
        let console_startup = console.clone();
        startup_toggle.connect_toggled(move |button| {
            let enabled = button.is_active();
            ctx_startup.settings.update(|s| s.auto_start_enabled = enabled);
            let result = if enabled {
                autostart::enable().map(|_| ())
            } else {
                autostart::disable()
            };
            match result {
                Ok(()) => console_startup.append(
                    Level::Debug,
                    if enabled {
                        "Auto start enabled."
                    } else {
                        "Auto start disabled."
                    },
                ),
                Err(e) => console_startup.append(
                    Level::Warning,
                    &format!("Could not update the autostart entry: {e:#}"),
                ),
            }
        });
        footer.append(&startup_toggle);
    }

    let footer_spacer = gtk4::Box::new(gtk4::Orientation::Horizontal, 0);
    footer_spacer.set_hexpand(true);
    footer.append(&footer_spacer);

    let log_button = gtk4::Button::with_label("Log");
    let ctx_log = ctx.clone();
    let window_log = window.clone();
    let console_log = console.clone();
    log_button.connect_clicked(move |_| {
        let path = ctx_log.settings.get().current_log_file;
        if path.is_empty() {
            console_log.append(Level::Warning, "No log file has been opened yet.");
            return;
        }
        open_with_xdg(
            &window_log,
            &console_log,
            vec!["xdg-open".to_string(), path],
        );
    });
    footer.append(&log_button);

    let settings_button = gtk4::Button::with_label("Settings File");
    let ctx_settings = ctx.clone();
    let window_settings = window.clone();
    let console_settings = console.clone();
    settings_button.connect_clicked(move |_| {
        let path = ctx_settings.settings.path().display().to_string();
        open_with_xdg(
            &window_settings,
            &console_settings,
            vec!["xdg-open".to_string(), path],
        );
    });
    footer.append(&settings_button);

    let about_button = gtk4::Button::with_label("About");
    let window_about = window.clone();
    about_button.connect_clicked(move |_| show_about_dialog(&window_about));
    footer.append(&about_button);

    // --- Assembly ---
    root.append(&header);
    root.append(&switcher);
    root.append(&stack);
    root.append(console.widget());
    root.append(&footer);

    window.set_child(Some(&root));
    window.present();
}

// --- Pages ---

fn build_links_page(window: &ApplicationWindow, console: &ConsolePane) -> gtk4::Box {
    let flow = gtk4::FlowBox::builder()
        .selection_mode(gtk4::SelectionMode::None)
        .column_spacing(10)
        .row_spacing(10)
        .max_children_per_line(3)
        .homogeneous(true)
        .build();

    for (label, icon, url) in LINKS {
        let button = helpers::make_link_button(icon, label);
        let window_link = window.clone();
        let console_link = console.clone();
        button.connect_clicked(move |_| {
            open_with_xdg(
                &window_link,
                &console_link,
                vec!["xdg-open".to_string(), url.to_string()],
            );
        });
        flow.insert(&button, -1);
    }

    let mail = helpers::make_link_button("mail-unread-symbolic", "Email the Team");
    let window_mail = window.clone();
    let console_mail = console.clone();
    mail.connect_clicked(move |_| {
        open_with_xdg(
            &window_mail,
            &console_mail,
            vec!["xdg-email".to_string(), CONTACT_EMAIL.to_string()],
        );
    });
    flow.insert(&mail, -1);

    let page = gtk4::Box::new(gtk4::Orientation::Vertical, 10);
    page.add_css_class("zone");
    page.append(&flow);
    page
}

fn build_utilities_page(window: &ApplicationWindow, console: &ConsolePane) -> gtk4::Box {
    let flow = gtk4::FlowBox::builder()
        .selection_mode(gtk4::SelectionMode::None)
        .column_spacing(10)
        .row_spacing(10)
        .max_children_per_line(4)
        .homogeneous(true)
        .build();

    for utility in launcher::UTILITIES {
        let button = helpers::make_tool_button(utility.icon, utility.label);
        let window_util = window.clone();
        let console_util = console.clone();
        button.connect_clicked(move |_| launch_utility(&window_util, &console_util, utility));
        flow.insert(&button, -1);
    }

    let page = gtk4::Box::new(gtk4::Orientation::Vertical, 10);
    page.add_css_class("zone");
    page.append(&flow);
    page
}

fn build_install_page(ctx: &Rc<AppContext>, console: &ConsolePane) -> gtk4::Box {
    let s = ctx.settings.get();
    let page = gtk4::Box::new(gtk4::Orientation::Vertical, 12);

    // --- Installer Buttons ---
    let install_zone = gtk4::Box::new(gtk4::Orientation::Vertical, 10);
    install_zone.add_css_class("zone");

    let heading = gtk4::Label::builder()
        .label("Install AsterOS")
        .css_classes(vec!["section-title".to_string()])
        .halign(gtk4::Align::Start)
        .build();
    install_zone.append(&heading);

    let buttons = gtk4::Box::new(gtk4::Orientation::Horizontal, 12);
    buttons.set_halign(gtk4::Align::Center);
    let online = gtk4::Button::builder()
        .label("Online Installation")
        .css_classes(vec!["install-btn".to_string()])
        .tooltip_text("Downloads the latest packages; needs a connection")
        .build();
    let offline = gtk4::Button::builder()
        .label("Offline Installation")
        .css_classes(vec!["install-btn".to_string()])
        .tooltip_text("Installs from the packages on this image")
        .build();
    buttons.append(&online);
    buttons.append(&offline);
    install_zone.append(&buttons);

    // --- Installer Switches ---
    let (update_row, update_switch) = helpers::make_switch_row("Update the installer packages first");
    let (git_row, git_switch) = helpers::make_switch_row("Use the development (git) installer");
    let (github_row, github_switch) =
        helpers::make_switch_row("Sideload the newest release from GitHub");
    if !s.show_update_toggle {
        update_row.set_visible(false);
    }
    if !s.show_git_toggle {
        git_row.set_visible(false);
    }
    if !s.show_github_toggle {
        github_row.set_visible(false);
    }

    // Git packages and GitHub releases are different sources; turning one
    // on turns the other off.
    let git_for_github = git_switch.clone();
    github_switch.connect_state_set(move |_, state| {
        if state {
            git_for_github.set_active(false);
        }
        glib::Propagation::Proceed
    });
    let github_for_git = github_switch.clone();
    git_switch.connect_state_set(move |_, state| {
        if state {
            github_for_git.set_active(false);
        }
        glib::Propagation::Proceed
    });

    install_zone.append(&update_row);
    install_zone.append(&git_row);
    install_zone.append(&github_row);
    page.append(&install_zone);

    // Both buttons share the plan assembly; only `offline` differs.
    let start_installer = {
        let ctx = ctx.clone();
        let console = console.clone();
        let update_switch = update_switch.clone();
        let git_switch = git_switch.clone();
        let github_switch = github_switch.clone();
        move |offline: bool| {
            let s = ctx.settings.get();
            let plan = launcher::InstallerPlan {
                core_package: s.installer_package,
                config_package: s.installer_config_package,
                core_repo: s.installer_repo,
                config_repo: s.installer_config_repo,
                offline,
                git: git_switch.is_active(),
                use_github: github_switch.is_active(),
                update: update_switch.is_active(),
            };
            console.attach(launcher::installer_job(&plan).start());
        }
    };
    let start_online = start_installer.clone();
    online.connect_clicked(move |_| start_online(false));
    let start_offline = start_installer.clone();
    offline.connect_clicked(move |_| start_offline(true));

    // --- Preflight Checks ---
    let checks_zone = gtk4::Box::new(gtk4::Orientation::Vertical, 6);
    checks_zone.add_css_class("zone");
    let checks_heading = gtk4::Label::builder()
        .label("Pre-installation checks")
        .css_classes(vec!["section-title".to_string()])
        .halign(gtk4::Align::Start)
        .build();
    checks_zone.append(&checks_heading);

    let checks = [
        (Preflight::Internet, "Require a working internet connection", s.internet_check_enabled),
        (Preflight::Memory, "Require enough memory", s.memory_check_enabled),
        (Preflight::Storage, "Require enough storage space", s.storage_check_enabled),
    ];
    for (check, label, initial) in checks {
        let toggle = gtk4::CheckButton::with_label(label);
        toggle.set_active(initial);
        let ctx_check = ctx.clone();
        let console_check = console.clone();
        toggle.connect_toggled(move |button| {
            let enable = button.is_active();
            ctx_check.settings.update(|s| match check {
                Preflight::Internet => s.internet_check_enabled = enable,
                Preflight::Memory => s.memory_check_enabled = enable,
                Preflight::Storage => s.storage_check_enabled = enable,
            });
            console_check.attach(launcher::preflight_job(check, enable).start());
        });
        checks_zone.append(&toggle);
    }
    page.append(&checks_zone);

    // --- DNS Selection ---
    let dns_zone = gtk4::Box::new(gtk4::Orientation::Vertical, 6);
    dns_zone.add_css_class("zone");
    let dns_heading = gtk4::Label::builder()
        .label("DNS servers for the live session")
        .css_classes(vec!["section-title".to_string()])
        .halign(gtk4::Align::Start)
        .build();
    dns_zone.append(&dns_heading);

    let isp = gtk4::CheckButton::with_label("Use my ISP's DNS servers");
    let cloudflare = gtk4::CheckButton::with_label("Use Cloudflare DNS (1.1.1.1)");
    cloudflare.set_group(Some(&isp));
    let google = gtk4::CheckButton::with_label("Use Google DNS (8.8.8.8)");
    google.set_group(Some(&isp));

    match DnsChoice::from_key(&s.dns_choice) {
        DnsChoice::Isp => isp.set_active(true),
        DnsChoice::Cloudflare => cloudflare.set_active(true),
        DnsChoice::Google => google.set_active(true),
    }

    for (button, choice) in [
        (&isp, DnsChoice::Isp),
        (&cloudflare, DnsChoice::Cloudflare),
        (&google, DnsChoice::Google),
    ] {
        let ctx_dns = ctx.clone();
        let console_dns = console.clone();
        button.connect_toggled(move |button| {
            // Radio groups fire toggled for both sides; act on the winner.
            if !button.is_active() {
                return;
            }
            ctx_dns.settings.update(|s| s.dns_choice = choice.key().to_string());
            console_dns.attach(launcher::dns_job(choice).start());
        });
        dns_zone.append(button);
    }
    page.append(&dns_zone);

    page
}

// --- Launch Flows ---

/// Launches a utility, offering to install it first when it is missing.
fn launch_utility(window: &ApplicationWindow, console: &ConsolePane, utility: &'static Utility) {
    let required: Vec<String> = utility.packages.iter().map(|s| s.to_string()).collect();
    if !packages::any_missing(&required) {
        console.attach(launcher::utility_job(utility, false).start());
        return;
    }

    let dialog = gtk4::MessageDialog::builder()
        .transient_for(window)
        .modal(true)
        .message_type(gtk4::MessageType::Question)
        .buttons(gtk4::ButtonsType::YesNo)
        .text(format!("{} is not installed", utility.label))
        .secondary_text(format!(
            "Install {} now? You may be asked for your password.",
            required.join(", ")
        ))
        .build();
    let console_answer = console.clone();
    dialog.connect_response(move |dialog, response| {
        if response == gtk4::ResponseType::Yes {
            console_answer.attach(launcher::utility_job(utility, true).start());
        } else {
            console_answer.append(
                Level::Info,
                &format!("Skipped installing {}.", utility.label),
            );
        }
        dialog.close();
    });
    dialog.present();
}

/// Opens a URL or file through xdg-utils, offering to install that first on
/// the (rare) system that lacks it.
fn open_with_xdg(window: &ApplicationWindow, console: &ConsolePane, argv: Vec<String>) {
    if !packages::any_missing(&["xdg-utils".to_string()]) {
        console.attach(launcher::open_job(argv, false).start());
        return;
    }

    let dialog = gtk4::MessageDialog::builder()
        .transient_for(window)
        .modal(true)
        .message_type(gtk4::MessageType::Question)
        .buttons(gtk4::ButtonsType::YesNo)
        .text("xdg-utils is not installed")
        .secondary_text("Opening links needs xdg-utils. Install it now?")
        .build();
    let console_answer = console.clone();
    dialog.connect_response(move |dialog, response| {
        if response == gtk4::ResponseType::Yes {
            console_answer.attach(launcher::open_job(argv.clone(), true).start());
        } else {
            console_answer.append(Level::Info, "Skipped installing xdg-utils.");
        }
        dialog.close();
    });
    dialog.present();
}

// --- Dialogs ---

fn show_install_info_dialog(window: &ApplicationWindow, ctx: &Rc<AppContext>) {
    let dialog = gtk4::MessageDialog::builder()
        .transient_for(window)
        .modal(true)
        .message_type(gtk4::MessageType::Info)
        .buttons(gtk4::ButtonsType::Ok)
        .text("Most utilities are not preinstalled")
        .secondary_text(
            "Launching a missing utility will offer to install it first through \
             the package manager. A privilege prompt may appear.",
        )
        .build();

    let again = gtk4::CheckButton::with_label("Show this the next time this page opens");
    again.set_active(true);
    if let Ok(area) = dialog.message_area().downcast::<gtk4::Box>() {
        area.append(&again);
    }

    let ctx_dialog = ctx.clone();
    dialog.connect_response(move |dialog, _| {
        ctx_dialog
            .settings
            .update(|s| s.show_install_info = again.is_active());
        dialog.close();
    });
    dialog.present();
}

fn show_about_dialog(window: &ApplicationWindow) {
    let about = gtk4::AboutDialog::builder()
        .transient_for(window)
        .modal(true)
        .program_name("AsterOS Welcome")
        .version(env!("CARGO_PKG_VERSION"))
        .comments("Links, maintenance utilities and the installer bootstrapper for AsterOS.")
        .website("https://asteros.org/")
        .license_type(gtk4::License::Gpl30)
        .logo_icon_name("aster-welcome")
        .build();
    about.present();
}

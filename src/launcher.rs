//! Launch Planning (launcher)
//!
//! Builds the batch jobs behind every button: third-party utilities, link
//! opening, the Calamares installer variants, and the ISO housekeeping
//! toggles. Planning is pure (it only assembles steps); execution lives in
//! `batch`.

use crate::batch::{BatchJob, Level, Step};
use crate::packages;

// --- Third-Party Utilities ---

pub struct Utility {
    pub label: &'static str,
    pub icon: &'static str,
    pub packages: &'static [&'static str],
    pub exec: &'static [&'static str],
    pub post_install: Option<&'static [&'static str]>,
}

// The fixed maintenance menu. Executables differ from package names where
// upstream ships a launcher script (timeshift) or a desktop id (gufw).
pub const UTILITIES: &[Utility] = &[
    Utility {
        label: "Pamac",
        icon: "system-software-install-symbolic",
        packages: &["pamac-aur"],
        exec: &["pamac-manager"],
        post_install: None,
    },
    Utility {
        label: "Stacer",
        icon: "utilities-system-monitor-symbolic",
        packages: &["stacer"],
        exec: &["stacer"],
        post_install: None,
    },
    Utility {
        label: "Hardinfo",
        icon: "computer-symbolic",
        packages: &["hardinfo2"],
        exec: &["hardinfo2"],
        post_install: None,
    },
    Utility {
        label: "Disk Usage",
        icon: "drive-harddisk-symbolic",
        packages: &["baobab"],
        exec: &["baobab"],
        post_install: None,
    },
    Utility {
        label: "BleachBit",
        icon: "edit-clear-all-symbolic",
        packages: &["bleachbit"],
        exec: &["bleachbit"],
        post_install: None,
    },
    Utility {
        label: "Refresh Mirrors",
        icon: "emblem-synchronizing-symbolic",
        packages: &["refresh-mirrors"],
        exec: &["gtk-launch", "refresh-mirrors"],
        post_install: None,
    },
    Utility {
        label: "Pace",
        icon: "preferences-system-symbolic",
        packages: &["pace"],
        exec: &["pace"],
        post_install: None,
    },
    Utility {
        label: "Grub Customizer",
        icon: "application-x-firmware-symbolic",
        packages: &["grub-customizer"],
        exec: &["grub-customizer"],
        post_install: None,
    },
    Utility {
        label: "GParted",
        icon: "drive-multidisk-symbolic",
        packages: &["gparted"],
        exec: &["gparted"],
        post_install: None,
    },
    Utility {
        label: "Timeshift",
        icon: "document-open-recent-symbolic",
        packages: &["timeshift"],
        exec: &["timeshift-launcher"],
        post_install: None,
    },
    Utility {
        label: "Firewall",
        icon: "security-high-symbolic",
        packages: &["gufw"],
        exec: &["gtk-launch", "gufw"],
        post_install: Some(&["pkexec", "systemctl", "enable", "--now", "ufw"]),
    },
    Utility {
        label: "Aster Fire",
        icon: "applications-utilities-symbolic",
        packages: &["aster-fire"],
        exec: &["aster-fire"],
        post_install: None,
    },
];

/// The job for one utility button. `install` reflects the user's answer to
/// the missing-package prompt; the caller decides whether to ask.
pub fn utility_job(utility: &Utility, install: bool) -> BatchJob {
    let mut job = BatchJob::new(utility.label);
    if install {
        let packages: Vec<String> = utility.packages.iter().map(|s| s.to_string()).collect();
        job.note(
            Level::Info,
            format!("Trying to install: {}...", packages.join(", ")),
        );
        job.add(Step::Run(packages::install_args(&packages)));
        if let Some(post) = utility.post_install {
            job.add(Step::Run(post.iter().map(|s| s.to_string()).collect()));
        }
    }
    let exec: Vec<String> = utility.exec.iter().map(|s| s.to_string()).collect();
    job.note(Level::Info, format!("Launching `{}`...", exec.join(" ")));
    job.add(Step::Detach(exec));
    job
}

/// Opens a link or file through xdg-utils, installing that first if the
/// user agreed to.
pub fn open_job(argv: Vec<String>, install: bool) -> BatchJob {
    let mut job = BatchJob::new("open");
    if install {
        job.note(Level::Info, "Trying to install: xdg-utils...");
        job.add(Step::Run(packages::install_args(&["xdg-utils".to_string()])));
    }
    job.note(Level::Info, format!("Opening `{}`...", argv.join(" ")));
    job.add(Step::Detach(argv));
    job
}

// --- Installer ---

#[derive(Debug, Clone)]
pub struct InstallerPlan {
    pub core_package: String,
    pub config_package: String,
    pub core_repo: String,
    pub config_repo: String,
    pub offline: bool,
    pub git: bool,
    pub use_github: bool,
    pub update: bool,
}

/// Assembles the installer bootstrap sequence: drop whichever package
/// variants conflict with the requested one, optionally sideload a newer
/// GitHub release, install or update the requested packages, then hand off
/// to the Calamares desktop launcher.
pub fn installer_job(plan: &InstallerPlan) -> BatchJob {
    let mode = if plan.offline { "offline" } else { "online" };
    let core = &plan.core_package;
    let config = &plan.config_package;

    let mut job = BatchJob::new(format!("{mode} installer"));
    job.note(Level::Info, format!("Preparing the {mode} installer..."));

    let targets: Vec<String>;
    if plan.git {
        job.add(Step::RemoveInstalled(vec![
            core.clone(),
            config.clone(),
            format!("{core}-local"),
            format!("{config}-local"),
        ]));
        targets = vec![format!("{config}-git"), format!("{core}-git")];
    } else {
        job.add(Step::RemoveInstalled(vec![
            format!("{core}-git"),
            format!("{config}-git"),
            format!("{core}-local"),
            format!("{config}-local"),
        ]));
        if plan.use_github {
            job.add(Step::SideloadRelease {
                package: config.clone(),
                repo: plan.config_repo.clone(),
            });
            job.add(Step::SideloadRelease {
                package: core.clone(),
                repo: plan.core_repo.clone(),
            });
        }
        targets = vec![config.clone(), core.clone()];
    }

    if plan.update {
        job.add(Step::UpdatePackages {
            packages: targets,
            clear_db_lock: true,
        });
    } else {
        job.add(Step::InstallMissing {
            packages: targets,
            post_install: None,
        });
    }

    job.note(Level::Info, format!("Launching the {mode} installer..."));
    job.add(Step::Detach(vec![
        "gtk-launch".to_string(),
        format!("calamares_{mode}"),
    ]));
    job
}

// --- ISO Housekeeping: Preflight Checks ---

const WELCOMEQ_ONLINE: &str = "/etc/calamares/modules/welcomeq_online.conf";
const WELCOMEQ_OFFLINE: &str = "/etc/calamares/modules/welcomeq_offline.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preflight {
    Internet,
    Memory,
    Storage,
}

impl Preflight {
    /// The requirement token in the Calamares welcomeq module config.
    pub fn token(self) -> &'static str {
        match self {
            Preflight::Internet => "internet",
            Preflight::Memory => "ram",
            Preflight::Storage => "storage",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preflight::Internet => "internet connection",
            Preflight::Memory => "memory",
            Preflight::Storage => "storage space",
        }
    }
}

/// Comments or uncomments the matching requirement line in both welcomeq
/// module configs.
pub fn preflight_job(check: Preflight, enable: bool) -> BatchJob {
    let token = check.token();
    let sed = if enable {
        format!("s/^\\([[:space:]]*\\)# *- {token}/\\1- {token}/g")
    } else {
        format!("s/^\\([[:space:]]*\\)- {token}/\\1# - {token}/g")
    };
    let script = format!(
        "sed -i '{sed}' {WELCOMEQ_ONLINE} && sed -i '{sed}' {WELCOMEQ_OFFLINE}"
    );
    let state = if enable { "Enabling" } else { "Disabling" };

    let mut job = BatchJob::new(format!("{token} check"));
    job.note(
        Level::Info,
        format!("{state} the {} check before installation...", check.label()),
    );
    job.add(Step::Run(vec![
        "pkexec".to_string(),
        "/bin/bash".to_string(),
        "-c".to_string(),
        script,
    ]));
    job
}

// --- ISO Housekeeping: DNS Selection ---

const NM_DROPIN: &str = "/etc/NetworkManager/conf.d/dns-servers.conf";
const RESOLVED_DROPIN: &str = "/etc/systemd/resolved.conf.d/dns-servers.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnsChoice {
    Isp,
    Cloudflare,
    Google,
}

impl DnsChoice {
    pub fn key(self) -> &'static str {
        match self {
            DnsChoice::Isp => "isp",
            DnsChoice::Cloudflare => "cloudflare",
            DnsChoice::Google => "google",
        }
    }

    pub fn from_key(key: &str) -> DnsChoice {
        match key {
            "cloudflare" => DnsChoice::Cloudflare,
            "google" => DnsChoice::Google,
            _ => DnsChoice::Isp,
        }
    }

    fn servers(self) -> Option<(&'static str, &'static str)> {
        match self {
            DnsChoice::Isp => None,
            DnsChoice::Cloudflare => Some(("1.1.1.1", "1.0.0.1")),
            DnsChoice::Google => Some(("8.8.8.8", "8.8.4.4")),
        }
    }
}

/// The privileged script that places or removes the DNS drop-ins and
/// restarts both resolvers.
pub fn dns_script(choice: DnsChoice) -> String {
    let body = match choice.servers() {
        None => format!("rm -f {NM_DROPIN} && rm -f {RESOLVED_DROPIN}"),
        Some((primary, secondary)) => format!(
            "printf '[global-dns-domain-*]\\nservers={primary},{secondary}\\n' > {NM_DROPIN} \
             && mkdir -p /etc/systemd/resolved.conf.d \
             && printf '[Resolve]\\nDNS={primary} {secondary}\\n' > {RESOLVED_DROPIN}"
        ),
    };
    format!(
        "{body} && systemctl reload-or-restart NetworkManager.service \
         && systemctl reload-or-restart systemd-resolved.service"
    )
}

pub fn dns_job(choice: DnsChoice) -> BatchJob {
    let description = match choice {
        DnsChoice::Isp => "the DNS servers provided by your ISP",
        DnsChoice::Cloudflare => "Cloudflare DNS",
        DnsChoice::Google => "Google DNS",
    };
    let mut job = BatchJob::new("dns selection");
    job.note(Level::Info, format!("Switching to {description}..."));
    job.add(Step::Run(vec![
        "pkexec".to_string(),
        "/bin/bash".to_string(),
        "-c".to_string(),
        dns_script(choice),
    ]));
    job
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> InstallerPlan {
        InstallerPlan {
            core_package: "calamares-core".to_string(),
            config_package: "calamares-configuration".to_string(),
            core_repo: "asteros-linux/calamares-core".to_string(),
            config_repo: "asteros-linux/calamares-configuration".to_string(),
            offline: false,
            git: false,
            use_github: false,
            update: false,
        }
    }

    #[test]
    fn test_utility_job_when_installed() {
        let job = utility_job(&UTILITIES[0], false);
        assert!(matches!(job.steps()[0], Step::Note(Level::Info, _)));
        assert!(matches!(&job.steps()[1], Step::Detach(argv) if argv == &["pamac-manager"]));
    }

    #[test]
    fn test_utility_job_installs_before_launch() {
        let gparted = UTILITIES.iter().find(|u| u.label == "GParted").unwrap();
        let job = utility_job(gparted, true);
        let steps = job.steps();
        assert!(
            matches!(&steps[1], Step::Run(argv) if argv.contains(&"pacman".to_string())
                && argv.contains(&"gparted".to_string()))
        );
        assert!(matches!(steps.last().unwrap(), Step::Detach(argv) if argv == &["gparted"]));
    }

    #[test]
    fn test_firewall_post_install_runs_between_install_and_launch() {
        let firewall = UTILITIES.iter().find(|u| u.label == "Firewall").unwrap();
        let job = utility_job(firewall, true);
        let steps = job.steps();
        let install = steps
            .iter()
            .position(|s| matches!(s, Step::Run(argv) if argv.contains(&"pacman".to_string())))
            .unwrap();
        let post = steps
            .iter()
            .position(|s| matches!(s, Step::Run(argv) if argv.contains(&"systemctl".to_string())))
            .unwrap();
        let launch = steps
            .iter()
            .position(|s| matches!(s, Step::Detach(_)))
            .unwrap();
        assert!(install < post && post < launch);
    }

    #[test]
    fn test_installer_job_stable_removes_git_variants() {
        let job = installer_job(&plan());
        let steps = job.steps();
        assert!(matches!(&steps[1], Step::RemoveInstalled(pkgs)
            if pkgs.contains(&"calamares-core-git".to_string())
                && pkgs.contains(&"calamares-configuration-local".to_string())));
        assert!(matches!(&steps[2], Step::InstallMissing { packages, .. }
            if packages == &["calamares-configuration", "calamares-core"]));
        assert!(matches!(steps.last().unwrap(), Step::Detach(argv)
            if argv == &["gtk-launch", "calamares_online"]));
    }

    #[test]
    fn test_installer_job_git_removes_stable_variants() {
        let mut p = plan();
        p.git = true;
        p.offline = true;
        let job = installer_job(&p);
        let steps = job.steps();
        assert!(matches!(&steps[1], Step::RemoveInstalled(pkgs)
            if pkgs.contains(&"calamares-core".to_string())
                && !pkgs.contains(&"calamares-core-git".to_string())));
        assert!(matches!(&steps[2], Step::InstallMissing { packages, .. }
            if packages == &["calamares-configuration-git", "calamares-core-git"]));
        assert!(matches!(steps.last().unwrap(), Step::Detach(argv)
            if argv == &["gtk-launch", "calamares_offline"]));
    }

    #[test]
    fn test_installer_job_github_sideload_precedes_install() {
        let mut p = plan();
        p.use_github = true;
        let job = installer_job(&p);
        let steps = job.steps();
        let sideloads: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Step::SideloadRelease { .. }))
            .map(|(i, _)| i)
            .collect();
        let install = steps
            .iter()
            .position(|s| matches!(s, Step::InstallMissing { .. }))
            .unwrap();
        assert_eq!(sideloads.len(), 2);
        assert!(sideloads.iter().all(|i| *i < install));
    }

    #[test]
    fn test_installer_job_update_switch_uses_update_step() {
        let mut p = plan();
        p.update = true;
        let job = installer_job(&p);
        assert!(job.steps().iter().any(|s| matches!(
            s,
            Step::UpdatePackages { clear_db_lock: true, .. }
        )));
        assert!(
            !job.steps()
                .iter()
                .any(|s| matches!(s, Step::InstallMissing { .. }))
        );
    }

    #[test]
    fn test_preflight_sed_patterns() {
        let enable = preflight_job(Preflight::Internet, true);
        let disable = preflight_job(Preflight::Internet, false);
        let script_of = |job: &BatchJob| match &job.steps()[1] {
            Step::Run(argv) => argv.last().unwrap().clone(),
            other => panic!("unexpected step {:?}", other),
        };
        assert!(script_of(&enable).contains("# *- internet/\\1- internet"));
        assert!(script_of(&disable).contains("- internet/\\1# - internet"));
        assert!(script_of(&enable).contains("welcomeq_online.conf"));
        assert!(script_of(&enable).contains("welcomeq_offline.conf"));
    }

    #[test]
    fn test_dns_script_isp_removes_dropins() {
        let script = dns_script(DnsChoice::Isp);
        assert!(script.contains("rm -f /etc/NetworkManager/conf.d/dns-servers.conf"));
        assert!(script.contains("reload-or-restart NetworkManager.service"));
        assert!(!script.contains("printf"));
    }

    #[test]
    fn test_dns_script_cloudflare_writes_both_dropins() {
        let script = dns_script(DnsChoice::Cloudflare);
        assert!(script.contains("servers=1.1.1.1,1.0.0.1"));
        assert!(script.contains("DNS=1.1.1.1 1.0.0.1"));
        assert!(script.contains("mkdir -p /etc/systemd/resolved.conf.d"));
    }

    #[test]
    fn test_dns_choice_key_round_trip() {
        for choice in [DnsChoice::Isp, DnsChoice::Cloudflare, DnsChoice::Google] {
            assert_eq!(DnsChoice::from_key(choice.key()), choice);
        }
        assert_eq!(DnsChoice::from_key("nonsense"), DnsChoice::Isp);
    }
}

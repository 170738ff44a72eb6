//! Package Manager Glue (packages)
//!
//! Thin wrappers around `pacman`, `vercmp` and the GitHub releases API.
//! Exit codes are the only signal: a failed lookup is treated as "missing"
//! or "outdated" so the caller installs rather than crashes.

use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::warn;

// --- Queries ---

/// The installed version of a package, pkgrel included (e.g. "3.3.1-2").
pub fn installed_version(package: &str) -> Result<String> {
    let output = Command::new("pacman")
        .args(["-Q", package])
        .output()
        .context("Failed to spawn pacman")?;
    if !output.status.success() {
        bail!("`{}` is not installed", package);
    }
    parse_query_version(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Unexpected `pacman -Q {}` output", package))
}

/// The version in the sync database (e.g. "3.3.2-1").
pub fn sync_version(package: &str) -> Result<String> {
    let output = Command::new("pacman")
        .args(["-Si", package])
        .output()
        .context("Failed to spawn pacman")?;
    if !output.status.success() {
        bail!("`{}` was not found in the sync database", package);
    }
    parse_info_version(&String::from_utf8_lossy(&output.stdout))
        .with_context(|| format!("Unexpected `pacman -Si {}` output", package))
}

/// True if at least one of the packages is not installed. A pacman that
/// cannot even be spawned also counts as missing, after a logged warning.
pub fn any_missing(packages: &[String]) -> bool {
    if packages.is_empty() {
        return false;
    }
    match Command::new("pacman")
        .arg("-Q")
        .args(packages)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => !status.success(),
        Err(e) => {
            warn!("Package lookup failed for {:?}: {e}", packages);
            true
        }
    }
}

pub fn installed(package: &str) -> bool {
    !any_missing(&[package.to_string()])
}

/// Compares two pacman version strings with `vercmp`: negative means `a` is
/// older than `b`.
pub fn compare_versions(a: &str, b: &str) -> Result<i32> {
    let output = Command::new("vercmp")
        .args([a, b])
        .output()
        .context("Failed to spawn vercmp")?;
    if !output.status.success() {
        bail!("vercmp {} {} failed", a, b);
    }
    String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse::<i32>()
        .context("vercmp printed something that is not a number")
}

/// True when the sync database carries a newer version. Any lookup failure
/// counts as outdated, so an absent package gets (re)installed.
pub fn is_outdated(package: &str) -> bool {
    let check = || -> Result<bool> {
        let local = installed_version(package)?;
        let remote = sync_version(package)?;
        Ok(compare_versions(&local, &remote)? < 0)
    };
    match check() {
        Ok(outdated) => outdated,
        Err(e) => {
            warn!("Version check for `{package}` failed, assuming outdated: {e:#}");
            true
        }
    }
}

pub fn filter_outdated(packages: &[String]) -> Vec<String> {
    packages
        .iter()
        .filter(|p| is_outdated(p))
        .cloned()
        .collect()
}

// --- Command Builders ---

pub fn install_args(packages: &[String]) -> Vec<String> {
    let mut argv: Vec<String> = ["pkexec", "pacman", "-Sy", "--needed", "--noconfirm"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    argv.extend(packages.iter().cloned());
    argv
}

pub fn uninstall_args(packages: &[String]) -> Vec<String> {
    let mut argv: Vec<String> = ["pkexec", "pacman", "-Rdd", "--noconfirm"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    argv.extend(packages.iter().cloned());
    argv
}

// --- GitHub Releases ---

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// The tag with any leading `v` stripped, so it compares against pacman
    /// versions.
    pub fn version(&self) -> &str {
        self.tag_name.trim().trim_start_matches('v')
    }

    /// The installable package asset, skipping debug builds.
    pub fn package_asset(&self) -> Option<&ReleaseAsset> {
        self.assets
            .iter()
            .find(|a| a.name.ends_with(".pkg.tar.zst") && !a.name.contains("debug"))
    }
}

/// Fetches the latest release of a `owner/repo` from the GitHub API.
/// Blocking; must only be called from a worker thread.
pub fn latest_release(repo: &str) -> Result<Release> {
    let url = format!("https://api.github.com/repos/{}/releases/latest", repo);
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("aster-welcome/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let release: Release = client
        .get(url.as_str())
        .send()
        .with_context(|| format!("Request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("GitHub refused the release query for {}", repo))?
        .json()
        .context("Failed to parse the GitHub release payload")?;
    Ok(release)
}

// --- Pure Helpers ---

/// "name 1.2.3-1" -> "1.2.3-1"
pub fn parse_query_version(line: &str) -> Option<String> {
    line.split_whitespace().nth(1).map(|v| v.to_string())
}

/// Finds the `Version : x` field in `pacman -Si` output.
pub fn parse_info_version(text: &str) -> Option<String> {
    text.lines()
        .find(|line| line.trim_start().starts_with("Version"))
        .and_then(|line| line.split(':').nth(1))
        .map(|v| v.trim().to_string())
}

/// Strips the pkgrel suffix: "3.3.1-2" -> "3.3.1".
pub fn upstream_version(version: &str) -> &str {
    version.split('-').next().unwrap_or(version)
}

/// True when `remote` differs from `local` only in the last version
/// component. Anything more major needs a newer ISO and is not sideloaded.
pub fn patch_level_only(local: &str, remote: &str) -> bool {
    let l: Vec<&str> = local.split(['.', '_']).collect();
    let r: Vec<&str> = remote.split(['.', '_']).collect();
    l[..l.len().saturating_sub(1)]
        .iter()
        .zip(&r[..r.len().saturating_sub(1)])
        .all(|(a, b)| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_version() {
        assert_eq!(
            parse_query_version("gparted 1.5.0-2\n").as_deref(),
            Some("1.5.0-2")
        );
        assert_eq!(parse_query_version(""), None);
    }

    #[test]
    fn test_parse_info_version() {
        let info = "Repository      : extra\nName            : gparted\nVersion         : 1.5.0-2\n";
        assert_eq!(parse_info_version(info).as_deref(), Some("1.5.0-2"));
        assert_eq!(parse_info_version("Name : x\n"), None);
    }

    #[test]
    fn test_upstream_version() {
        assert_eq!(upstream_version("3.3.1-2"), "3.3.1");
        assert_eq!(upstream_version("3.3.1"), "3.3.1");
    }

    #[test]
    fn test_patch_level_only() {
        assert!(patch_level_only("3.3.1", "3.3.2"));
        assert!(patch_level_only("3.3_1", "3.3_4"));
        assert!(!patch_level_only("3.3.1", "3.4.0"));
        assert!(!patch_level_only("3.3.1", "4.3.1"));
        // A shorter remote only compares the components both sides have
        assert!(patch_level_only("3.3", "3.4"));
    }

    #[test]
    fn test_install_args_shape() {
        let argv = install_args(&["gparted".to_string(), "gufw".to_string()]);
        assert_eq!(
            argv,
            [
                "pkexec",
                "pacman",
                "-Sy",
                "--needed",
                "--noconfirm",
                "gparted",
                "gufw"
            ]
        );
    }

    #[test]
    fn test_uninstall_args_shape() {
        let argv = uninstall_args(&["calamares-core-git".to_string()]);
        assert_eq!(
            argv,
            ["pkexec", "pacman", "-Rdd", "--noconfirm", "calamares-core-git"]
        );
    }

    #[test]
    fn test_release_version_strips_v() {
        let release = Release {
            tag_name: "v3.3.2".to_string(),
            assets: vec![],
        };
        assert_eq!(release.version(), "3.3.2");
    }

    #[test]
    fn test_release_package_asset_skips_debug() {
        let release = Release {
            tag_name: "3.3.2".to_string(),
            assets: vec![
                ReleaseAsset {
                    name: "calamares-core-debug-3.3.2.pkg.tar.zst".to_string(),
                    browser_download_url: "https://example.org/debug".to_string(),
                },
                ReleaseAsset {
                    name: "calamares-core-3.3.2.pkg.tar.zst".to_string(),
                    browser_download_url: "https://example.org/pkg".to_string(),
                },
                ReleaseAsset {
                    name: "checksums.txt".to_string(),
                    browser_download_url: "https://example.org/sums".to_string(),
                },
            ],
        };
        assert_eq!(
            release.package_asset().map(|a| a.name.as_str()),
            Some("calamares-core-3.3.2.pkg.tar.zst")
        );
    }

    #[test]
    fn test_any_missing_empty_list() {
        assert!(!any_missing(&[]));
    }
}

//! APT repository plumbing: reprepro invocations, the repository's own
//! key=value config file, and GitHub release lookups via the `gh` CLI.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

pub const APT_BASE: &str = "/var/www/apt";

pub fn repo_dir() -> PathBuf {
    Path::new(APT_BASE).join("repo")
}

pub fn gpg_home() -> PathBuf {
    Path::new(APT_BASE).join(".gnupg")
}

pub fn config_file() -> PathBuf {
    Path::new(APT_BASE).join(".config")
}

/// Fail early with a setup hint when the repository has never been created.
pub fn ensure_installed() -> Result<()> {
    if repo_dir().exists() {
        Ok(())
    } else {
        Err(Error::Other(
            "APT repository not installed (run: sudo vaultctl setup apt-server)".to_string(),
        ))
    }
}

/// Repository settings written by `setup apt-server` and `repo config`.
///
/// Plain `KEY="value"` lines; unknown keys are preserved on save.
#[derive(Debug, Default, Clone)]
pub struct RepoConfig {
    values: BTreeMap<String, String>,
}

impl RepoConfig {
    pub fn load() -> Self {
        let mut values = BTreeMap::new();
        if let Ok(contents) = fs::read_to_string(config_file()) {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    values.insert(
                        key.trim().to_string(),
                        value.trim().trim_matches('"').to_string(),
                    );
                }
            }
        }
        Self { values }
    }

    pub fn save(&self) -> Result<()> {
        let mut out = String::new();
        for (key, value) in &self.values {
            out.push_str(&format!("{key}=\"{value}\"\n"));
        }
        fs::write(config_file(), out)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    pub fn codename(&self) -> &str {
        self.get("REPO_CODENAME").unwrap_or("stable")
    }
}

/// Run reprepro against the repository with GNUPGHOME pointed at the
/// repository's keyring, inheriting stdio.
pub fn reprepro(args: &[&str]) -> Result<()> {
    debug!(?args, "running reprepro");
    let status = Command::new("reprepro")
        .env("GNUPGHOME", gpg_home())
        .arg("-b")
        .arg(repo_dir())
        .args(args)
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::Subprocess {
            command: format!("reprepro {}", args.join(" ")),
            code: status.code().unwrap_or(1),
        })
    }
}

fn reprepro_captured(args: &[&str]) -> Result<String> {
    let output = Command::new("reprepro")
        .env("GNUPGHOME", gpg_home())
        .arg("-b")
        .arg(repo_dir())
        .args(args)
        .stderr(Stdio::null())
        .output()?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// One `reprepro list` line: `codename|component|arch: package version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub codename: String,
    pub component: String,
    pub arch: String,
    pub package: String,
    pub version: String,
}

pub fn parse_list_line(line: &str) -> Option<PackageEntry> {
    let (location, rest) = line.split_once(": ")?;
    let mut loc = location.split('|');
    let codename = loc.next()?.to_string();
    let component = loc.next()?.to_string();
    let arch = loc.next()?.to_string();
    let mut pkg = rest.split_whitespace();
    let package = pkg.next()?.to_string();
    let version = pkg.next()?.to_string();
    Some(PackageEntry {
        codename,
        component,
        arch,
        package,
        version,
    })
}

/// Packages currently published under `codename`.
pub fn list_packages(codename: &str) -> Result<Vec<PackageEntry>> {
    let stdout = reprepro_captured(&["list", codename])?;
    Ok(stdout.lines().filter_map(parse_list_line).collect())
}

/// Version of `package` currently in the repository, if any.
pub fn installed_version(package: &str, codename: &str) -> Result<Option<String>> {
    Ok(list_packages(codename)?
        .into_iter()
        .find(|e| e.package == package)
        .map(|e| e.version))
}

/// `Package:`, `Version:` and `Architecture:` lines from `dpkg-deb --info`.
pub fn deb_info(deb: &Path) -> Result<Vec<String>> {
    let output = Command::new("dpkg-deb")
        .args(["--info"])
        .arg(deb)
        .stderr(Stdio::null())
        .output()?;
    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| {
            l.starts_with("Package:") || l.starts_with("Version:") || l.starts_with("Architecture:")
        })
        .map(str::to_string)
        .collect())
}

/// Latest GitHub release metadata, from `gh release list --json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    pub tag_name: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub is_latest: bool,
}

impl ReleaseInfo {
    /// Version with any leading `v` stripped from the tag.
    pub fn version(&self) -> &str {
        self.tag_name.trim_start_matches('v')
    }
}

pub fn gh_installed() -> bool {
    which::which("gh").is_ok()
}

const GH_AUTH_HINT: &str = "GitHub CLI authentication required \
(run: sudo gh auth login, or: sudo GH_TOKEN=$(gh auth token) vaultctl repo sync)";

fn gh_error(context: &str, code: i32, stderr: &str) -> Error {
    // gh exits 4 when the invoking user has no stored credentials
    if code == 4 {
        Error::Other(GH_AUTH_HINT.to_string())
    } else {
        let detail = stderr.trim();
        if detail.is_empty() {
            Error::Other(format!("{context} (gh exit code {code})"))
        } else {
            Error::Other(format!("{context}: {detail}"))
        }
    }
}

/// Latest release of `repo` (owner/name), or `None` when there are none.
pub fn latest_release(repo: &str) -> Result<Option<ReleaseInfo>> {
    let output = Command::new("gh")
        .args([
            "release",
            "list",
            "-R",
            repo,
            "--limit",
            "1",
            "--json",
            "tagName,name,publishedAt,isLatest",
        ])
        .output()?;
    if !output.status.success() {
        return Err(gh_error(
            "failed to list releases",
            output.status.code().unwrap_or(1),
            &String::from_utf8_lossy(&output.stderr),
        ));
    }
    let releases: Vec<ReleaseInfo> = serde_json::from_slice(&output.stdout)?;
    Ok(releases.into_iter().next())
}

/// Download the `.deb` asset of release `tag` into `dest`, returning its path.
pub fn download_deb(repo: &str, tag: &str, dest: &Path) -> Result<PathBuf> {
    let output = Command::new("gh")
        .args(["release", "download", tag, "-R", repo, "--pattern", "*.deb", "-D"])
        .arg(dest)
        .output()?;
    if !output.status.success() {
        return Err(gh_error(
            "download failed",
            output.status.code().unwrap_or(1),
            &String::from_utf8_lossy(&output.stderr),
        ));
    }
    for entry in fs::read_dir(dest)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "deb") {
            return Ok(path);
        }
    }
    Err(Error::Other("no .deb file found in release".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reprepro_list_line() {
        let entry = parse_list_line("stable|main|amd64: vaultctl 0.2.0").unwrap();
        assert_eq!(entry.codename, "stable");
        assert_eq!(entry.component, "main");
        assert_eq!(entry.arch, "amd64");
        assert_eq!(entry.package, "vaultctl");
        assert_eq!(entry.version, "0.2.0");
    }

    #[test]
    fn rejects_malformed_list_lines() {
        assert!(parse_list_line("").is_none());
        assert!(parse_list_line("stable: vaultctl 0.2.0").is_none());
        assert!(parse_list_line("stable|main|amd64: vaultctl").is_none());
    }

    #[test]
    fn release_version_strips_v_prefix() {
        let release = ReleaseInfo {
            tag_name: "v1.4.0".to_string(),
            name: String::new(),
            published_at: String::new(),
            is_latest: true,
        };
        assert_eq!(release.version(), "1.4.0");
    }
}

//! `vaultctl repo` commands: manage the reprepro-backed APT repository.
//!
//! These operate on the server installation under `/var/www/apt` and need
//! no Vault connection.

use std::path::Path;

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::RepoCommands;
use crate::core::repo::{self, RepoConfig};
use crate::error::{Error, Result};

pub fn execute(cmd: RepoCommands) -> Result<i32> {
    repo::ensure_installed()?;
    match cmd {
        RepoCommands::Add { deb_file, codename } => add(&deb_file, codename.as_deref()),
        RepoCommands::Remove { package, codename } => remove(&package, codename.as_deref()),
        RepoCommands::List { codename } => list(codename.as_deref()),
        RepoCommands::Info => info(),
        RepoCommands::Export => {
            repo::reprepro(&["export"])?;
            output::success("Repository metadata regenerated.");
            Ok(0)
        }
        RepoCommands::Check => {
            repo::reprepro(&["check"])?;
            output::success("Repository check passed.");
            Ok(0)
        }
        RepoCommands::Clean => {
            repo::reprepro(&["deleteunreferenced"])?;
            output::success("Unreferenced files deleted.");
            Ok(0)
        }
        RepoCommands::Sync {
            check,
            force,
            package,
        } => sync(check, force, package.as_deref()),
        RepoCommands::Config { github_repo } => config(github_repo.as_deref()),
    }
}

fn codename_or_default(codename: Option<&str>) -> String {
    match codename {
        Some(c) => c.to_string(),
        None => RepoConfig::load().codename().to_string(),
    }
}

fn add(deb: &Path, codename: Option<&str>) -> Result<i32> {
    if !deb.exists() {
        output::error(&format!("File not found: {}", deb.display()));
        return Ok(1);
    }
    if deb.extension().map(|e| e != "deb").unwrap_or(true) {
        output::error(&format!("Not a .deb package: {}", deb.display()));
        return Ok(1);
    }

    output::section("Package");
    for line in repo::deb_info(deb)? {
        output::list_item(&line);
    }

    let codename = codename_or_default(codename);
    repo::reprepro(&["includedeb", &codename, &deb.to_string_lossy()])?;
    output::success(&format!("Added {} to {codename}", deb.display()));
    Ok(0)
}

fn remove(package: &str, codename: Option<&str>) -> Result<i32> {
    let codename = codename_or_default(codename);
    repo::reprepro(&["remove", &codename, package])?;
    output::success(&format!("Removed {package} from {codename}"));
    Ok(0)
}

fn list(codename: Option<&str>) -> Result<i32> {
    let codename = codename_or_default(codename);
    let packages = repo::list_packages(&codename)?;
    if packages.is_empty() {
        output::dimmed(&format!("No packages in {codename}."));
        return Ok(0);
    }

    output::section(&format!("Packages in {codename} ({})", packages.len()));
    let width = packages.iter().map(|p| p.package.len()).max().unwrap_or(0);
    for p in &packages {
        println!("  {:width$}  {:<16}  {}/{}", p.package, p.version, p.component, p.arch);
    }
    Ok(0)
}

fn info() -> Result<i32> {
    let config = RepoConfig::load();

    output::section("Repository");
    output::kv("Base", &repo::repo_dir().display().to_string());
    output::kv("Codename", config.codename());
    if let Some(domain) = config.get("DOMAIN") {
        output::kv("Domain", domain);
    }
    if let Some(gh) = config.get("GITHUB_REPO") {
        output::kv("GitHub repo", gh);
    }

    let packages = repo::list_packages(config.codename())?;
    output::kv("Packages", &packages.len().to_string());
    for p in &packages {
        output::list_item(&format!("{} {}", p.package, p.version));
    }

    if let Some(domain) = config.get("DOMAIN") {
        output::section("Client setup");
        output::hint(&format!("curl -fsSL https://{domain}/setup-client.sh | sudo bash"));
        output::hint(&format!(
            "or: vaultctl setup apt-client https://{domain} -c {}",
            config.codename()
        ));
    }
    Ok(0)
}

fn sync(check_only: bool, force: bool, package: Option<&str>) -> Result<i32> {
    if !repo::gh_installed() {
        output::error("GitHub CLI (gh) is not installed.");
        output::hint("Install it: https://cli.github.com");
        return Ok(1);
    }

    let config = RepoConfig::load();
    let Some(github_repo) = config.get("GITHUB_REPO").map(str::to_string) else {
        output::error("No GitHub repository configured.");
        output::hint("Set it: vaultctl repo config --github-repo owner/repo");
        return Ok(1);
    };

    let package = match package {
        Some(p) => p.to_string(),
        None => github_repo
            .split('/')
            .next_back()
            .unwrap_or(&github_repo)
            .to_string(),
    };
    let codename = config.codename().to_string();

    output::step(&format!("Checking {github_repo} for releases"));
    let Some(release) = repo::latest_release(&github_repo)? else {
        output::warn("No releases found.");
        return Ok(1);
    };

    let latest = release.version().to_string();
    let installed = repo::installed_version(&package, &codename)?;
    output::kv("Latest release", &latest);
    output::kv(
        "In repository",
        installed.as_deref().unwrap_or("(none)"),
    );

    let up_to_date = installed.as_deref() == Some(latest.as_str());
    if check_only {
        if up_to_date {
            output::success("Repository is up to date.");
            return Ok(0);
        }
        output::warn(&format!("Update available: {latest}"));
        return Ok(1);
    }
    if up_to_date && !force {
        output::success("Repository is up to date.");
        return Ok(0);
    }

    output::step(&format!("Downloading {} {}", package, release.tag_name));
    let tmp = tempfile::tempdir()?;
    let deb = repo::download_deb(&github_repo, &release.tag_name, tmp.path())?;

    output::step("Publishing");
    repo::reprepro(&["includedeb", &codename, &deb.to_string_lossy()])?;
    output::success(&format!("Published {package} {latest} to {codename}"));
    output::hint(&format!("Clients update with: sudo apt update && sudo apt upgrade {package}"));
    Ok(0)
}

fn config(github_repo: Option<&str>) -> Result<i32> {
    let mut config = RepoConfig::load();
    match github_repo {
        Some(value) => {
            if !value.contains('/') {
                output::error("Expected owner/repo form.");
                return Ok(1);
            }
            if let Some(old) = config.get("GITHUB_REPO") {
                if old != value {
                    let confirmed = Confirm::new()
                        .with_prompt(format!("Replace {old} with {value}?"))
                        .default(true)
                        .interact()
                        .map_err(|e| Error::Other(e.to_string()))?;
                    if !confirmed {
                        output::dimmed("Aborted.");
                        return Ok(1);
                    }
                }
            }
            config.set("GITHUB_REPO", value);
            config.save()?;
            output::success(&format!("GitHub repository set to {value}"));
        }
        None => {
            output::section("Repository settings");
            output::kv("Codename", config.codename());
            output::kv("GitHub repo", config.get("GITHUB_REPO").unwrap_or("(unset)"));
            output::kv("Config file", &repo::config_file().display().to_string());
        }
    }
    Ok(0)
}

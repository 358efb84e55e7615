//! `vaultctl compose` commands.
//!
//! Ties a compose project to a Vault secret: `init` wires a secrets .env
//! file into the compose file, the lifecycle commands sync that file from
//! Vault before touching containers, and `status` reports whether the
//! on-disk file still matches what Vault holds.

use std::fs;
use std::path::{Path, PathBuf};

use dialoguer::{Confirm, Select};

use crate::cli::output;
use crate::cli::ComposeCommands;
use crate::config::Settings;
use crate::core::compose::{self, ComposeCommand};
use crate::core::secrets::{self, SecretKind};
use crate::core::{envfile, session, templates, util};
use crate::error::{Error, Result};

/// Header prefix written into the generated secrets file; `status` and the
/// lifecycle commands recover the secret name from it.
const SECRET_HEADER: &str = "Vault secret: ";

pub fn execute(settings: &Settings, cmd: ComposeCommands) -> Result<i32> {
    match cmd {
        ComposeCommands::Init {
            name,
            file,
            services,
            script,
            no_backup,
            yes,
        } => init(settings, name, file.as_deref(), services.as_deref(), script, no_backup, yes),
        ComposeCommands::Up {
            name,
            file,
            output,
            pull,
            build,
            prune,
            no_detach,
        } => up(settings, name, file.as_deref(), output.as_deref(), pull, build, prune, !no_detach),
        ComposeCommands::Down {
            file,
            volumes,
            remove_orphans,
        } => down(file.as_deref(), volumes, remove_orphans),
        ComposeCommands::Restart {
            name,
            file,
            output,
            pull,
        } => restart(settings, name, file.as_deref(), output.as_deref(), pull),
        ComposeCommands::Pull { file } => pull_images(file.as_deref()),
        ComposeCommands::Logs {
            file,
            follow,
            tail,
            service,
        } => logs(file.as_deref(), follow, tail, service.as_deref()),
        ComposeCommands::Status { name, file } => status(settings, name, file.as_deref()),
        ComposeCommands::Prune {
            all,
            volumes,
            force,
        } => prune(all, volumes, force),
        ComposeCommands::Sync { name, file, output } => {
            sync(settings, &name, file.as_deref(), output.as_deref()).map(|_| 0)
        }
    }
}

/// Where the generated secrets file lives for a compose file: an existing
/// tagged file wins, otherwise `.env.secrets` next to the compose file
/// (`.env` is left to the project's own use).
fn secrets_file_for(compose_file: &Path, explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let dir = compose_file.parent().unwrap_or_else(|| Path::new("."));
    for candidate in [".env.secrets", ".env"] {
        let path = dir.join(candidate);
        if read_secret_name(&path).is_some() {
            return path;
        }
    }
    dir.join(".env.secrets")
}

/// Recover the secret name from the generated file's header comment.
fn read_secret_name(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    for line in contents.lines().take(5) {
        if let Some(rest) = line.trim_start_matches('#').trim().strip_prefix(SECRET_HEADER) {
            return Some(rest.trim().to_string());
        }
    }
    None
}

/// Resolve the secret name: explicit argument, or the header of an already
/// generated secrets file.
fn resolve_name(name: Option<String>, secrets_file: &Path) -> Result<String> {
    if let Some(name) = name {
        return Ok(name);
    }
    read_secret_name(secrets_file).ok_or_else(|| {
        Error::Other(format!(
            "no secret name given and {} has no marker (run: vaultctl compose init)",
            secrets_file.display()
        ))
    })
}

/// Fetch the secret and write the secrets .env file. Returns the data size.
fn sync(
    settings: &Settings,
    name: &str,
    file: Option<&Path>,
    out: Option<&Path>,
) -> Result<usize> {
    let compose_file = compose::find_compose_file(file)?;
    let secrets_file = secrets_file_for(&compose_file, out);

    let client = session::authenticated_client(settings)?;
    let path = secrets::secret_path(settings, SecretKind::Docker, name);
    let data = client
        .kv_get(&settings.kv_mount, &path)
        .map_err(|e| -> Error {
            if e.is_not_found() {
                Error::Other(format!("secret not found: {name}"))
            } else {
                e.into()
            }
        })?;

    let env = envfile::to_env_keys(&data);
    let header = format!("{SECRET_HEADER}{name}");
    envfile::write(&secrets_file, &env, Some(&header))?;
    output::success(&format!(
        "Synced {name} to {} ({} variables)",
        secrets_file.display(),
        env.len()
    ));
    Ok(env.len())
}

#[allow(clippy::too_many_arguments)]
fn init(
    settings: &Settings,
    name: Option<String>,
    file: Option<&Path>,
    services: Option<&str>,
    script: bool,
    no_backup: bool,
    yes: bool,
) -> Result<i32> {
    let docker = ComposeCommand::detect()?;
    let compose_file = compose::find_compose_file(file)?;
    output::step(&format!("Compose file: {}", compose_file.display()));

    let client = session::authenticated_client(settings)?;
    let available = secrets::list_names(&client, settings, SecretKind::Docker)?;

    let name = match name {
        Some(n) => n,
        None => {
            if available.is_empty() {
                output::error("No Docker secrets registered yet.");
                output::hint("Create one first: vaultctl docker put <name> KEY=value ...");
                return Ok(1);
            }
            let selection = Select::new()
                .with_prompt("Vault secret for this project")
                .items(&available)
                .default(0)
                .interact()
                .map_err(|e| Error::Other(e.to_string()))?;
            available[selection].clone()
        }
    };
    if !available.contains(&name) {
        output::error(&format!("Secret not found: {name}"));
        return Ok(1);
    }

    let secrets_file = secrets_file_for(&compose_file, None);
    let secrets_file_name = secrets_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ".env.secrets".to_string());

    let contents = fs::read_to_string(&compose_file)?;
    let all_services = compose::list_services(&contents);
    if all_services.is_empty() {
        output::error("No services found in the compose file.");
        return Ok(1);
    }

    let targets: Vec<String> = match services {
        Some(list) => {
            let wanted: Vec<String> = list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            for service in &wanted {
                if !all_services.contains(service) {
                    output::error(&format!("Service not found: {service}"));
                    return Ok(1);
                }
            }
            wanted
        }
        None => all_services.clone(),
    };

    output::section("Plan");
    output::kv("Secret", &name);
    output::kv("Secrets file", &secrets_file.display().to_string());
    output::kv("Services", &targets.join(", "));

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Apply these changes?")
            .default(true)
            .interact()
            .map_err(|e| Error::Other(e.to_string()))?;
        if !confirmed {
            output::dimmed("Aborted.");
            return Ok(1);
        }
    }

    // Edit the compose file, backing it up first unless told not to.
    let entries = vec![format!("./{secrets_file_name}")];
    let mut updated = contents.clone();
    let mut changed = false;
    for service in &targets {
        if let Some(next) = compose::add_env_files(&updated, service, &entries) {
            output::success(&format!("Added env_file to {service}"));
            updated = next;
            changed = true;
        } else {
            output::dimmed(&format!("{service}: env_file already present"));
        }
    }
    if changed {
        if !no_backup {
            let backup = compose_file.with_file_name(format!(
                "{}.bak.{}",
                compose_file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                util::backup_suffix()
            ));
            fs::copy(&compose_file, &backup)?;
            output::dimmed(&format!("Backup: {}", backup.display()));
        }
        fs::write(&compose_file, &updated)?;
    }

    sync(settings, &name, Some(&compose_file), Some(&secrets_file))?;

    if script {
        let script_path = compose_file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("ctl.sh");
        let body = templates::compose_ctl_script(
            &compose_file.display().to_string(),
            &name,
            &secrets_file_name,
            docker.display,
        );
        fs::write(&script_path, body)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))?;
        }
        output::success(&format!("Wrote {}", script_path.display()));
    }

    update_gitignore(&compose_file, &secrets_file_name)?;
    output::success("Project wired up.");
    output::hint("Start it: vaultctl compose up");
    Ok(0)
}

/// Make sure the generated files never end up in version control.
fn update_gitignore(compose_file: &Path, secrets_file_name: &str) -> Result<()> {
    let dir = compose_file.parent().unwrap_or_else(|| Path::new("."));
    if !dir.join(".git").exists() && !dir.join(".gitignore").exists() {
        return Ok(());
    }
    let path = dir.join(".gitignore");
    let mut contents = fs::read_to_string(&path).unwrap_or_default();
    let mut added = Vec::new();
    for entry in [secrets_file_name, ".env", "*.bak.*"] {
        if !contents.lines().any(|l| l.trim() == entry) {
            contents.push_str(entry);
            contents.push('\n');
            added.push(entry);
        }
    }
    if !added.is_empty() {
        fs::write(&path, contents)?;
        output::dimmed(&format!(".gitignore: added {}", added.join(", ")));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn up(
    settings: &Settings,
    name: Option<String>,
    file: Option<&Path>,
    out: Option<&Path>,
    pull: bool,
    build: bool,
    prune_after: bool,
    detach: bool,
) -> Result<i32> {
    let docker = ComposeCommand::detect()?;
    let compose_file = compose::find_compose_file(file)?;
    let secrets_file = secrets_file_for(&compose_file, out);
    let name = resolve_name(name, &secrets_file)?;

    sync(settings, &name, Some(&compose_file), Some(&secrets_file))?;

    if pull {
        output::step("Pulling images");
        docker.run(&compose_file, &["pull"])?;
    }

    let mut args = vec!["up"];
    if detach {
        args.push("-d");
    }
    if build {
        args.push("--build");
    }
    output::step(&format!("{} {}", docker.display, args.join(" ")));
    let status = docker.run(&compose_file, &args)?;
    if !status.success() {
        return Ok(status.code().unwrap_or(1));
    }

    if prune_after {
        docker_prune(&["image", "prune", "-f"])?;
    }
    output::success("Containers are up.");
    Ok(0)
}

fn down(file: Option<&Path>, volumes: bool, remove_orphans: bool) -> Result<i32> {
    let docker = ComposeCommand::detect()?;
    let compose_file = compose::find_compose_file(file)?;

    let mut args = vec!["down"];
    if volumes {
        args.push("-v");
    }
    if remove_orphans {
        args.push("--remove-orphans");
    }
    output::step(&format!("{} {}", docker.display, args.join(" ")));
    let status = docker.run(&compose_file, &args)?;
    Ok(status.code().unwrap_or(1))
}

fn restart(
    settings: &Settings,
    name: Option<String>,
    file: Option<&Path>,
    out: Option<&Path>,
    pull: bool,
) -> Result<i32> {
    let docker = ComposeCommand::detect()?;
    let compose_file = compose::find_compose_file(file)?;
    let secrets_file = secrets_file_for(&compose_file, out);
    let name = resolve_name(name, &secrets_file)?;

    sync(settings, &name, Some(&compose_file), Some(&secrets_file))?;

    if pull {
        output::step("Pulling images");
        docker.run(&compose_file, &["pull"])?;
    }

    output::step("Restarting containers");
    docker.run(&compose_file, &["down"])?;
    let status = docker.run(&compose_file, &["up", "-d"])?;
    if status.success() {
        output::success("Containers restarted.");
    }
    Ok(status.code().unwrap_or(1))
}

fn pull_images(file: Option<&Path>) -> Result<i32> {
    let docker = ComposeCommand::detect()?;
    let compose_file = compose::find_compose_file(file)?;
    let status = docker.run(&compose_file, &["pull"])?;
    Ok(status.code().unwrap_or(1))
}

fn logs(
    file: Option<&Path>,
    follow: bool,
    tail: Option<u32>,
    service: Option<&str>,
) -> Result<i32> {
    let docker = ComposeCommand::detect()?;
    let compose_file = compose::find_compose_file(file)?;

    let mut args = vec!["logs".to_string()];
    if follow {
        args.push("-f".to_string());
    }
    if let Some(n) = tail {
        args.push("--tail".to_string());
        args.push(n.to_string());
    }
    if let Some(service) = service {
        args.push(service.to_string());
    }
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let status = docker.run(&compose_file, &arg_refs)?;
    Ok(status.code().unwrap_or(1))
}

fn status(settings: &Settings, name: Option<String>, file: Option<&Path>) -> Result<i32> {
    let docker = ComposeCommand::detect()?;
    let compose_file = compose::find_compose_file(file)?;
    let secrets_file = secrets_file_for(&compose_file, None);

    output::section("Containers");
    let (_, ps) = docker.run_captured(&compose_file, &["ps"])?;
    for line in ps.lines() {
        output::list_item(line);
    }

    output::section("Secrets file");
    if secrets_file.exists() {
        output::kv("File", &secrets_file.display().to_string());
        if let Ok(meta) = fs::metadata(&secrets_file) {
            if let Ok(modified) = meta.modified() {
                let when: chrono::DateTime<chrono::Local> = modified.into();
                output::kv("Modified", &when.format("%Y-%m-%d %H:%M:%S").to_string());
            }
        }
    } else {
        output::warn(&format!("Missing: {}", secrets_file.display()));
        output::hint("Run: vaultctl compose init");
        return Ok(1);
    }

    // With a secret name we can tell whether the file is stale.
    let name = name.or_else(|| read_secret_name(&secrets_file));
    if let Some(name) = name {
        let client = session::authenticated_client(settings)?;
        let vault_data = secrets::get_or_empty(&client, settings, SecretKind::Docker, &name)?;
        let local = envfile::load(&secrets_file)?;
        let in_sync = secrets::content_hash(&envfile::to_env_keys(&vault_data))
            == secrets::content_hash(&local);

        output::section("Vault");
        output::kv("Secret", &name);
        if let Some(hash) = secrets::short_hash(&vault_data) {
            output::kv("Content", &hash);
        }
        if in_sync {
            output::success("Secrets file matches Vault.");
        } else {
            output::warn("Secrets file is out of date.");
            output::hint(&format!("Run: vaultctl compose sync {name}"));
            return Ok(1);
        }
    }
    Ok(0)
}

fn prune(all: bool, volumes: bool, force: bool) -> Result<i32> {
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(if volumes {
                "Remove unused images and volumes?"
            } else {
                "Remove unused images?"
            })
            .default(false)
            .interact()
            .map_err(|e| Error::Other(e.to_string()))?;
        if !confirmed {
            output::dimmed("Aborted.");
            return Ok(1);
        }
    }

    let mut image_args = vec!["image", "prune", "-f"];
    if all {
        image_args.push("-a");
    }
    docker_prune(&image_args)?;
    if volumes {
        docker_prune(&["volume", "prune", "-f"])?;
    }
    Ok(0)
}

/// Run `docker <args>`, echoing the reclaimed-space summary lines.
fn docker_prune(args: &[&str]) -> Result<()> {
    let out = std::process::Command::new("docker").args(args).output()?;
    if !out.status.success() {
        return Err(Error::Subprocess {
            command: format!("docker {}", args.join(" ")),
            code: out.status.code().unwrap_or(1),
        });
    }
    for line in String::from_utf8_lossy(&out.stdout).lines() {
        if line.starts_with("Total reclaimed space") {
            output::success(line);
        }
    }
    Ok(())
}

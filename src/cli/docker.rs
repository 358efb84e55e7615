//! `vaultctl docker` commands.
//!
//! Docker secrets hold environment variables for a service; keys are
//! normalized to `UPPER_SNAKE_CASE` when a .env file is written.

use std::path::Path;

use dialoguer::Confirm;

use crate::cli::output;
use crate::cli::DockerCommands;
use crate::config::Settings;
use crate::core::compose::{self as core_compose, ComposeCommand};
use crate::core::secrets::{self, SecretKind};
use crate::core::{envfile, session};
use crate::error::{Error, Result};

pub fn execute(settings: &Settings, cmd: DockerCommands) -> Result<i32> {
    match cmd {
        DockerCommands::List => list(settings),
        DockerCommands::Get { name, raw } => get(settings, &name, raw),
        DockerCommands::Put {
            name,
            data,
            replace,
        } => put(settings, &name, &data, replace),
        DockerCommands::Delete { name, force } => delete(settings, &name, force),
        DockerCommands::Env {
            name,
            output,
            stdout,
        } => generate_env(settings, &name, &output, stdout),
        DockerCommands::ImportEnv {
            name,
            file,
            replace,
        } => import_env(settings, &name, &file, replace),
        DockerCommands::Compose {
            name,
            args,
            env_file,
        } => compose(settings, &name, &args, &env_file),
    }
}

fn list(settings: &Settings) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let names = secrets::list_names(&client, settings, SecretKind::Docker)?;
    if names.is_empty() {
        output::dimmed("No Docker services registered.");
        return Ok(0);
    }

    output::section(&format!("Docker services ({})", names.len()));
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
    for name in &names {
        let data = secrets::get_or_empty(&client, settings, SecretKind::Docker, name)?;
        let count = data.len();
        println!(
            "  {name:width$}  {count} {}",
            if count == 1 { "variable" } else { "variables" }
        );
    }
    Ok(0)
}

fn get(settings: &Settings, name: &str, raw: bool) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let path = secrets::secret_path(settings, SecretKind::Docker, name);
    let data = match client.kv_get(&settings.kv_mount, &path) {
        Ok(data) => data,
        Err(e) if e.is_not_found() => {
            output::error(&format!("Not found: {name}"));
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };
    if raw {
        output::kv_table_raw(name, &data);
    } else {
        output::kv_table(name, &data);
    }
    Ok(0)
}

fn put(settings: &Settings, name: &str, args: &[String], replace: bool) -> Result<i32> {
    let new_data = envfile::parse_pairs(args);
    if new_data.is_empty() {
        output::error("No valid KEY=value pairs given.");
        return Ok(1);
    }

    let client = session::authenticated_client(settings)?;
    let written = secrets::put(&client, settings, SecretKind::Docker, name, new_data, replace)?;
    output::success(&format!("Stored {name} ({} variables)", written.len()));
    Ok(0)
}

fn delete(settings: &Settings, name: &str, force: bool) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let data = secrets::get_or_empty(&client, settings, SecretKind::Docker, name)?;
    if data.is_empty() {
        output::error(&format!("Not found: {name}"));
        return Ok(1);
    }

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {} ({} variables)?", name, data.len()))
            .default(false)
            .interact()
            .map_err(|e| Error::Other(e.to_string()))?;
        if !confirmed {
            output::dimmed("Aborted.");
            return Ok(1);
        }
    }

    client.kv_delete(
        &settings.kv_mount,
        &secrets::secret_path(settings, SecretKind::Docker, name),
    )?;
    output::success(&format!("Deleted {name}"));
    Ok(0)
}

/// Write a service's variables as a .env file (0600), or print them.
pub fn generate_env(settings: &Settings, name: &str, out: &Path, stdout: bool) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let path = secrets::secret_path(settings, SecretKind::Docker, name);
    let data = match client.kv_get(&settings.kv_mount, &path) {
        Ok(data) => data,
        Err(e) if e.is_not_found() => {
            output::error(&format!("Not found: {name}"));
            output::hint("Register it first: vaultctl docker put <name> KEY=value ...");
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };

    let env = envfile::to_env_keys(&data);
    let header = format!("Generated from Vault: {name}");
    if stdout {
        print!("{}", envfile::render(&env, Some(&header)));
    } else {
        envfile::write(out, &env, Some(&header))?;
        output::success(&format!(
            "Wrote {} ({} variables)",
            out.display(),
            env.len()
        ));
    }
    Ok(0)
}

fn import_env(settings: &Settings, name: &str, file: &Path, replace: bool) -> Result<i32> {
    if !file.exists() {
        output::error(&format!("File not found: {}", file.display()));
        return Ok(1);
    }
    let data = envfile::load(file)?;
    if data.is_empty() {
        output::error(&format!("No variables found in {}", file.display()));
        return Ok(1);
    }

    let client = session::authenticated_client(settings)?;
    let written = secrets::put(&client, settings, SecretKind::Docker, name, data, replace)?;
    output::success(&format!(
        "Imported {} into {name} ({} variables)",
        file.display(),
        written.len()
    ));
    Ok(0)
}

fn compose(settings: &Settings, name: &str, args: &[String], env_file: &Path) -> Result<i32> {
    let code = generate_env(settings, name, env_file, false)?;
    if code != 0 {
        return Ok(code);
    }

    let compose = ComposeCommand::detect()?;
    let file = core_compose::find_compose_file(None)?;
    let args = if args.is_empty() {
        vec!["up".to_string(), "-d".to_string()]
    } else {
        args.to_vec()
    };
    output::step(&format!("{} {}", compose.display, args.join(" ")));

    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let status = compose.run(&file, &arg_refs)?;
    Ok(status.code().unwrap_or(1))
}

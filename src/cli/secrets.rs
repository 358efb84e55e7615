//! `vaultctl lxc` commands, shared with `vaultctl docker` for the
//! common CRUD operations.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use dialoguer::Confirm;
use serde_json::Value;

use crate::cli::output;
use crate::cli::SecretCommands;
use crate::config::Settings;
use crate::core::secrets::{self, SecretKind};
use crate::core::{clipboard, envfile, session};
use crate::error::{Error, Result};

pub fn execute(settings: &Settings, kind: SecretKind, cmd: SecretCommands) -> Result<i32> {
    match cmd {
        SecretCommands::List { verbose } => list(settings, kind, verbose),
        SecretCommands::Get {
            name,
            field,
            copy,
            raw,
        } => get(settings, kind, &name, field.as_deref(), copy, raw),
        SecretCommands::Put {
            name,
            data,
            replace,
        } => put(settings, kind, &name, &data, replace),
        SecretCommands::Delete { name, force } => delete(settings, kind, &name, force),
        SecretCommands::Pass { name, field } => copy_password(settings, kind, &name, &field),
        SecretCommands::Import { file, dry_run } => import(settings, kind, &file, dry_run),
        SecretCommands::Export { output } => export(settings, kind, output.as_deref()),
    }
}

/// `vaultctl ls` shortcut.
pub fn quick_list(settings: &Settings, kind: &str) -> Result<i32> {
    list(settings, parse_kind(kind)?, false)
}

/// `vaultctl get` shortcut.
pub fn quick_get(settings: &Settings, name: &str, kind: &str) -> Result<i32> {
    get(settings, parse_kind(kind)?, name, None, false, false)
}

fn parse_kind(kind: &str) -> Result<SecretKind> {
    match kind {
        "lxc" => Ok(SecretKind::Lxc),
        "docker" => Ok(SecretKind::Docker),
        other => Err(Error::Other(format!(
            "unknown secret type '{other}' (expected lxc or docker)"
        ))),
    }
}

fn list(settings: &Settings, kind: SecretKind, verbose: bool) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let names = secrets::list_names(&client, settings, kind)?;
    if names.is_empty() {
        output::dimmed(&format!("No {} entries registered.", kind.label()));
        return Ok(0);
    }

    output::section(&format!("{} entries ({})", kind.label(), names.len()));
    if !verbose {
        for name in &names {
            output::list_item(name);
        }
        return Ok(0);
    }

    let width = names.iter().map(|n| n.len()).max().unwrap_or(0);
    for name in &names {
        let data = secrets::get_or_empty(&client, settings, kind, name)?;
        let ip = data.get("ip").map(String::as_str).unwrap_or("-");
        let notes = data.get("notes").map(String::as_str).unwrap_or("");
        println!("  {name:width$}  {ip:<15}  {notes}");
    }
    Ok(0)
}

fn get(
    settings: &Settings,
    kind: SecretKind,
    name: &str,
    field: Option<&str>,
    copy: bool,
    raw: bool,
) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let data = match client.kv_get(&settings.kv_mount, &secrets::secret_path(settings, kind, name))
    {
        Ok(data) => data,
        Err(e) if e.is_not_found() => {
            output::error(&format!("Not found: {name}"));
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };

    match field {
        Some(field) => {
            let Some(value) = data.get(field) else {
                output::error(&format!("Field '{field}' not found in {name}"));
                let mut keys: Vec<&String> = data.keys().collect();
                keys.sort();
                for key in keys {
                    output::list_item(key);
                }
                return Ok(1);
            };
            if copy {
                let tool = clipboard::copy(value)?;
                output::success(&format!("Copied {name}/{field} to clipboard ({tool})"));
            } else if raw {
                println!("{value}");
            } else {
                output::kv(field, &secrets::display_value(field, value));
            }
        }
        None => {
            if raw {
                output::kv_table_raw(name, &data);
            } else {
                output::kv_table(name, &data);
            }
        }
    }
    Ok(0)
}

fn put(
    settings: &Settings,
    kind: SecretKind,
    name: &str,
    args: &[String],
    replace: bool,
) -> Result<i32> {
    let new_data = envfile::parse_pairs(args);
    if new_data.is_empty() {
        output::error("No valid key=value pairs given.");
        return Ok(1);
    }

    let client = session::authenticated_client(settings)?;
    let written = secrets::put(&client, settings, kind, name, new_data, replace)?;
    output::success(&format!(
        "Stored {name} ({} {})",
        written.len(),
        if written.len() == 1 { "field" } else { "fields" }
    ));
    output::kv_table(name, &written);
    Ok(0)
}

fn delete(settings: &Settings, kind: SecretKind, name: &str, force: bool) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let data = secrets::get_or_empty(&client, settings, kind, name)?;
    if data.is_empty() {
        output::error(&format!("Not found: {name}"));
        return Ok(1);
    }

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {} ({} fields)?", name, data.len()))
            .default(false)
            .interact()
            .map_err(|e| Error::Other(e.to_string()))?;
        if !confirmed {
            output::dimmed("Aborted.");
            return Ok(1);
        }
    }

    client.kv_delete(&settings.kv_mount, &secrets::secret_path(settings, kind, name))?;
    output::success(&format!("Deleted {name}"));
    Ok(0)
}

/// Copy a single field to the clipboard, falling back to printing the
/// masked value when no clipboard tool is installed.
pub fn copy_password(
    settings: &Settings,
    kind: SecretKind,
    name: &str,
    field: &str,
) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let data = match client.kv_get(&settings.kv_mount, &secrets::secret_path(settings, kind, name))
    {
        Ok(data) => data,
        Err(e) if e.is_not_found() => {
            output::error(&format!("Not found: {name}"));
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };
    let Some(value) = data.get(field) else {
        output::error(&format!("Field '{field}' not found in {name}"));
        return Ok(1);
    };

    if clipboard::available() {
        let tool = clipboard::copy(value)?;
        output::success(&format!("Copied {name}/{field} to clipboard ({tool})"));
    } else {
        output::warn("No clipboard tool found, printing instead:");
        println!("{value}");
    }
    Ok(0)
}

fn import(settings: &Settings, kind: SecretKind, file: &Path, dry_run: bool) -> Result<i32> {
    let contents = fs::read_to_string(file)?;
    let parsed: Value = serde_json::from_str(&contents)?;
    let Value::Object(entries) = parsed else {
        output::error("Import file must be a JSON object of name -> {key: value}.");
        return Ok(1);
    };

    let mut to_write: Vec<(String, HashMap<String, String>)> = Vec::new();
    for (name, entry) in entries {
        // Keys starting with "_" are comments in the export format.
        if name.starts_with('_') {
            continue;
        }
        let Value::Object(fields) = entry else {
            output::warn(&format!("Skipping {name}: not an object"));
            continue;
        };
        let mut data = HashMap::new();
        for (key, value) in fields {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            if !value.is_empty() {
                data.insert(key, value);
            }
        }
        if !data.is_empty() {
            to_write.push((name, data));
        }
    }

    if to_write.is_empty() {
        output::error("No importable entries found.");
        return Ok(1);
    }

    if dry_run {
        output::section(&format!("Would import {} entries", to_write.len()));
        for (name, data) in &to_write {
            output::list_item(&format!("{name} ({} fields)", data.len()));
        }
        return Ok(0);
    }

    let client = session::authenticated_client(settings)?;
    for (name, data) in &to_write {
        secrets::put(&client, settings, kind, name, data.clone(), false)?;
        output::success(&format!("Imported {name} ({} fields)", data.len()));
    }
    Ok(0)
}

fn export(settings: &Settings, kind: SecretKind, out: Option<&Path>) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let names = secrets::list_names(&client, settings, kind)?;

    let mut all: serde_json::Map<String, Value> = serde_json::Map::new();
    for name in &names {
        let data = secrets::get_or_empty(&client, settings, kind, name)?;
        let fields: serde_json::Map<String, Value> = data
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        all.insert(name.clone(), Value::Object(fields));
    }

    let rendered = serde_json::to_string_pretty(&Value::Object(all))?;
    match out {
        Some(path) => {
            write_private(path, &rendered)?;
            output::success(&format!(
                "Exported {} entries to {}",
                names.len(),
                path.display()
            ));
            output::warn("The export contains plaintext secrets, handle with care.");
        }
        None => println!("{rendered}"),
    }
    Ok(0)
}

fn write_private(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

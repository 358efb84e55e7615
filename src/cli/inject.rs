//! Secret injection commands: `run`, `sh`, `scan`, and `redact`.
//!
//! `run` and `sh` put secret values into a process environment without
//! ever writing them to disk; `scan` and `redact` go the other way and
//! find or strip values that leaked into files and logs.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::Command;

use console::style;
use serde_json::json;
use zeroize::Zeroizing;

use crate::cli::output;
use crate::config::Settings;
use crate::core::envfile;
use crate::core::secrets;
use crate::error::{Error, Result};

/// Environment variables kept under `run --reset`.
const RESET_KEEP: &[&str] = &["PATH", "HOME", "USER", "SHELL", "TERM"];

/// Minimum secret length considered by `scan`; shorter values match too
/// often to be useful.
const SCAN_MIN_LEN: usize = 8;
const REDACT_MIN_LEN: usize = 6;

pub fn run(
    settings: &Settings,
    name: &str,
    command: &[String],
    reset: bool,
    shell: bool,
) -> Result<i32> {
    let data = secrets::fetch_for_injection(settings, name)?;
    if data.is_empty() {
        output::error(&format!("Not found or empty: {name}"));
        return Ok(1);
    }
    let env = envfile::to_env_keys(&data);

    let mut cmd = if shell {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command.join(" "));
        c
    } else {
        let mut c = Command::new(&command[0]);
        c.args(&command[1..]);
        c
    };

    if reset {
        cmd.env_clear();
        for key in RESET_KEEP {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }
    }
    // Wipe secret values from memory once the child has them.
    for (key, value) in env {
        let value = Zeroizing::new(value);
        cmd.env(key, value.as_str());
    }

    let status = cmd.status().map_err(|e| {
        Error::Other(format!("failed to run {}: {e}", command[0]))
    })?;
    Ok(status.code().unwrap_or(1))
}

/// Print export statements for `eval "$(vaultctl sh <name>)"`.
pub fn shell_export(settings: &Settings, name: &str, format: &str) -> Result<i32> {
    if !matches!(format, "bash" | "zsh" | "fish") {
        output::error(&format!("Unknown format '{format}' (expected bash, zsh, or fish)"));
        return Ok(1);
    }

    let data = secrets::fetch_for_injection(settings, name)?;
    if data.is_empty() {
        output::error(&format!("Not found or empty: {name}"));
        return Ok(1);
    }

    let env = envfile::to_env_keys(&data);
    let mut keys: Vec<&String> = env.keys().collect();
    keys.sort();
    for key in keys {
        let value = shell_quote(&env[key.as_str()]);
        if format == "fish" {
            println!("set -gx {key} {value}");
        } else {
            println!("export {key}={value}");
        }
    }
    Ok(0)
}

/// Single-quote a value for POSIX shells and fish.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r#"'"'"'"#))
}

struct Finding {
    file: String,
    line: usize,
    secret: String,
}

pub fn scan(
    settings: &Settings,
    path: &Path,
    name: Option<&str>,
    error_if_found: bool,
    json_output: bool,
    exclude: &[String],
) -> Result<i32> {
    let values = secrets::collect_values(settings, name, SCAN_MIN_LEN)?;
    if values.is_empty() {
        output::dimmed("No secret values to scan for.");
        return Ok(0);
    }

    let mut findings = Vec::new();
    scan_path(path, &values, exclude, &mut findings)?;

    if json_output {
        let items: Vec<serde_json::Value> = findings
            .iter()
            .map(|f| json!({ "file": f.file, "line": f.line, "secret": f.secret }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if findings.is_empty() {
        output::success(&format!(
            "No hardcoded secrets found ({} values checked).",
            values.len()
        ));
    } else {
        output::section(&format!("Found {} hardcoded secrets", findings.len()));
        for f in &findings {
            println!(
                "  {}:{}  {}",
                style(&f.file).cyan(),
                f.line,
                style(&f.secret).red()
            );
        }
    }

    if error_if_found && !findings.is_empty() {
        return Ok(1);
    }
    Ok(0)
}

fn scan_path(
    path: &Path,
    values: &HashMap<String, String>,
    exclude: &[String],
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let display = path.to_string_lossy();
    if exclude.iter().any(|e| {
        display.split('/').any(|part| part == e.as_str())
    }) {
        return Ok(());
    }

    if path.is_dir() {
        let mut entries: Vec<_> = fs::read_dir(path)?.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            scan_path(&entry.path(), values, exclude, findings)?;
        }
        return Ok(());
    }

    // Binary files are skipped silently.
    let Ok(contents) = fs::read_to_string(path) else {
        return Ok(());
    };
    for (lineno, line) in contents.lines().enumerate() {
        for (secret_name, value) in values {
            if line.contains(value.as_str()) {
                findings.push(Finding {
                    file: display.to_string(),
                    line: lineno + 1,
                    secret: secret_name.clone(),
                });
            }
        }
    }
    Ok(())
}

pub fn redact(
    settings: &Settings,
    input: Option<&Path>,
    out: Option<&Path>,
    name: Option<&str>,
    mask: &str,
) -> Result<i32> {
    let values = secrets::collect_values(settings, name, REDACT_MIN_LEN)?;

    let text = match input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    // Longest first so an overlapping shorter value never splits a longer
    // one into an unmatched remainder.
    let mut sorted: Vec<&String> = values.values().collect();
    sorted.sort_by_key(|v| std::cmp::Reverse(v.len()));

    let mut redacted = text;
    let mut count = 0usize;
    for value in sorted {
        let hits = redacted.matches(value.as_str()).count();
        if hits > 0 {
            redacted = redacted.replace(value.as_str(), mask);
            count += hits;
        }
    }

    match out {
        Some(path) => {
            fs::write(path, &redacted)?;
            output::success(&format!(
                "Redacted {count} occurrences into {}",
                path.display()
            ));
        }
        None => {
            io::stdout().write_all(redacted.as_bytes())?;
        }
    }
    Ok(0)
}

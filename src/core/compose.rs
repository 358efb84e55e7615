//! Docker Compose plumbing: command detection, compose file discovery, and
//! minimal in-place editing of service `env_file` lists.
//!
//! The compose file is edited line by line rather than through a YAML
//! round-trip so comments and formatting survive untouched.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use tracing::debug;

use crate::error::{Error, Result};

/// The compose invocation to use: v2 plugin or standalone v1 binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeCommand {
    pub display: &'static str,
    program: &'static str,
    prefix: &'static [&'static str],
}

impl ComposeCommand {
    /// Probe for `docker compose` (v2) first, then `docker-compose` (v1).
    pub fn detect() -> Result<Self> {
        if probe("docker", &["compose", "version"]) {
            return Ok(Self {
                display: "docker compose",
                program: "docker",
                prefix: &["compose"],
            });
        }
        if probe("docker-compose", &["version"]) {
            return Ok(Self {
                display: "docker-compose",
                program: "docker-compose",
                prefix: &[],
            });
        }
        Err(Error::Other(
            "Docker Compose not found (install the compose plugin or docker-compose)".to_string(),
        ))
    }

    /// Run a compose subcommand against `file`, inheriting stdio.
    pub fn run(&self, file: &Path, args: &[&str]) -> Result<ExitStatus> {
        let mut cmd = Command::new(self.program);
        cmd.args(self.prefix)
            .arg("-f")
            .arg(file)
            .args(args);
        debug!(program = self.program, ?args, "running compose");
        Ok(cmd.status()?)
    }

    /// Run a compose subcommand and capture stdout.
    pub fn run_captured(&self, file: &Path, args: &[&str]) -> Result<(ExitStatus, String)> {
        let output = Command::new(self.program)
            .args(self.prefix)
            .arg("-f")
            .arg(file)
            .args(args)
            .stderr(Stdio::null())
            .output()?;
        Ok((
            output.status,
            String::from_utf8_lossy(&output.stdout).into_owned(),
        ))
    }
}

fn probe(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

const COMPOSE_CANDIDATES: &[&str] = &[
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Resolve the compose file: an explicit path must exist, otherwise the
/// standard names are tried in order in the current directory.
pub fn find_compose_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(Error::Other(format!("file not found: {}", path.display())));
    }
    for candidate in COMPOSE_CANDIDATES {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    Err(Error::Other(
        "docker-compose.yml not found in current directory (use -f to specify)".to_string(),
    ))
}

/// Service names declared under the top-level `services:` key.
pub fn list_services(contents: &str) -> Vec<String> {
    let mut services = Vec::new();
    let mut in_services = false;
    for line in contents.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        let indent = indent_of(trimmed);
        if indent == 0 {
            in_services = trimmed == "services:";
            continue;
        }
        if in_services && indent == service_indent(contents) {
            if let Some(name) = trimmed.trim().strip_suffix(':') {
                if !name.is_empty() {
                    services.push(name.to_string());
                }
            }
        }
    }
    services
}

/// Existing `env_file` entries for a service (string or list form).
pub fn service_env_files(contents: &str, service: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let Some((start, end)) = service_block(contents, service) else {
        return entries;
    };
    let lines: Vec<&str> = contents.lines().collect();
    let mut i = start + 1;
    while i < end {
        let trimmed = lines[i].trim();
        if let Some(rest) = trimmed.strip_prefix("env_file:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                entries.push(unquote(rest).to_string());
            } else {
                // list form on following lines
                let mut j = i + 1;
                while j < end {
                    let item = lines[j].trim();
                    if let Some(value) = item.strip_prefix("- ") {
                        entries.push(unquote(value.trim()).to_string());
                        j += 1;
                    } else {
                        break;
                    }
                }
            }
            break;
        }
        i += 1;
    }
    entries
}

/// Add `env_file` entries to a service, returning the updated contents, or
/// `None` when every entry is already present.
pub fn add_env_files(contents: &str, service: &str, entries: &[String]) -> Option<String> {
    let existing = service_env_files(contents, service);
    let missing: Vec<&String> = entries.iter().filter(|e| !existing.contains(e)).collect();
    if missing.is_empty() {
        return None;
    }

    let (start, end) = service_block(contents, service)?;
    let lines: Vec<&str> = contents.lines().collect();
    let key_indent = " ".repeat(child_indent(&lines, start));
    let item_indent = format!("{key_indent}  ");

    // Locate the env_file key inside the block, if any.
    let key_line = (start + 1..end).find(|&i| lines[i].trim().starts_with("env_file:"));

    // Line after which the new list items go, and whether a scalar value on
    // the key line needs rewriting to list form first.
    let (insert_after, scalar) = match key_line {
        None => (start, None),
        Some(k) => {
            let rest = lines[k].trim().trim_start_matches("env_file:").trim();
            if rest.is_empty() {
                let mut last = k;
                while last + 1 < end && lines[last + 1].trim().starts_with("- ") {
                    last += 1;
                }
                (last, None)
            } else {
                (k, Some(unquote(rest).to_string()))
            }
        }
    };

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + missing.len() + 2);
    for (i, line) in lines.iter().enumerate() {
        out.push((*line).to_string());
        if i != insert_after {
            continue;
        }
        if key_line.is_none() {
            out.push(format!("{key_indent}env_file:"));
        } else if let Some(original) = &scalar {
            // scalar form: rewrite as a list keeping the original entry
            out.pop();
            out.push(format!("{key_indent}env_file:"));
            out.push(format!("{item_indent}- {original}"));
        }
        for entry in &missing {
            out.push(format!("{item_indent}- {entry}"));
        }
    }
    Some(finish(out, contents))
}

fn finish(lines: Vec<String>, original: &str) -> String {
    let mut s = lines.join("\n");
    if original.ends_with('\n') {
        s.push('\n');
    }
    s
}

/// Line range `(name_line, exclusive_end)` of a service's block.
fn service_block(contents: &str, service: &str) -> Option<(usize, usize)> {
    let lines: Vec<&str> = contents.lines().collect();
    let svc_indent = service_indent(contents);
    let header = format!("{}{}:", " ".repeat(svc_indent), service);

    let mut in_services = false;
    let mut start = None;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        if indent_of(trimmed) == 0 {
            in_services = trimmed == "services:";
            if let Some(s) = start {
                return Some((s, i));
            }
            continue;
        }
        if in_services && indent_of(trimmed) <= svc_indent {
            if let Some(s) = start {
                return Some((s, i));
            }
            if trimmed == header {
                start = Some(i);
            }
        }
    }
    start.map(|s| (s, lines.len()))
}

/// Indent width of the first key under `services:` (defaults to 2).
fn service_indent(contents: &str) -> usize {
    let mut in_services = false;
    for line in contents.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        if indent_of(trimmed) == 0 {
            in_services = trimmed == "services:";
            continue;
        }
        if in_services {
            return indent_of(trimmed);
        }
    }
    2
}

/// Indent for keys inside a service, taken from the first child line.
fn child_indent(lines: &[&str], service_line: usize) -> usize {
    let base = indent_of(lines[service_line]);
    for line in lines.iter().skip(service_line + 1) {
        let trimmed = line.trim_end();
        if trimmed.is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        let indent = indent_of(trimmed);
        if indent > base {
            return indent;
        }
        break;
    }
    base + 2
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# stack for n8n
services:
  web:
    image: nginx:alpine
    ports:
      - \"80:80\"
  app:
    image: n8nio/n8n
    env_file: .env
volumes:
  data:
";

    #[test]
    fn lists_services() {
        assert_eq!(list_services(SAMPLE), vec!["web", "app"]);
    }

    #[test]
    fn reads_scalar_env_file() {
        assert_eq!(service_env_files(SAMPLE, "app"), vec![".env"]);
        assert!(service_env_files(SAMPLE, "web").is_empty());
    }

    #[test]
    fn inserts_env_file_when_absent() {
        let updated = add_env_files(SAMPLE, "web", &[".env.secrets".to_string()]).unwrap();
        assert!(updated.contains("  web:\n    env_file:\n      - .env.secrets\n"));
        // comments and unrelated services untouched
        assert!(updated.contains("# stack for n8n"));
        assert!(updated.contains("env_file: .env"));
    }

    #[test]
    fn converts_scalar_to_list() {
        let updated = add_env_files(SAMPLE, "app", &[".env.secrets".to_string()]).unwrap();
        assert!(updated.contains("    env_file:\n      - .env\n      - .env.secrets\n"));
        assert_eq!(
            service_env_files(&updated, "app"),
            vec![".env", ".env.secrets"]
        );
    }

    #[test]
    fn appends_to_existing_list() {
        let listed = add_env_files(SAMPLE, "app", &[".env.secrets".to_string()]).unwrap();
        let again =
            add_env_files(&listed, "app", &[".env.local".to_string()]).unwrap();
        assert_eq!(
            service_env_files(&again, "app"),
            vec![".env", ".env.secrets", ".env.local"]
        );
    }

    #[test]
    fn no_change_when_already_present() {
        assert!(add_env_files(SAMPLE, "app", &[".env".to_string()]).is_none());
    }

    #[test]
    fn missing_service_returns_none() {
        assert!(add_env_files(SAMPLE, "db", &[".env".to_string()]).is_none());
    }

    #[test]
    fn volumes_section_is_not_a_service() {
        assert!(!list_services(SAMPLE).contains(&"data".to_string()));
    }
}

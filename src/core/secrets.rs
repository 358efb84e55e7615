//! Secret access helpers shared by the CLI commands.
//!
//! Covers KV path construction, the client-side merge-on-write semantics,
//! and the content hash used for change detection. The merge is a plain
//! read-modify-write; a concurrent writer can race it, which this tool
//! does not attempt to prevent.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::config::Settings;
use crate::core::client::VaultClient;
use crate::error::{Result, VaultError};

/// Which KV subtree a command operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Lxc,
    Docker,
}

impl SecretKind {
    pub fn base_path<'a>(&self, settings: &'a Settings) -> &'a str {
        match self {
            SecretKind::Lxc => &settings.kv_lxc_path,
            SecretKind::Docker => &settings.kv_docker_path,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SecretKind::Lxc => "LXC",
            SecretKind::Docker => "Docker",
        }
    }
}

/// Full KV path for a named secret: `{base}/{name}`.
pub fn secret_path(settings: &Settings, kind: SecretKind, name: &str) -> String {
    format!("{}/{}", kind.base_path(settings), name)
}

/// Read a secret, mapping 404 to an empty map.
pub fn get_or_empty(
    client: &VaultClient,
    settings: &Settings,
    kind: SecretKind,
    name: &str,
) -> Result<HashMap<String, String>> {
    match client.kv_get(&settings.kv_mount, &secret_path(settings, kind, name)) {
        Ok(data) => Ok(data),
        Err(e) if e.is_not_found() => Ok(HashMap::new()),
        Err(e) => Err(e.into()),
    }
}

/// List secret names under a subtree, with trailing slashes stripped.
pub fn list_names(
    client: &VaultClient,
    settings: &Settings,
    kind: SecretKind,
) -> Result<Vec<String>> {
    let mut names: Vec<String> = client
        .kv_list(&settings.kv_mount, kind.base_path(settings))?
        .into_iter()
        .map(|k| k.trim_end_matches('/').to_string())
        .collect();
    names.sort();
    Ok(names)
}

/// Write a secret, merging into the existing data unless `replace` is set.
///
/// Returns the data actually written.
pub fn put(
    client: &VaultClient,
    settings: &Settings,
    kind: SecretKind,
    name: &str,
    new_data: HashMap<String, String>,
    replace: bool,
) -> Result<HashMap<String, String>> {
    let data = if replace {
        new_data
    } else {
        let mut merged = get_or_empty(client, settings, kind, name)?;
        merged.extend(new_data);
        merged
    };
    client.kv_put(&settings.kv_mount, &secret_path(settings, kind, name), &data)?;
    Ok(data)
}

/// SHA-256 over the sorted key/value pairs, used for change detection.
///
/// Stable across map iteration order; `None` when the secret is empty or
/// missing so "unreadable" and "unchanged" stay distinguishable.
pub fn content_hash(data: &HashMap<String, String>) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let mut pairs: Vec<(&String, &String)> = data.iter().collect();
    pairs.sort();
    let mut hasher = Sha256::new();
    for (k, v) in pairs {
        hasher.update(k.as_bytes());
        hasher.update([0]);
        hasher.update(v.as_bytes());
        hasher.update([0]);
    }
    Some(format!("{:x}", hasher.finalize()))
}

/// Short hash for display (12 hex chars).
pub fn short_hash(data: &HashMap<String, String>) -> Option<String> {
    content_hash(data).map(|h| h[..12].to_string())
}

/// Mask a value for display when its key looks sensitive.
pub fn display_value(key: &str, value: &str) -> String {
    const SENSITIVE: &[&str] = &["password", "secret", "token", "key", "credential"];
    let lower = key.to_lowercase();
    if SENSITIVE.iter().any(|s| lower.contains(s)) {
        mask(value)
    } else {
        value.to_string()
    }
}

fn mask(value: &str) -> String {
    let n = value.chars().count();
    if n > 4 {
        let first: String = value.chars().take(2).collect();
        let last: String = value.chars().skip(n - 2).collect();
        format!("{first}{}{last}", "*".repeat(n - 4))
    } else {
        "*".repeat(n)
    }
}

/// Convenience: fetch a secret for injection commands using the LXC subtree.
pub fn fetch_for_injection(
    settings: &Settings,
    name: &str,
) -> Result<HashMap<String, String>> {
    let client = crate::core::session::authenticated_client(settings)?;
    get_or_empty(&client, settings, SecretKind::Lxc, name)
}

/// Collect secret values for scan/redact, keyed `name/key`, skipping values
/// shorter than `min_len`.
pub fn collect_values(
    settings: &Settings,
    name: Option<&str>,
    min_len: usize,
) -> Result<HashMap<String, String>> {
    let client = crate::core::session::authenticated_client(settings)?;
    let names: Vec<String> = match name {
        Some(n) => vec![n.to_string()],
        None => list_names(&client, settings, SecretKind::Lxc)?,
    };

    let mut out = HashMap::new();
    for n in names {
        for (k, v) in get_or_empty(&client, settings, SecretKind::Lxc, &n)? {
            if v.chars().count() >= min_len {
                out.insert(format!("{n}/{k}"), v);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn path_joins_base_and_name() {
        let s = Settings::default();
        assert_eq!(secret_path(&s, SecretKind::Lxc, "130-n8n"), "lxc/130-n8n");
        assert_eq!(secret_path(&s, SecretKind::Docker, "n8n"), "docker/n8n");
    }

    #[test]
    fn hash_is_order_independent() {
        let a = map(&[("x", "1"), ("y", "2")]);
        let b = map(&[("y", "2"), ("x", "1")]);
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_distinguishes_key_value_boundaries() {
        // "ab"="c" must not collide with "a"="bc"
        let a = map(&[("ab", "c")]);
        let b = map(&[("a", "bc")]);
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn empty_secret_has_no_hash() {
        assert_eq!(content_hash(&HashMap::new()), None);
    }

    #[test]
    fn short_hash_is_twelve_chars() {
        let h = short_hash(&map(&[("k", "v")])).unwrap();
        assert_eq!(h.len(), 12);
    }

    #[test]
    fn sensitive_keys_are_masked() {
        assert_eq!(display_value("root_password", "hunter22"), "hu****22");
        assert_eq!(display_value("api_key", "abc"), "***");
        assert_eq!(display_value("ip", "10.0.0.1"), "10.0.0.1");
    }
}

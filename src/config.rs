//! Layered configuration.
//!
//! Settings are resolved from four sources, highest precedence first:
//!
//! 1. process environment (`VAULTCTL_*`, plus bare `VAULT_ADDR`/`VAULT_TOKEN`)
//! 2. `.env` in the current directory
//! 3. user config (`~/.config/vaultctl/config`)
//! 4. system config (`/etc/vaultctl/config`)
//!
//! Config files are plain `KEY=value` lines. The system config uses the
//! `VAULT_*` names written by `vaultctl setup init`; the user config and
//! `.env` use the `VAULTCTL_*` names.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::envfile;
use crate::error::{ConfigError, Result};

/// System-wide config file written by `vaultctl setup init`.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/vaultctl/config";

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub vault_addr: String,
    pub vault_token: Option<String>,
    pub vault_namespace: Option<String>,
    pub vault_skip_verify: bool,

    pub approle_role_id: Option<String>,
    pub approle_secret_id: Option<String>,
    pub approle_mount: String,

    pub kv_mount: String,
    pub kv_lxc_path: String,
    pub kv_docker_path: String,

    /// Renew the token when its TTL drops below this many seconds.
    pub token_renew_threshold: u64,
    /// TTL increment requested on renewal, in seconds.
    pub token_renew_increment: u64,

    pub op_vault: String,
    pub op_item: String,
    pub op_field: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vault_addr: "https://vault.example.com".to_string(),
            vault_token: None,
            vault_namespace: None,
            vault_skip_verify: false,
            approle_role_id: None,
            approle_secret_id: None,
            approle_mount: "approle".to_string(),
            kv_mount: "proxmox".to_string(),
            kv_lxc_path: "lxc".to_string(),
            kv_docker_path: "docker".to_string(),
            token_renew_threshold: 3600,
            token_renew_increment: 86400,
            op_vault: "Infrastructure".to_string(),
            op_item: "vault-token".to_string(),
            op_field: "credential".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the standard layer chain.
    pub fn load() -> Self {
        let mut s = Self::default();

        s.apply_file(Path::new(SYSTEM_CONFIG_FILE));
        if let Some(user) = Self::user_config_file() {
            s.apply_file(&user);
        }
        s.apply_file(Path::new(".env"));
        s.apply_env(std::env::vars().collect());

        s
    }

    /// Apply a `KEY=value` config file as one layer. Missing files are skipped.
    fn apply_file(&mut self, path: &Path) {
        if !path.exists() {
            return;
        }
        match envfile::load(path) {
            Ok(kv) => {
                debug!(path = %path.display(), keys = kv.len(), "config layer loaded");
                self.apply_kv(&kv);
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "config layer unreadable, skipped");
            }
        }
    }

    /// Apply the process environment as the highest-precedence layer.
    fn apply_env(&mut self, vars: HashMap<String, String>) {
        self.apply_kv(&vars);
    }

    fn apply_kv(&mut self, kv: &HashMap<String, String>) {
        let get = |names: &[&str]| -> Option<String> {
            names
                .iter()
                .find_map(|n| kv.get(*n))
                .filter(|v| !v.is_empty())
                .cloned()
        };

        if let Some(v) = get(&["VAULTCTL_VAULT_ADDR", "VAULT_ADDR"]) {
            self.vault_addr = v;
        }
        if let Some(v) = get(&["VAULTCTL_VAULT_TOKEN", "VAULT_TOKEN"]) {
            self.vault_token = Some(v);
        }
        if let Some(v) = get(&["VAULTCTL_VAULT_NAMESPACE", "VAULT_NAMESPACE"]) {
            self.vault_namespace = Some(v);
        }
        if let Some(v) = get(&["VAULTCTL_VAULT_SKIP_VERIFY", "VAULT_SKIP_VERIFY"]) {
            self.vault_skip_verify = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = get(&["VAULTCTL_APPROLE_ROLE_ID", "VAULT_ROLE_ID"]) {
            self.approle_role_id = Some(v);
        }
        if let Some(v) = get(&["VAULTCTL_APPROLE_SECRET_ID", "VAULT_SECRET_ID"]) {
            self.approle_secret_id = Some(v);
        }
        if let Some(v) = get(&["VAULTCTL_APPROLE_MOUNT"]) {
            self.approle_mount = v;
        }
        if let Some(v) = get(&["VAULTCTL_KV_MOUNT"]) {
            self.kv_mount = v;
        }
        if let Some(v) = get(&["VAULTCTL_KV_LXC_PATH"]) {
            self.kv_lxc_path = v;
        }
        if let Some(v) = get(&["VAULTCTL_KV_DOCKER_PATH"]) {
            self.kv_docker_path = v;
        }
        if let Some(v) = get(&["VAULTCTL_TOKEN_RENEW_THRESHOLD"]) {
            if let Ok(n) = v.parse() {
                self.token_renew_threshold = n;
            }
        }
        if let Some(v) = get(&["VAULTCTL_TOKEN_RENEW_INCREMENT"]) {
            if let Ok(n) = v.parse() {
                self.token_renew_increment = n;
            }
        }
        if let Some(v) = get(&["VAULTCTL_OP_VAULT"]) {
            self.op_vault = v;
        }
        if let Some(v) = get(&["VAULTCTL_OP_ITEM"]) {
            self.op_item = v;
        }
        if let Some(v) = get(&["VAULTCTL_OP_FIELD"]) {
            self.op_field = v;
        }
    }

    /// `$XDG_CONFIG_HOME/vaultctl` (or `~/.config/vaultctl`).
    pub fn config_dir() -> Option<PathBuf> {
        match std::env::var_os("XDG_CONFIG_HOME") {
            Some(d) if !d.is_empty() => Some(PathBuf::from(d).join("vaultctl")),
            _ => dirs::home_dir().map(|h| h.join(".config").join("vaultctl")),
        }
    }

    /// `$XDG_CACHE_HOME/vaultctl` (or `~/.cache/vaultctl`).
    pub fn cache_dir() -> Option<PathBuf> {
        match std::env::var_os("XDG_CACHE_HOME") {
            Some(d) if !d.is_empty() => Some(PathBuf::from(d).join("vaultctl")),
            _ => dirs::home_dir().map(|h| h.join(".cache").join("vaultctl")),
        }
    }

    pub fn user_config_file() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config"))
    }

    /// Path of the cached bearer token.
    pub fn token_cache_file() -> Result<PathBuf> {
        Ok(Self::cache_dir()
            .ok_or(ConfigError::NoHomeDir)?
            .join("token"))
    }

    /// Create config and cache dirs; the cache dir is restricted to the owner.
    pub fn ensure_dirs() -> Result<()> {
        if let Some(d) = Self::config_dir() {
            std::fs::create_dir_all(&d)?;
        }
        if let Some(d) = Self::cache_dir() {
            std::fs::create_dir_all(&d)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&d, std::fs::Permissions::from_mode(0o700))?;
            }
        }
        Ok(())
    }

    pub fn has_approle_credentials(&self) -> bool {
        self.approle_role_id.is_some() && self.approle_secret_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.vault_addr, "https://vault.example.com");
        assert_eq!(s.kv_mount, "proxmox");
        assert_eq!(s.approle_mount, "approle");
        assert_eq!(s.token_renew_threshold, 3600);
        assert!(s.vault_token.is_none());
    }

    #[test]
    fn later_layer_overrides_earlier() {
        let mut s = Settings::default();
        s.apply_kv(&kv(&[("VAULT_ADDR", "https://system.example.com")]));
        assert_eq!(s.vault_addr, "https://system.example.com");
        s.apply_kv(&kv(&[("VAULTCTL_VAULT_ADDR", "https://env.example.com")]));
        assert_eq!(s.vault_addr, "https://env.example.com");
    }

    #[test]
    fn prefixed_name_beats_bare_name_within_a_layer() {
        let mut s = Settings::default();
        s.apply_kv(&kv(&[
            ("VAULT_ADDR", "https://bare.example.com"),
            ("VAULTCTL_VAULT_ADDR", "https://prefixed.example.com"),
        ]));
        assert_eq!(s.vault_addr, "https://prefixed.example.com");
    }

    #[test]
    fn system_config_vault_names_map_to_approle_fields() {
        let mut s = Settings::default();
        s.apply_kv(&kv(&[
            ("VAULT_ROLE_ID", "rid-123"),
            ("VAULT_SECRET_ID", "sid-456"),
        ]));
        assert!(s.has_approle_credentials());
        assert_eq!(s.approle_role_id.as_deref(), Some("rid-123"));
    }

    #[test]
    fn empty_values_are_ignored() {
        let mut s = Settings::default();
        s.apply_kv(&kv(&[("VAULTCTL_VAULT_TOKEN", "")]));
        assert!(s.vault_token.is_none());
    }

    #[test]
    fn numeric_fields_parse() {
        let mut s = Settings::default();
        s.apply_kv(&kv(&[
            ("VAULTCTL_TOKEN_RENEW_THRESHOLD", "7200"),
            ("VAULTCTL_TOKEN_RENEW_INCREMENT", "not-a-number"),
        ]));
        assert_eq!(s.token_renew_threshold, 7200);
        // unparsable values keep the default
        assert_eq!(s.token_renew_increment, 86400);
    }

    #[test]
    fn skip_verify_accepts_truthy_strings() {
        for v in ["1", "true", "yes"] {
            let mut s = Settings::default();
            s.apply_kv(&kv(&[("VAULTCTL_VAULT_SKIP_VERIFY", v)]));
            assert!(s.vault_skip_verify, "{v} should enable skip_verify");
        }
        let mut s = Settings::default();
        s.apply_kv(&kv(&[("VAULTCTL_VAULT_SKIP_VERIFY", "0")]));
        assert!(!s.vault_skip_verify);
    }
}

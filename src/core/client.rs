//! Blocking HTTP client for the Vault API.
//!
//! A thin wrapper over the documented REST endpoints: KV v2, AppRole auth,
//! token lifecycle, ACL policies and `sys/health`. Every request carries
//! `X-Vault-Token`; non-2xx responses surface Vault's `errors` array as a
//! [`VaultError`] with the HTTP status attached.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Settings;
use crate::error::VaultError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Token details from `auth/token/lookup-self`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TokenInfo {
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub token_policies: Vec<String>,
    #[serde(default)]
    pub ttl: u64,
    #[serde(default)]
    pub explicit_max_ttl: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub orphan: bool,
    #[serde(default)]
    pub creation_time: Option<i64>,
    #[serde(default)]
    pub expire_time: Option<String>,
    #[serde(default)]
    pub issue_time: Option<String>,
    #[serde(default)]
    pub num_uses: i64,
    #[serde(default)]
    pub meta: Option<HashMap<String, String>>,
}

/// The `auth` block of login / renew / create responses.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthInfo {
    #[serde(default)]
    pub client_token: String,
    #[serde(default)]
    pub policies: Vec<String>,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// Server state from `sys/health`. An unreachable server reads as
/// uninitialized and sealed.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthInfo {
    #[serde(default)]
    pub initialized: bool,
    #[serde(default = "default_true")]
    pub sealed: bool,
    #[serde(default)]
    pub version: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Blocking Vault API client.
pub struct VaultClient {
    addr: String,
    token: Option<String>,
    http: Client,
}

impl VaultClient {
    /// Build a client from settings, optionally overriding the token.
    pub fn new(settings: &Settings, token: Option<String>) -> Result<Self, VaultError> {
        let mut builder = Client::builder().timeout(REQUEST_TIMEOUT);
        if settings.vault_skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ns) = &settings.vault_namespace {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(ns)
                .map_err(|e| VaultError::new(format!("invalid namespace: {e}"), None))?;
            headers.insert("X-Vault-Namespace", value);
            builder = builder.default_headers(headers);
        }
        let http = builder
            .build()
            .map_err(|e| VaultError::new(format!("http client: {e}"), None))?;

        Ok(Self {
            addr: settings.vault_addr.trim_end_matches('/').to_string(),
            token: token.or_else(|| settings.vault_token.clone()),
            http,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Perform a request against `/v1/{path}` and decode the JSON body.
    fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, VaultError> {
        let url = format!("{}/v1/{}", self.addr, path);
        debug!(%method, %path, "vault request");

        let mut req = self.http.request(method, &url);
        if let Some(token) = &self.token {
            req = req.header("X-Vault-Token", token);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req
            .send()
            .map_err(|e| VaultError::new(format!("connection failed: {e}"), None))?;

        let status = response.status().as_u16();
        if status == 204 {
            return Ok(json!({}));
        }

        let text = response
            .text()
            .map_err(|e| VaultError::new(format!("read response: {e}"), Some(status)))?;
        let result: Value = if text.is_empty() {
            json!({})
        } else {
            serde_json::from_str(&text)
                .map_err(|e| VaultError::new(format!("invalid response: {e}"), Some(status)))?
        };

        if status >= 400 {
            let message = result["errors"]
                .as_array()
                .filter(|errs| !errs.is_empty())
                .map(|errs| {
                    errs.iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("; ")
                })
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(VaultError::new(message, Some(status)));
        }

        Ok(result)
    }

    // ── token lifecycle ─────────────────────────────────────────────────

    /// Look up the current token.
    pub fn token_lookup(&self) -> Result<TokenInfo, VaultError> {
        let result = self.request(Method::GET, "auth/token/lookup-self", None)?;
        serde_json::from_value(result["data"].clone())
            .map_err(|e| VaultError::new(format!("invalid response: {e}"), None))
    }

    /// Renew the current token, optionally requesting a TTL increment.
    pub fn token_renew(&self, increment: Option<u64>) -> Result<AuthInfo, VaultError> {
        let body = increment.map(|s| json!({ "increment": format!("{s}s") }));
        let result = self.request(Method::POST, "auth/token/renew-self", body.as_ref())?;
        serde_json::from_value(result["auth"].clone())
            .map_err(|e| VaultError::new(format!("invalid response: {e}"), None))
    }

    /// Create a new token with the given policies.
    pub fn token_create(
        &self,
        policies: &[String],
        ttl: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<AuthInfo, VaultError> {
        let mut body = json!({
            "policies": policies,
            "no_default_policy": true,
        });
        if let Some(ttl) = ttl {
            body["ttl"] = json!(ttl);
        }
        if let Some(name) = display_name {
            body["display_name"] = json!(name);
        }
        let result = self.request(Method::POST, "auth/token/create", Some(&body))?;
        serde_json::from_value(result["auth"].clone())
            .map_err(|e| VaultError::new(format!("invalid response: {e}"), None))
    }

    /// True when the current token passes a self-lookup.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.token_lookup().is_ok()
    }

    // ── AppRole ─────────────────────────────────────────────────────────

    /// Log in with an AppRole (role-id, secret-id) pair.
    pub fn approle_login(
        &self,
        role_id: &str,
        secret_id: &str,
        mount: &str,
    ) -> Result<AuthInfo, VaultError> {
        let body = json!({ "role_id": role_id, "secret_id": secret_id });
        let result = self.request(Method::POST, &format!("auth/{mount}/login"), Some(&body))?;
        serde_json::from_value(result["auth"].clone())
            .map_err(|e| VaultError::new(format!("invalid response: {e}"), None))
    }

    /// Read an AppRole definition; errors with 404 when the role is missing.
    pub fn approle_read_role(&self, mount: &str, role: &str) -> Result<Value, VaultError> {
        self.request(Method::GET, &format!("auth/{mount}/role/{role}"), None)
    }

    /// Create or update an AppRole definition.
    pub fn approle_write_role(
        &self,
        mount: &str,
        role: &str,
        definition: &Value,
    ) -> Result<(), VaultError> {
        self.request(
            Method::POST,
            &format!("auth/{mount}/role/{role}"),
            Some(definition),
        )?;
        Ok(())
    }

    /// Fetch the role-id of an AppRole.
    pub fn approle_role_id(&self, mount: &str, role: &str) -> Result<String, VaultError> {
        let result = self.request(Method::GET, &format!("auth/{mount}/role/{role}/role-id"), None)?;
        Ok(result["data"]["role_id"].as_str().unwrap_or_default().to_string())
    }

    /// Generate a fresh secret-id for an AppRole.
    pub fn approle_secret_id(&self, mount: &str, role: &str) -> Result<String, VaultError> {
        let result = self.request(
            Method::POST,
            &format!("auth/{mount}/role/{role}/secret-id"),
            None,
        )?;
        Ok(result["data"]["secret_id"].as_str().unwrap_or_default().to_string())
    }

    // ── KV v2 ───────────────────────────────────────────────────────────

    /// Read a secret; values are flattened to strings.
    pub fn kv_get(&self, mount: &str, path: &str) -> Result<HashMap<String, String>, VaultError> {
        let result = self.request(Method::GET, &format!("{mount}/data/{path}"), None)?;
        Ok(flatten_map(&result["data"]["data"]))
    }

    /// Write a secret (full replacement; callers merge beforehand).
    pub fn kv_put(
        &self,
        mount: &str,
        path: &str,
        data: &HashMap<String, String>,
    ) -> Result<(), VaultError> {
        let body = json!({ "data": data });
        self.request(Method::POST, &format!("{mount}/data/{path}"), Some(&body))?;
        Ok(())
    }

    /// Delete the latest version of a secret.
    pub fn kv_delete(&self, mount: &str, path: &str) -> Result<(), VaultError> {
        self.request(Method::DELETE, &format!("{mount}/data/{path}"), None)?;
        Ok(())
    }

    /// List keys under a path; a missing path is an empty list.
    pub fn kv_list(&self, mount: &str, path: &str) -> Result<Vec<String>, VaultError> {
        let method = Method::from_bytes(b"LIST")
            .map_err(|e| VaultError::new(format!("LIST method: {e}"), None))?;
        match self.request(method, &format!("{mount}/metadata/{path}"), None) {
            Ok(result) => Ok(result["data"]["keys"]
                .as_array()
                .map(|keys| {
                    keys.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    // ── policies & sys ──────────────────────────────────────────────────

    pub fn policy_write(&self, name: &str, policy: &str) -> Result<(), VaultError> {
        let body = json!({ "policy": policy });
        self.request(Method::PUT, &format!("sys/policies/acl/{name}"), Some(&body))?;
        Ok(())
    }

    /// Mounted secret engines (`sys/mounts`), keyed by `<mount>/`.
    pub fn sys_mounts(&self) -> Result<Value, VaultError> {
        let result = self.request(Method::GET, "sys/mounts", None)?;
        Ok(result["data"].clone())
    }

    /// Enabled auth methods (`sys/auth`), keyed by `<mount>/`.
    pub fn sys_auth(&self) -> Result<Value, VaultError> {
        let result = self.request(Method::GET, "sys/auth", None)?;
        Ok(result["data"].clone())
    }

    /// Enable an auth method at the given mount.
    pub fn sys_enable_auth(&self, mount: &str, method_type: &str) -> Result<(), VaultError> {
        let body = json!({ "type": method_type });
        self.request(Method::POST, &format!("sys/auth/{mount}"), Some(&body))?;
        Ok(())
    }

    /// Server health. Connection failures read as uninitialized/sealed.
    pub fn health(&self) -> HealthInfo {
        let url = format!("{}/v1/sys/health", self.addr);
        let parsed = self
            .http
            .get(&url)
            .send()
            .ok()
            .and_then(|r| r.json::<HealthInfo>().ok());
        parsed.unwrap_or(HealthInfo {
            initialized: false,
            sealed: true,
            version: None,
        })
    }
}

/// Flatten a JSON object to string values; non-string values keep their
/// JSON rendering.
fn flatten_map(value: &Value) -> HashMap<String, String> {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let s = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), s)
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_keeps_strings_and_renders_scalars() {
        let v = json!({ "name": "n8n", "port": 5678, "debug": false });
        let m = flatten_map(&v);
        assert_eq!(m["name"], "n8n");
        assert_eq!(m["port"], "5678");
        assert_eq!(m["debug"], "false");
    }

    #[test]
    fn flatten_of_non_object_is_empty() {
        assert!(flatten_map(&json!(null)).is_empty());
        assert!(flatten_map(&json!("str")).is_empty());
    }

    #[test]
    fn addr_trailing_slash_is_trimmed() {
        let settings = Settings {
            vault_addr: "http://127.0.0.1:8200/".to_string(),
            ..Settings::default()
        };
        let client = VaultClient::new(&settings, None).unwrap();
        assert_eq!(client.addr(), "http://127.0.0.1:8200");
    }
}

//! Test support utilities for vaultctl integration tests.
//!
//! Provides an isolated environment per test (temp project dir, temp home)
//! and a mock Vault server. The binary uses a blocking HTTP client, so the
//! async mock server runs on a runtime owned by the harness.

#![allow(dead_code)]

use std::process::Output;

use assert_cmd::Command;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_TOKEN: &str = "hvs.test-token";

/// Isolated test environment with a mock Vault server.
///
/// No process-global state is mutated; child processes get their own HOME
/// and XDG dirs so tests can run in parallel.
pub struct Test {
    /// Temporary directory for the test project
    pub dir: TempDir,
    /// Temporary home directory
    pub home: TempDir,
    rt: Runtime,
    pub server: MockServer,
}

impl Test {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");
        let rt = Runtime::new().expect("failed to create runtime");
        let server = rt.block_on(MockServer::start());
        Self {
            dir,
            home,
            rt,
            server,
        }
    }

    /// Environment with a token that passes self-lookup.
    pub fn authenticated() -> Self {
        let t = Self::new();
        t.mock_token_lookup(3600 * 24, true);
        t
    }

    /// Create a vaultctl command pointed at the mock server.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("vaultctl").expect("failed to find vaultctl binary");
        cmd.env("HOME", self.home.path());
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("XDG_CONFIG_HOME", self.home.path().join(".config"));
        cmd.env("XDG_CACHE_HOME", self.home.path().join(".cache"));
        cmd.env("VAULT_ADDR", self.server.uri());
        cmd.env("VAULT_TOKEN", TEST_TOKEN);
        cmd.env("NO_COLOR", "1");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Same command without any token in the environment.
    pub fn cmd_unauthenticated(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.env_remove("VAULT_TOKEN");
        cmd
    }

    /// Plain std command with the same environment as [`Test::cmd`], for
    /// tests that spawn the binary and manage it themselves.
    pub fn std_cmd(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(assert_cmd::cargo::cargo_bin("vaultctl"));
        cmd.env("HOME", self.home.path());
        cmd.env("USERPROFILE", self.home.path());
        cmd.env("XDG_CONFIG_HOME", self.home.path().join(".config"));
        cmd.env("XDG_CACHE_HOME", self.home.path().join(".cache"));
        cmd.env("VAULT_ADDR", self.server.uri());
        cmd.env("VAULT_TOKEN", TEST_TOKEN);
        cmd.env("NO_COLOR", "1");
        cmd.current_dir(self.dir.path());
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd()
            .args(args)
            .output()
            .expect("failed to run vaultctl")
    }

    fn mount(&self, mock: Mock) {
        self.rt.block_on(self.server.register(mock));
    }

    // ── Vault API mocks ─────────────────────────────────────────────────

    /// `auth/token/lookup-self` answering for the test token.
    pub fn mock_token_lookup(&self, ttl: u64, renewable: bool) {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/v1/auth/token/lookup-self"))
                .and(header("X-Vault-Token", TEST_TOKEN))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "data": {
                        "accessor": "accessor-test",
                        "display_name": "token-test",
                        "policies": ["default", "vaultctl"],
                        "ttl": ttl,
                        "renewable": renewable,
                        "orphan": false,
                        "num_uses": 0,
                    }
                }))),
        );
    }

    pub fn mock_health(&self, initialized: bool, sealed: bool) {
        self.mount(
            Mock::given(method("GET"))
                .and(path("/v1/sys/health"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "initialized": initialized,
                    "sealed": sealed,
                    "version": "1.15.0",
                }))),
        );
    }

    /// KV v2 read under the default `proxmox` mount.
    pub fn mock_kv_get(&self, kv_path: &str, data: Value) {
        self.mount(
            Mock::given(method("GET"))
                .and(path(format!("/v1/proxmox/data/{kv_path}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "data": { "data": data } })),
                ),
        );
    }

    pub fn mock_kv_get_404(&self, kv_path: &str) {
        self.mount(
            Mock::given(method("GET"))
                .and(path(format!("/v1/proxmox/data/{kv_path}")))
                .respond_with(
                    ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })),
                ),
        );
    }

    pub fn mock_kv_put(&self, kv_path: &str) {
        self.mount(
            Mock::given(method("POST"))
                .and(path(format!("/v1/proxmox/data/{kv_path}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} }))),
        );
    }

    /// KV v2 LIST on the metadata path.
    pub fn mock_kv_list(&self, kv_path: &str, keys: &[&str]) {
        self.mount(
            Mock::given(method("LIST"))
                .and(path(format!("/v1/proxmox/metadata/{kv_path}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "data": { "keys": keys } })),
                ),
        );
    }

    pub fn mock_kv_delete(&self, kv_path: &str) {
        self.mount(
            Mock::given(method("DELETE"))
                .and(path(format!("/v1/proxmox/data/{kv_path}")))
                .respond_with(ResponseTemplate::new(204)),
        );
    }

    /// AppRole login issuing the test token.
    pub fn mock_approle_login(&self) {
        self.mount(
            Mock::given(method("POST"))
                .and(path("/v1/auth/approle/login"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "auth": {
                        "client_token": TEST_TOKEN,
                        "policies": ["default", "vaultctl"],
                        "lease_duration": 3600,
                        "renewable": true,
                    }
                }))),
        );
    }

    pub fn mock_token_renew(&self, lease_duration: u64) {
        self.mount(
            Mock::given(method("POST"))
                .and(path("/v1/auth/token/renew-self"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "auth": {
                        "client_token": TEST_TOKEN,
                        "policies": ["default", "vaultctl"],
                        "lease_duration": lease_duration,
                        "renewable": true,
                    }
                }))),
        );
    }

    /// Received requests, for body assertions.
    pub fn received_requests(&self) -> Vec<wiremock::Request> {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
    }
}

pub fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

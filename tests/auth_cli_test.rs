//! `vaultctl auth` integration tests against a mock Vault server.

mod support;

use support::*;

#[test]
fn status_reports_server_and_token() {
    let t = Test::authenticated();
    t.mock_health(true, false);

    let out = t.run(&["auth", "status"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("Vault server"));
    assert!(stdout.contains("Authenticated"));
    assert!(stdout.contains("vaultctl"), "policies shown: {stdout}");
}

#[test]
fn status_fails_on_sealed_server() {
    let t = Test::new();
    t.mock_health(true, true);

    let out = t.run(&["auth", "status"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_of(&out).contains("sealed"));
}

#[test]
fn status_warns_when_not_authenticated() {
    let t = Test::new();
    t.mock_health(true, false);
    // No lookup-self mock: every token is rejected.

    let out = t.run(&["auth", "status"]);
    assert!(out.status.success());
    let stdout = stdout_of(&out);
    assert!(stdout.contains("Not authenticated"));
    assert!(stdout.contains("vaultctl auth login"));
}

#[test]
fn whoami_shows_token_details() {
    let t = Test::authenticated();

    let out = t.run(&["auth", "whoami"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("token-test"));
    assert!(stdout.contains("Policies"));
}

#[test]
fn whoami_fails_without_any_token() {
    let t = Test::new();

    let out = t
        .cmd_unauthenticated()
        .args(["auth", "whoami"])
        .output()
        .expect("failed to run vaultctl");
    assert_eq!(out.status.code(), Some(1));
    let stderr = stderr_of(&out);
    assert!(stderr.contains("authentication required"));
    assert!(stderr.contains("vaultctl auth login"), "stderr: {stderr}");
}

#[test]
fn login_with_explicit_token_caches_it() {
    let t = Test::new();
    t.mock_token_lookup(86400, true);

    let out = t.run(&["auth", "login", "--token", TEST_TOKEN, "--force"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert!(stdout_of(&out).contains("authentication complete"));

    let cache = t.home.path().join(".cache/vaultctl/token");
    let cached = std::fs::read_to_string(cache).expect("token cache missing");
    assert_eq!(cached.trim(), TEST_TOKEN);
}

#[test]
fn approle_credentials_log_in_and_cache_the_token() {
    let t = Test::new();
    t.mock_approle_login();
    t.mock_token_lookup(86400, true);

    let out = t
        .cmd_unauthenticated()
        .env("VAULT_ROLE_ID", "role-id-test")
        .env("VAULT_SECRET_ID", "secret-id-test")
        .args(["auth", "whoami"])
        .output()
        .expect("failed to run vaultctl");
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert!(stdout_of(&out).contains("token-test"));

    // The AppRole token lands in the cache for subsequent invocations.
    let cache = t.home.path().join(".cache/vaultctl/token");
    let cached = std::fs::read_to_string(cache).expect("token cache missing");
    assert_eq!(cached.trim(), TEST_TOKEN);

    let login = t
        .received_requests()
        .into_iter()
        .find(|r| r.url.path() == "/v1/auth/approle/login")
        .expect("no approle login request");
    let body: serde_json::Value = serde_json::from_slice(&login.body).unwrap();
    assert_eq!(body["role_id"], "role-id-test");
    assert_eq!(body["secret_id"], "secret-id-test");
}

#[test]
fn logout_clears_the_cache() {
    let t = Test::new();
    t.mock_token_lookup(86400, true);
    let out = t.run(&["auth", "login", "--token", TEST_TOKEN, "--force"]);
    assert!(out.status.success());

    let out = t.run(&["auth", "logout"]);
    assert!(out.status.success());
    assert!(!t.home.path().join(".cache/vaultctl/token").exists());
}

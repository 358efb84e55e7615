//! Secret injection tests: `run`, `sh`, `scan`, and `redact`.

mod support;

use serde_json::json;
use support::*;

#[test]
fn run_injects_env_variables() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/db", json!({ "db-pass": "secret123" }));

    let out = t.run(&["run", "db", "env"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert!(stdout_of(&out).contains("DB_PASS=secret123"));
}

#[test]
fn run_propagates_the_exit_code() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/db", json!({ "key": "value" }));

    let out = t.run(&["run", "db", "--shell", "exit 3"]);
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn run_reset_keeps_only_the_allowlist() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/db", json!({ "key": "value" }));

    let out = t
        .cmd()
        .env("LEAKY_VAR", "should-not-survive")
        .args(["run", "db", "--reset", "env"])
        .output()
        .expect("failed to run vaultctl");
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("KEY=value"));
    assert!(!stdout.contains("LEAKY_VAR"));
    assert!(stdout.contains("PATH="));
}

#[test]
fn sh_emits_quoted_exports() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/db", json!({ "db-pass": "it's secret" }));

    let out = t.run(&["sh", "db"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("export DB_PASS="));
    // The embedded single quote must be escaped for POSIX shells.
    assert!(stdout.contains(r#"'it'"'"'s secret'"#), "got: {stdout}");
}

#[test]
fn sh_fish_uses_set_gx() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/db", json!({ "key": "value" }));

    let out = t.run(&["sh", "db", "-f", "fish"]);
    assert!(out.status.success());
    assert!(stdout_of(&out).contains("set -gx KEY 'value'"));
}

#[test]
fn scan_finds_hardcoded_values() {
    let t = Test::authenticated();
    t.mock_kv_list("lxc", &["db"]);
    t.mock_kv_get("lxc/db", json!({ "password": "secret123-long" }));
    std::fs::write(
        t.dir.path().join("app.conf"),
        "user = admin\npass = secret123-long\n",
    )
    .unwrap();

    let out = t.run(&["scan", "--error-if-found"]);
    assert_eq!(out.status.code(), Some(1));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("app.conf"));
    assert!(stdout.contains("db/password"));
}

#[test]
fn scan_json_output_is_parseable() {
    let t = Test::authenticated();
    t.mock_kv_list("lxc", &["db"]);
    t.mock_kv_get("lxc/db", json!({ "password": "secret123-long" }));
    std::fs::write(t.dir.path().join("app.conf"), "pass = secret123-long\n").unwrap();

    let out = t.run(&["scan", "--json"]);
    assert!(out.status.success());
    let findings: serde_json::Value = serde_json::from_str(&stdout_of(&out)).unwrap();
    assert_eq!(findings[0]["secret"], "db/password");
    assert_eq!(findings[0]["line"], 1);
}

#[test]
fn scan_respects_excludes() {
    let t = Test::authenticated();
    t.mock_kv_list("lxc", &["db"]);
    t.mock_kv_get("lxc/db", json!({ "password": "secret123-long" }));
    let skipped = t.dir.path().join("node_modules");
    std::fs::create_dir(&skipped).unwrap();
    std::fs::write(skipped.join("dep.js"), "secret123-long").unwrap();

    let out = t.run(&["scan", "--error-if-found"]);
    assert!(out.status.success(), "excluded dir was scanned");
}

#[test]
fn redact_masks_values_from_stdin() {
    let t = Test::authenticated();
    t.mock_kv_list("lxc", &["db"]);
    t.mock_kv_get("lxc/db", json!({ "password": "secret123" }));

    let out = t
        .cmd()
        .arg("redact")
        .write_stdin("login with secret123 ok\n")
        .output()
        .expect("failed to run vaultctl");
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert_eq!(stdout_of(&out), "login with ***REDACTED*** ok\n");
}

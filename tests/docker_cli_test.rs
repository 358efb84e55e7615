//! `vaultctl docker` integration tests: .env generation and import.

mod support;

use serde_json::json;
use support::*;

#[test]
fn env_writes_a_dotenv_file_with_upper_keys() {
    let t = Test::authenticated();
    t.mock_kv_get(
        "docker/n8n",
        json!({ "db-pass": "secret123", "db.host": "postgres" }),
    );

    let out = t.run(&["docker", "env", "n8n", "-o", "n8n.env"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));

    let contents = std::fs::read_to_string(t.dir.path().join("n8n.env")).unwrap();
    assert!(contents.contains("Generated from Vault: n8n"));
    assert!(contents.contains("DB_PASS=secret123"));
    assert!(contents.contains("DB_HOST=postgres"));
}

#[cfg(unix)]
#[test]
fn env_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let t = Test::authenticated();
    t.mock_kv_get("docker/n8n", json!({ "key": "value" }));

    let out = t.run(&["docker", "env", "n8n", "-o", "n8n.env"]);
    assert!(out.status.success());

    let mode = std::fs::metadata(t.dir.path().join("n8n.env"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[test]
fn env_stdout_prints_instead_of_writing() {
    let t = Test::authenticated();
    t.mock_kv_get("docker/n8n", json!({ "key": "value" }));

    let out = t.run(&["docker", "env", "n8n", "--stdout"]);
    assert!(out.status.success());
    assert!(stdout_of(&out).contains("KEY=value"));
    assert!(!t.dir.path().join(".env").exists());
}

#[test]
fn env_for_unknown_service_hints_at_put() {
    let t = Test::authenticated();
    t.mock_kv_get_404("docker/ghost");

    let out = t.run(&["docker", "env", "ghost"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_of(&out).contains("Not found"));
    assert!(stdout_of(&out).contains("docker put"));
}

#[test]
fn import_env_round_trips_a_dotenv_file() {
    let t = Test::authenticated();
    std::fs::write(
        t.dir.path().join(".env"),
        "# comment\nDB_PASS=secret123\nDB_HOST=postgres\n",
    )
    .unwrap();
    t.mock_kv_get_404("docker/n8n");
    t.mock_kv_put("docker/n8n");

    let out = t.run(&["docker", "import-env", "n8n"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));

    let writes: Vec<_> = t
        .received_requests()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect();
    let body: serde_json::Value = serde_json::from_slice(&writes[0].body).unwrap();
    assert_eq!(body["data"]["DB_PASS"], "secret123");
    assert_eq!(body["data"]["DB_HOST"], "postgres");
}

#[test]
fn list_counts_variables_per_service() {
    let t = Test::authenticated();
    t.mock_kv_list("docker", &["n8n"]);
    t.mock_kv_get("docker/n8n", json!({ "a": "1", "b": "2" }));

    let out = t.run(&["docker", "list"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("n8n"));
    assert!(stdout.contains("2 variables"));
}

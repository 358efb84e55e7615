//! `vaultctl lxc` CRUD integration tests against a mock Vault server.

mod support;

use serde_json::json;
use support::*;

#[test]
fn list_shows_sorted_names_without_slashes() {
    let t = Test::authenticated();
    t.mock_kv_list("lxc", &["161-db/", "130-n8n"]);

    let out = t.run(&["lxc", "list"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("130-n8n"));
    assert!(stdout.contains("161-db"));
    assert!(!stdout.contains("161-db/"));
    let n8n = stdout.find("130-n8n").unwrap();
    let db = stdout.find("161-db").unwrap();
    assert!(n8n < db, "expected sorted output:\n{stdout}");
}

#[test]
fn list_is_quiet_when_empty() {
    let t = Test::authenticated();
    t.mock_kv_list("lxc", &[]);

    let out = t.run(&["lxc", "list"]);
    assert!(out.status.success());
    assert!(stdout_of(&out).contains("No LXC entries"));
}

#[test]
fn get_masks_sensitive_fields() {
    let t = Test::authenticated();
    t.mock_kv_get(
        "lxc/130-n8n",
        json!({ "ip": "10.0.0.130", "root_password": "hunter22secret" }),
    );

    let out = t.run(&["lxc", "get", "130-n8n"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("10.0.0.130"));
    assert!(!stdout.contains("hunter22secret"));
    assert!(stdout.contains("**"));
}

#[test]
fn get_raw_field_prints_value_only() {
    let t = Test::authenticated();
    t.mock_kv_get(
        "lxc/130-n8n",
        json!({ "ip": "10.0.0.130", "root_password": "hunter22secret" }),
    );

    let out = t.run(&["lxc", "get", "130-n8n", "-f", "root_password", "--raw"]);
    assert!(out.status.success());
    assert_eq!(stdout_of(&out).trim(), "hunter22secret");
}

#[test]
fn get_unknown_entry_exits_nonzero() {
    let t = Test::authenticated();
    t.mock_kv_get_404("lxc/nope");

    let out = t.run(&["lxc", "get", "nope"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_of(&out).contains("Not found"));
}

#[test]
fn get_unknown_field_lists_available_keys() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/130-n8n", json!({ "ip": "10.0.0.130" }));

    let out = t.run(&["lxc", "get", "130-n8n", "-f", "missing"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_of(&out).contains("not found"));
    assert!(stdout_of(&out).contains("ip"));
}

#[test]
fn put_merges_with_existing_data() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/130-n8n", json!({ "ip": "10.0.0.130" }));
    t.mock_kv_put("lxc/130-n8n");

    let out = t.run(&["lxc", "put", "130-n8n", "notes=n8n host"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert!(stdout_of(&out).contains("Stored 130-n8n"));

    let writes: Vec<_> = t
        .received_requests()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect();
    assert_eq!(writes.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&writes[0].body).unwrap();
    assert_eq!(body["data"]["ip"], "10.0.0.130");
    assert_eq!(body["data"]["notes"], "n8n host");
}

#[test]
fn put_replace_skips_the_merge_read() {
    let t = Test::authenticated();
    t.mock_kv_put("lxc/130-n8n");

    let out = t.run(&["lxc", "put", "130-n8n", "ip=10.0.0.99", "--replace"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));

    let writes: Vec<_> = t
        .received_requests()
        .into_iter()
        .filter(|r| r.method.as_str() == "POST")
        .collect();
    let body: serde_json::Value = serde_json::from_slice(&writes[0].body).unwrap();
    assert_eq!(body["data"], serde_json::json!({ "ip": "10.0.0.99" }));
}

#[test]
fn delete_force_skips_confirmation() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/130-n8n", json!({ "ip": "10.0.0.130" }));
    t.mock_kv_delete("lxc/130-n8n");

    let out = t.run(&["lxc", "delete", "130-n8n", "--force"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    assert!(stdout_of(&out).contains("Deleted 130-n8n"));
}

#[test]
fn export_prints_json_to_stdout() {
    let t = Test::authenticated();
    t.mock_kv_list("lxc", &["130-n8n"]);
    t.mock_kv_get("lxc/130-n8n", json!({ "ip": "10.0.0.130" }));

    let out = t.run(&["lxc", "export"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let parsed: serde_json::Value = serde_json::from_str(&stdout_of(&out)).unwrap();
    assert_eq!(parsed["130-n8n"]["ip"], "10.0.0.130");
}

#[test]
fn import_dry_run_writes_nothing() {
    let t = Test::authenticated();
    let file = t.dir.path().join("import.json");
    std::fs::write(
        &file,
        r#"{ "_comment": "ignored", "161-db": { "ip": "10.0.0.161", "empty": "" } }"#,
    )
    .unwrap();

    let out = t.run(&["lxc", "import", "import.json", "--dry-run"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("161-db"));
    assert!(!stdout.contains("_comment"));
    assert!(t.received_requests().is_empty(), "dry run must not call Vault");
}

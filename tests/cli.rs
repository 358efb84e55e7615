//! Basic CLI behavior: help, completions, config display, and argument
//! validation that, by design, never reaches the Vault server.

mod support;

use predicates::prelude::*;
use support::*;

#[test]
fn help_lists_command_groups() {
    let t = Test::new();
    t.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("lxc"))
        .stdout(predicate::str::contains("docker"))
        .stdout(predicate::str::contains("token"))
        .stdout(predicate::str::contains("compose"))
        .stdout(predicate::str::contains("repo"))
        .stdout(predicate::str::contains("setup"));
}

#[test]
fn version_flag_works() {
    let t = Test::new();
    t.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vaultctl"));
}

#[test]
fn completions_generate_bash_script() {
    let t = Test::new();
    t.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vaultctl"));
}

#[test]
fn config_shows_effective_settings() {
    let t = Test::new();
    t.cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Current Settings"))
        .stdout(predicate::str::contains(t.server.uri()));
}

#[test]
fn ls_rejects_unknown_secret_type() {
    let t = Test::new();
    t.cmd()
        .args(["ls", "kubernetes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown secret type"));
}

#[test]
fn sh_rejects_unknown_format() {
    let t = Test::authenticated();
    let out = t.run(&["sh", "db", "-f", "powershell"]);
    assert!(!out.status.success());
    assert!(stderr_of(&out).contains("Unknown format"));
}

#[test]
fn put_requires_key_value_pairs() {
    // "justakey" has no '=' so nothing valid remains to store.
    let t = Test::authenticated();
    let out = t.run(&["lxc", "put", "130-n8n", "justakey"]);
    assert!(!out.status.success());
    assert!(stderr_of(&out).contains("No valid key=value pairs"));
}

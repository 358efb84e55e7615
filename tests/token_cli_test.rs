//! `vaultctl token` integration tests: check exit codes and renewal.

mod support;

use support::*;

#[test]
fn check_exits_zero_when_ttl_is_healthy() {
    let t = Test::new();
    t.mock_token_lookup(86400, true);

    let out = t.run(&["token", "check"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(stdout_of(&out).contains("TTL healthy"));
}

#[test]
fn check_exits_one_below_the_threshold() {
    let t = Test::new();
    t.mock_token_lookup(600, true);

    let out = t.run(&["token", "check"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stdout_of(&out).contains("Renewal needed"));
}

#[test]
fn check_exits_two_without_authentication() {
    let t = Test::new();

    let out = t
        .cmd_unauthenticated()
        .args(["token", "check"])
        .output()
        .expect("failed to run vaultctl");
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn renew_reports_old_and_new_ttl() {
    let t = Test::new();
    t.mock_token_lookup(600, true);
    t.mock_token_renew(86400);

    let out = t.run(&["token", "renew"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("Token renewed"));
    assert!(stdout.contains("10m"));
    assert!(stdout.contains("1d"));
}

#[test]
fn auto_renew_skips_a_healthy_token() {
    let t = Test::new();
    t.mock_token_lookup(86400, true);

    let out = t.run(&["token", "renew", "--auto"]);
    assert!(out.status.success());
    assert!(stdout_of(&out).contains("skipping"));
    // No renew-self request must have been made.
    assert!(t
        .received_requests()
        .iter()
        .all(|r| !r.url.path().contains("renew-self")));
}

#[test]
fn auto_renew_quiet_is_silent_on_skip() {
    let t = Test::new();
    t.mock_token_lookup(86400, true);

    let out = t.run(&["token", "renew", "--auto", "--quiet"]);
    assert!(out.status.success());
    assert!(stdout_of(&out).is_empty());
}

#[test]
fn renew_refuses_non_renewable_token() {
    let t = Test::new();
    t.mock_token_lookup(600, false);

    let out = t.run(&["token", "renew"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr_of(&out).contains("not renewable"));
    assert!(stdout_of(&out).contains("token create"));
}

#[test]
fn info_shows_accessor_and_policies() {
    let t = Test::new();
    t.mock_token_lookup(86400, true);

    let out = t.run(&["token", "info"]);
    assert!(out.status.success(), "stderr: {}", stderr_of(&out));
    let stdout = stdout_of(&out);
    assert!(stdout.contains("accessor-test"));
    assert!(stdout.contains("Policies"));
    assert!(stdout.contains("Renewable"));
}

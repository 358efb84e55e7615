//! `vaultctl watch` signal handling tests.

#![cfg(unix)]

mod support;

use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::json;
use support::*;

fn wait_with_timeout(child: &mut std::process::Child, timeout: Duration) -> std::process::ExitStatus {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().expect("failed to poll child") {
            return status;
        }
        if Instant::now() > deadline {
            let _ = child.kill();
            let _ = child.wait();
            panic!("watch did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

#[test]
fn sigterm_stops_the_watcher_gracefully() {
    let t = Test::authenticated();
    t.mock_kv_get("lxc/db", json!({ "password": "secret123" }));

    let mut child = t
        .std_cmd()
        .args(["watch", "db", "--interval", "60", "--", "sleep", "300"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn vaultctl");

    // Give the watcher time to fetch the secret and spawn its child.
    std::thread::sleep(Duration::from_secs(3));
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }

    let status = wait_with_timeout(&mut child, Duration::from_secs(15));
    // A clean shutdown, not death by signal.
    assert_eq!(status.code(), Some(0), "status: {status:?}");

    let mut stdout = String::new();
    std::io::Read::read_to_string(child.stdout.as_mut().unwrap(), &mut stdout).unwrap();
    assert!(stdout.contains("Stopped."), "stdout: {stdout}");
}

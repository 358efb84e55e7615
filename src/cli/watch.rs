//! `vaultctl watch`: poll a secret and act on changes.
//!
//! The child runs with the secret injected into its environment; on a
//! content hash change the process is restarted, signalled, or the
//! command is re-executed depending on `--on-change`.

use std::collections::HashMap;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use tracing::debug;

use crate::cli::output;
use crate::config::Settings;
use crate::core::{envfile, secrets, session};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnChange {
    /// Stop the process and start it with the new values.
    Restart,
    /// Send SIGHUP and let the process re-read its environment source.
    Reload,
    /// Run the command once per change instead of keeping it running.
    Exec,
}

pub fn execute(
    settings: &Settings,
    name: &str,
    command: &[String],
    interval: u64,
    on_change: OnChange,
) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let fetch = |client: &crate::core::client::VaultClient| {
        secrets::get_or_empty(client, settings, secrets::SecretKind::Lxc, name)
    };

    let data = fetch(&client)?;
    if data.is_empty() {
        output::error(&format!("Not found or empty: {name}"));
        return Ok(1);
    }
    let mut hash = secrets::content_hash(&data);

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| Error::Other(format!("failed to install signal handler: {e}")))?;
    }

    let mut child = match on_change {
        OnChange::Exec => {
            run_once(command, &data)?;
            None
        }
        _ => Some(spawn(command, &data)?),
    };
    output::step(&format!(
        "Watching {name} every {interval}s (on change: {})",
        match on_change {
            OnChange::Restart => "restart",
            OnChange::Reload => "reload",
            OnChange::Exec => "exec",
        }
    ));

    loop {
        if sleep_interruptible(Duration::from_secs(interval), &shutdown) {
            break;
        }

        // A managed child that died outside our control gets restarted.
        if let Some(c) = child.as_mut() {
            if let Ok(Some(status)) = c.try_wait() {
                output::warn(&format!("Process exited ({status}), restarting."));
                let data = fetch(&client)?;
                child = Some(spawn(command, &data)?);
            }
        }

        let data = match fetch(&client) {
            Ok(d) => d,
            Err(e) => {
                debug!(error = %e, "poll failed, retrying next interval");
                continue;
            }
        };
        let new_hash = secrets::content_hash(&data);
        if new_hash == hash {
            continue;
        }
        hash = new_hash;
        output::step(&format!("{name} changed"));

        match on_change {
            OnChange::Restart => {
                if let Some(c) = child.take() {
                    terminate(c);
                }
                child = Some(spawn(command, &data)?);
            }
            OnChange::Reload => {
                if let Some(c) = child.as_ref() {
                    reload(c);
                }
            }
            OnChange::Exec => {
                run_once(command, &data)?;
            }
        }
    }

    if let Some(c) = child.take() {
        terminate(c);
    }
    output::dimmed("Stopped.");
    Ok(0)
}

/// Sleep in one-second slices so SIGINT/SIGTERM take effect promptly.
/// Returns true when shutdown was requested.
fn sleep_interruptible(total: Duration, shutdown: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    while Instant::now() < deadline {
        if shutdown.load(Ordering::SeqCst) {
            return true;
        }
        std::thread::sleep(Duration::from_secs(1).min(deadline - Instant::now()));
    }
    shutdown.load(Ordering::SeqCst)
}

fn spawn(command: &[String], data: &HashMap<String, String>) -> Result<Child> {
    let mut cmd = Command::new(&command[0]);
    cmd.args(&command[1..]).envs(&envfile::to_env_keys(data));
    cmd.spawn()
        .map_err(|e| Error::Other(format!("failed to run {}: {e}", command[0])))
}

fn run_once(command: &[String], data: &HashMap<String, String>) -> Result<()> {
    let status = Command::new(&command[0])
        .args(&command[1..])
        .envs(&envfile::to_env_keys(data))
        .status()
        .map_err(|e| Error::Other(format!("failed to run {}: {e}", command[0])))?;
    if !status.success() {
        output::warn(&format!("Command exited with {status}"));
    }
    Ok(())
}

/// Graceful stop: SIGTERM, a grace period, then SIGKILL.
#[cfg(unix)]
fn terminate(mut child: Child) {
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn terminate(mut child: Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn reload(child: &Child) {
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGHUP);
    }
}

// Without SIGHUP the best available reload is nothing; the next restart
// picks up the change.
#[cfg(not(unix))]
fn reload(_child: &Child) {
    output::warn("Reload is not supported on this platform.");
}

//! Wrapper around the 1Password CLI (`op`).
//!
//! Used to stash and retrieve the Vault root/admin token so it never has to
//! live in a shell history or plaintext file.

use std::process::{Command, Stdio};

use tracing::debug;

use crate::config::Settings;
use crate::error::{AuthError, Error, Result};

pub fn is_installed() -> bool {
    which::which("op").is_ok()
}

/// Whether the current shell session has an active `op` sign-in.
pub fn is_signed_in() -> bool {
    Command::new("op")
        .args(["whoami"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn ensure_usable() -> Result<()> {
    if !is_installed() {
        return Err(AuthError::OnePasswordNotInstalled.into());
    }
    if !is_signed_in() {
        return Err(AuthError::OnePasswordNotSignedIn.into());
    }
    Ok(())
}

/// Read a single field via the `op://vault/item/field` reference syntax.
pub fn read_field(vault: &str, item: &str, field: &str) -> Result<String> {
    ensure_usable()?;
    let reference = format!("op://{vault}/{item}/{field}");
    debug!(%reference, "reading from 1Password");
    let output = Command::new("op").args(["read", &reference]).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("isn't an item") || stderr.contains("not found") {
            return Err(AuthError::OnePasswordMissing.into());
        }
        return Err(Error::Other(format!("op read failed: {}", stderr.trim())));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Fetch the Vault token from the configured 1Password item.
pub fn get_vault_token(settings: &Settings) -> Result<String> {
    let token = read_field(&settings.op_vault, &settings.op_item, &settings.op_field)?;
    if token.is_empty() {
        return Err(AuthError::OnePasswordMissing.into());
    }
    Ok(token)
}

fn item_exists(vault: &str, item: &str) -> bool {
    Command::new("op")
        .args(["item", "get", item, "--vault", vault])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Store the Vault token, creating or updating the configured item.
pub fn save_vault_token(settings: &Settings, token: &str) -> Result<()> {
    ensure_usable()?;
    let assignment = format!("{}[password]={token}", settings.op_field);
    let output = if item_exists(&settings.op_vault, &settings.op_item) {
        debug!(item = %settings.op_item, "updating 1Password item");
        Command::new("op")
            .args([
                "item",
                "edit",
                &settings.op_item,
                "--vault",
                &settings.op_vault,
                &assignment,
            ])
            .stdout(Stdio::null())
            .output()?
    } else {
        debug!(item = %settings.op_item, "creating 1Password item");
        Command::new("op")
            .args([
                "item",
                "create",
                "--category",
                "API Credential",
                "--title",
                &settings.op_item,
                "--vault",
                &settings.op_vault,
                &assignment,
            ])
            .stdout(Stdio::null())
            .output()?
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Other(format!("op item write failed: {}", stderr.trim())));
    }
    Ok(())
}

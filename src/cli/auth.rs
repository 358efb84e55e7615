//! `vaultctl auth` commands.

use crate::cli::output;
use crate::cli::AuthCommands;
use crate::config::Settings;
use crate::core::client::{TokenInfo, VaultClient};
use crate::core::util::format_duration;
use crate::core::{onepassword, session};
use crate::error::{AuthError, Result};

pub fn execute(settings: &Settings, cmd: AuthCommands) -> Result<i32> {
    match cmd {
        AuthCommands::Login { token, force } => login(settings, token, force),
        AuthCommands::Logout => logout(),
        AuthCommands::Status => status(settings),
        AuthCommands::Whoami => whoami(settings),
    }
}

fn login(settings: &Settings, token: Option<String>, force: bool) -> Result<i32> {
    if !force {
        if let Ok(client) = session::authenticated_client(settings) {
            output::success("Already authenticated.");
            show_token_info(&client.token_lookup()?, settings);
            return Ok(0);
        }
    }

    let vault_token = match token {
        Some(t) => {
            output::dimmed("Using provided token");
            t
        }
        None => {
            output::dimmed("Loading token from 1Password...");
            match onepassword::get_vault_token(settings) {
                Ok(t) => t,
                Err(e) => {
                    if matches!(
                        e,
                        crate::error::Error::Auth(AuthError::OnePasswordMissing)
                    ) {
                        output::error("Token not found in 1Password.");
                        output::hint(&format!("Vault: {}", settings.op_vault));
                        output::hint(&format!("Item: {}", settings.op_item));
                        output::hint(&format!("Field: {}", settings.op_field));
                    }
                    return Err(e);
                }
            }
        }
    };

    let client = VaultClient::new(settings, Some(vault_token.clone()))?;
    let info = client.token_lookup()?;
    output::success("Vault authentication complete");
    show_token_info(&info, settings);
    session::cache_token(&vault_token);
    Ok(0)
}

fn logout() -> Result<i32> {
    session::clear_cached_token()?;
    output::success("Logged out");
    Ok(0)
}

fn status(settings: &Settings) -> Result<i32> {
    let client = VaultClient::new(settings, None)?;
    let health = client.health();

    if !health.initialized {
        output::error("Vault server is not initialized or unreachable.");
        return Ok(1);
    }
    if health.sealed {
        output::error("Vault server is sealed.");
        return Ok(1);
    }
    output::success(&format!("Vault server: {}", settings.vault_addr));

    match session::authenticated_client(settings) {
        Ok(client) => {
            output::success("Authenticated");
            show_token_info(&client.token_lookup()?, settings);
            Ok(0)
        }
        Err(_) => {
            output::warn("Not authenticated");
            output::hint("Run: vaultctl auth login");
            Ok(0)
        }
    }
}

fn whoami(settings: &Settings) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    show_token_info(&client.token_lookup()?, settings);
    Ok(0)
}

pub(crate) fn show_token_info(info: &TokenInfo, settings: &Settings) {
    output::section("Token");
    let display_name = if info.display_name.is_empty() {
        "-"
    } else {
        &info.display_name
    };
    output::kv("Display Name", display_name);
    output::kv("Policies", &info.policies.join(", "));
    if info.ttl == 0 {
        output::kv("TTL", "unlimited");
    } else if info.ttl < settings.token_renew_threshold {
        output::kv(
            "TTL",
            &format!("{} (renewal recommended)", format_duration(info.ttl as i64)),
        );
    } else {
        output::kv("TTL", &format_duration(info.ttl as i64));
    }
    output::kv("Renewable", if info.renewable { "yes" } else { "no" });
    if let Some(creation) = info.creation_time {
        output::kv("Creation Time", &crate::core::util::format_timestamp(creation));
    }
}

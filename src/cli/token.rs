//! `vaultctl token` commands.
//!
//! `renew --auto` and `check` are the workhorses of the systemd timer: the
//! timer calls renew with `--auto --quiet` so the unit stays silent while
//! the TTL is healthy.

use console::style;

use crate::cli::output;
use crate::cli::TokenCommands;
use crate::config::Settings;
use crate::core::util::format_duration;
use crate::core::{onepassword, session};
use crate::error::Result;

pub fn execute(settings: &Settings, cmd: TokenCommands) -> Result<i32> {
    match cmd {
        TokenCommands::Info => info(settings),
        TokenCommands::Renew {
            increment,
            auto,
            threshold,
            quiet,
        } => renew(settings, increment, auto, threshold, quiet),
        TokenCommands::Create {
            policies,
            ttl,
            name,
            save_to_op,
        } => create(settings, &policies, ttl.as_deref(), name.as_deref(), save_to_op),
        TokenCommands::Check => check(settings),
    }
}

fn info(settings: &Settings) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let info = client.token_lookup()?;

    output::section("Token");
    output::kv("Accessor", &info.accessor);
    let display_name = if info.display_name.is_empty() {
        "-"
    } else {
        &info.display_name
    };
    output::kv("Display Name", display_name);
    output::kv("Policies", &info.policies.join(", "));
    if info.ttl == 0 {
        output::kv("TTL", "unlimited");
    } else {
        output::kv("TTL", &format_duration(info.ttl as i64));
    }
    if info.explicit_max_ttl > 0 {
        output::kv("Max TTL", &format_duration(info.explicit_max_ttl as i64));
    }
    output::kv("Renewable", if info.renewable { "yes" } else { "no" });
    output::kv("Orphan", if info.orphan { "yes" } else { "no" });
    if let Some(creation) = info.creation_time {
        output::kv("Creation Time", &crate::core::util::format_timestamp(creation));
    }
    if let Some(issue) = &info.issue_time {
        output::kv("Issue Time", issue);
    }
    if let Some(expire) = &info.expire_time {
        output::kv("Expire Time", expire);
    }
    if info.num_uses != 0 {
        output::kv("Uses Left", &info.num_uses.to_string());
    }
    if let Some(meta) = &info.meta {
        for (key, value) in meta {
            output::kv(&format!("meta.{key}"), value);
        }
    }

    if info.ttl > 0 && info.ttl < settings.token_renew_threshold {
        output::warn("TTL is below the renewal threshold.");
        output::hint("Run: vaultctl token renew");
    }
    Ok(0)
}

fn renew(
    settings: &Settings,
    increment: Option<u64>,
    auto: bool,
    threshold: Option<u64>,
    quiet: bool,
) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let info = client.token_lookup()?;

    if info.ttl == 0 {
        if !quiet {
            output::success("Token has no expiry, nothing to renew.");
        }
        return Ok(0);
    }

    if auto {
        let threshold = threshold.unwrap_or(settings.token_renew_threshold);
        if info.ttl >= threshold {
            if !quiet {
                output::dimmed(&format!(
                    "TTL {} is above the {} threshold, skipping.",
                    format_duration(info.ttl as i64),
                    format_duration(threshold as i64)
                ));
            }
            return Ok(0);
        }
        if !info.renewable {
            // The timer must not flap on a non-renewable token.
            if !quiet {
                output::warn("Token is not renewable.");
            }
            return Ok(0);
        }
    } else if !info.renewable {
        output::error("Token is not renewable.");
        output::hint("Create a renewable one: vaultctl token create");
        return Ok(1);
    }

    let increment = increment.or(Some(settings.token_renew_increment));
    let auth = client.token_renew(increment)?;
    if !quiet {
        output::success(&format!(
            "Token renewed: {} -> {}",
            format_duration(info.ttl as i64),
            format_duration(auth.lease_duration as i64)
        ));
    }
    Ok(0)
}

fn create(
    settings: &Settings,
    policies: &[String],
    ttl: Option<&str>,
    name: Option<&str>,
    save_to_op: bool,
) -> Result<i32> {
    let client = session::authenticated_client(settings)?;
    let auth = client.token_create(policies, ttl, name)?;

    output::success("Token created");
    output::kv("Policies", &auth.policies.join(", "));
    if auth.lease_duration == 0 {
        output::kv("TTL", "unlimited");
    } else {
        output::kv("TTL", &format_duration(auth.lease_duration as i64));
    }
    output::kv("Renewable", if auth.renewable { "yes" } else { "no" });

    let rule = style("━".repeat(60)).dim();
    println!("{rule}");
    println!("{}", auth.client_token);
    println!("{rule}");

    if save_to_op {
        onepassword::save_vault_token(settings, &auth.client_token)?;
        output::success(&format!(
            "Saved to 1Password ({}/{})",
            settings.op_vault, settings.op_item
        ));
    } else {
        output::warn("Save this token now, it will not be shown again.");
    }
    Ok(0)
}

/// Exit 0 when the TTL is healthy, 1 when renewal is needed, 2 on lookup
/// failure. Meant for scripts and health checks.
fn check(settings: &Settings) -> Result<i32> {
    let client = match session::authenticated_client(settings) {
        Ok(c) => c,
        Err(_) => {
            output::error("Not authenticated.");
            return Ok(2);
        }
    };
    let info = match client.token_lookup() {
        Ok(i) => i,
        Err(_) => {
            output::error("Token lookup failed.");
            return Ok(2);
        }
    };

    if info.ttl == 0 {
        output::success("Token has no expiry.");
        return Ok(0);
    }
    if info.ttl < settings.token_renew_threshold {
        output::warn(&format!(
            "Renewal needed: TTL {} is below the {} threshold.",
            format_duration(info.ttl as i64),
            format_duration(settings.token_renew_threshold as i64)
        ));
        return Ok(1);
    }
    output::success(&format!("TTL healthy: {}", format_duration(info.ttl as i64)));
    Ok(0)
}

//! vaultctl - HashiCorp Vault CLI for LXC and Docker secret distribution.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vaultctl::cli::{execute, output, Cli};
use vaultctl::error::{AuthError, Error};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env("VAULTCTL_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("vaultctl=debug")
        } else {
            EnvFilter::new("vaultctl=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time())
        .init();

    match execute(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let suggestion = match &e {
                Error::Auth(AuthError::NotAuthenticated) => Some("run: vaultctl auth login"),
                Error::Auth(AuthError::OnePasswordNotInstalled) => {
                    Some("install the 1Password CLI: https://developer.1password.com/docs/cli")
                }
                Error::Auth(AuthError::OnePasswordNotSignedIn) => Some("run: op signin"),
                _ => None,
            };

            output::error(&e.to_string());
            if let Some(hint) = suggestion {
                output::error_hint(hint);
            }
            let code = match &e {
                Error::Subprocess { code, .. } => *code,
                _ => 1,
            };
            std::process::exit(code);
        }
    }
}

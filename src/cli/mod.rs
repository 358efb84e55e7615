//! Command-line interface: argument definitions and dispatch.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::config::Settings;
use crate::error::Result;

pub mod auth;
pub mod completions;
pub mod compose;
pub mod docker;
pub mod inject;
pub mod output;
pub mod repo;
pub mod secrets;
pub mod setup;
pub mod token;
pub mod watch;

#[derive(Parser)]
#[command(
    name = "vaultctl",
    version,
    about = "HashiCorp Vault CLI for LXC and Docker secret distribution",
    long_about = "Centralize LXC container credentials and Docker environment \
variables in HashiCorp Vault.\n\n\
Getting started:\n    \
vaultctl auth login       # load token from 1Password\n    \
vaultctl lxc list         # list registered LXC entries\n    \
vaultctl lxc pass 130-n8n # copy a password to the clipboard\n    \
vaultctl docker env n8n   # write a .env file from Vault"
)]
pub struct Cli {
    /// Vault server address
    #[arg(long, global = true, env = "VAULT_ADDR")]
    pub vault_addr: Option<String>,

    /// Vault token
    #[arg(long, global = true, env = "VAULT_TOKEN", hide_env_values = true)]
    pub vault_token: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Authentication management
    #[command(subcommand)]
    Auth(AuthCommands),

    /// LXC container credential management
    #[command(subcommand)]
    Lxc(SecretCommands),

    /// Docker environment variable management
    #[command(subcommand)]
    Docker(DockerCommands),

    /// Token management
    #[command(subcommand)]
    Token(TokenCommands),

    /// Docker Compose integration
    #[command(subcommand)]
    Compose(ComposeCommands),

    /// APT repository management
    #[command(subcommand)]
    Repo(RepoCommands),

    /// Initial setup and systemd management
    #[command(subcommand)]
    Setup(SetupCommands),

    /// Run a command with secrets injected into its environment
    Run {
        /// Secret name (e.g. lxc-161)
        name: String,
        /// Command to run
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
        /// Start from a clean environment (keeps PATH, HOME, USER, SHELL, TERM)
        #[arg(long, short = 'r')]
        reset: bool,
        /// Run the command through a shell
        #[arg(long, short = 's')]
        shell: bool,
    },

    /// Print shell export statements for eval
    Sh {
        /// Secret name
        name: String,
        /// Output format: bash, zsh, fish
        #[arg(long, short = 'f', default_value = "bash")]
        format: String,
    },

    /// Scan files for hardcoded secret values
    Scan {
        /// Path to scan
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Limit to one secret
        #[arg(long, short = 'n')]
        name: Option<String>,
        /// Exit non-zero when findings exist (for CI)
        #[arg(long)]
        error_if_found: bool,
        /// JSON output
        #[arg(long)]
        json: bool,
        /// Directories or files to skip
        #[arg(
            long,
            short = 'e',
            default_values_t = [".git", "node_modules", "__pycache__", ".venv", "venv", ".env", "target"]
                .map(String::from)
        )]
        exclude: Vec<String>,
    },

    /// Mask secret values in a log stream
    Redact {
        /// Input file (stdin when omitted)
        #[arg(long = "in", short = 'i')]
        input: Option<PathBuf>,
        /// Output file (stdout when omitted)
        #[arg(long = "out", short = 'o')]
        output: Option<PathBuf>,
        /// Limit to one secret
        #[arg(long, short = 'n')]
        name: Option<String>,
        /// Replacement string
        #[arg(long, short = 'm', default_value = "***REDACTED***")]
        mask: String,
    },

    /// Watch a secret and restart a process when it changes
    Watch {
        /// Secret name to watch
        name: String,
        /// Command to run
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
        /// Poll interval in seconds
        #[arg(long, short = 'i', default_value_t = 60)]
        interval: u64,
        /// Action on change: restart, reload, exec
        #[arg(long, default_value = "restart")]
        on_change: watch::OnChange,
    },

    /// Show the effective configuration
    Config,

    /// Shortcut: list secrets (lxc or docker)
    Ls {
        /// Type: lxc or docker
        #[arg(default_value = "lxc")]
        kind: String,
    },

    /// Shortcut: show a secret
    Get {
        /// Secret name
        name: String,
        /// Type: lxc or docker
        #[arg(long, short = 't', default_value = "lxc")]
        kind: String,
    },

    /// Shortcut: copy a password to the clipboard
    Pass {
        /// LXC name
        name: String,
        /// Password field name
        #[arg(long, short = 'f', default_value = "root_password")]
        field: String,
    },

    /// Shortcut: write a .env file from a Docker secret
    Env {
        /// Service name
        name: String,
        /// Output file
        #[arg(long, short = 'o', default_value = ".env")]
        output: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Authenticate against Vault (loads the token from 1Password by default)
    Login {
        /// Vault token (skips 1Password)
        #[arg(long, short = 't')]
        token: Option<String>,
        /// Re-authenticate even when a valid session exists
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Drop the cached token
    Logout,
    /// Show server and authentication status
    Status,
    /// Show current token identity
    Whoami,
}

#[derive(Subcommand)]
pub enum SecretCommands {
    /// List registered entries
    List {
        /// Include ip and notes fields
        #[arg(long, short = 'v')]
        verbose: bool,
    },
    /// Show an entry
    Get {
        name: String,
        /// Show a single field
        #[arg(long, short = 'f')]
        field: Option<String>,
        /// Copy the value to the clipboard
        #[arg(long, short = 'c')]
        copy: bool,
        /// Print the value only (for scripts)
        #[arg(long)]
        raw: bool,
    },
    /// Store key=value pairs
    Put {
        name: String,
        /// key=value pairs
        #[arg(required = true)]
        data: Vec<String>,
        /// Replace instead of merging with existing data
        #[arg(long)]
        replace: bool,
    },
    /// Delete an entry
    Delete {
        name: String,
        /// Skip confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Copy a password field to the clipboard
    Pass {
        name: String,
        #[arg(long, short = 'f', default_value = "root_password")]
        field: String,
    },
    /// Bulk-import entries from a JSON file
    Import {
        file: PathBuf,
        /// Validate without writing
        #[arg(long, short = 'n')]
        dry_run: bool,
    },
    /// Export all entries as JSON
    Export {
        /// Output file (stdout when omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DockerCommands {
    /// List registered services
    List,
    /// Show a service's variables
    Get {
        name: String,
        #[arg(long)]
        raw: bool,
    },
    /// Store KEY=value pairs
    Put {
        name: String,
        #[arg(required = true)]
        data: Vec<String>,
        #[arg(long)]
        replace: bool,
    },
    /// Delete a service's variables
    Delete {
        name: String,
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Write a .env file from Vault
    Env {
        name: String,
        #[arg(long, short = 'o', default_value = ".env")]
        output: PathBuf,
        /// Print to stdout instead
        #[arg(long)]
        stdout: bool,
    },
    /// Store an existing .env file in Vault
    ImportEnv {
        name: String,
        #[arg(long, short = 'f', default_value = ".env")]
        file: PathBuf,
        #[arg(long)]
        replace: bool,
    },
    /// Write the .env file and run docker-compose
    Compose {
        name: String,
        /// docker-compose arguments
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
        #[arg(long, short = 'e', default_value = ".env")]
        env_file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Show token details
    Info,
    /// Renew the current token
    Renew {
        /// Renewal increment in seconds
        #[arg(long, short = 'i')]
        increment: Option<u64>,
        /// Only renew when TTL is below the threshold (for timers)
        #[arg(long)]
        auto: bool,
        /// Renewal threshold in seconds (with --auto)
        #[arg(long)]
        threshold: Option<u64>,
        /// Minimal output
        #[arg(long, short = 'q')]
        quiet: bool,
    },
    /// Create a new token
    Create {
        /// Policies to attach
        #[arg(long = "policy", short = 'p', default_values_t = ["admin".to_string()])]
        policies: Vec<String>,
        /// TTL (e.g. 24h, 7d; 0 = unlimited)
        #[arg(long, short = 't')]
        ttl: Option<String>,
        /// Display name
        #[arg(long, short = 'n')]
        name: Option<String>,
        /// Store the new token in 1Password
        #[arg(long = "save-to-1password")]
        save_to_op: bool,
    },
    /// Check whether renewal is needed (exit 1 when it is)
    Check,
}

#[derive(Subcommand)]
pub enum ComposeCommands {
    /// Wire a compose project up to a Vault secret
    Init {
        /// Vault secret name
        name: Option<String>,
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
        /// Services to update (comma-separated)
        #[arg(long, short = 's')]
        services: Option<String>,
        /// Generate a ctl.sh management script
        #[arg(long)]
        script: bool,
        /// Skip the compose file backup
        #[arg(long)]
        no_backup: bool,
        /// Skip confirmations
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Sync secrets and start containers
    Up {
        name: Option<String>,
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Pull images first
        #[arg(long, short = 'p')]
        pull: bool,
        /// Build images
        #[arg(long, short = 'b')]
        build: bool,
        /// Prune old images afterwards
        #[arg(long)]
        prune: bool,
        /// Stay in the foreground
        #[arg(long = "no-detach")]
        no_detach: bool,
    },
    /// Stop containers
    Down {
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
        /// Remove volumes too
        #[arg(long, short = 'V')]
        volumes: bool,
        #[arg(long)]
        remove_orphans: bool,
    },
    /// Sync secrets and restart containers
    Restart {
        name: Option<String>,
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        #[arg(long, short = 'p')]
        pull: bool,
    },
    /// Pull container images
    Pull {
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
    /// Show container logs
    Logs {
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
        #[arg(long)]
        follow: bool,
        #[arg(long, short = 'n')]
        tail: Option<u32>,
        #[arg(long, short = 's')]
        service: Option<String>,
    },
    /// Show container and secret status
    Status {
        /// Vault secret name (enables sync check)
        name: Option<String>,
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
    /// Clean up unused Docker resources
    Prune {
        /// Remove all unused images
        #[arg(long, short = 'a')]
        all: bool,
        /// Remove unused volumes
        #[arg(long, short = 'V')]
        volumes: bool,
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Sync secrets without restarting containers
    Sync {
        name: String,
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RepoCommands {
    /// Add a .deb package to the repository
    Add {
        deb_file: PathBuf,
        #[arg(long, short = 'c')]
        codename: Option<String>,
    },
    /// Remove a package
    Remove {
        package: String,
        #[arg(long, short = 'c')]
        codename: Option<String>,
    },
    /// List published packages
    List {
        #[arg(long, short = 'c')]
        codename: Option<String>,
    },
    /// Show repository information
    Info,
    /// Regenerate repository metadata
    Export,
    /// Check repository integrity
    Check,
    /// Delete unreferenced files
    Clean,
    /// Sync the latest GitHub release into the repository
    Sync {
        /// Check for updates only
        #[arg(long, short = 'c')]
        check: bool,
        /// Deploy even when the version already exists
        #[arg(long, short = 'f')]
        force: bool,
        /// Package name (defaults to the GitHub repo name)
        #[arg(long, short = 'p')]
        package: Option<String>,
    },
    /// Show or change repository settings
    Config {
        /// Set the GitHub repository (owner/repo)
        #[arg(long, short = 'g')]
        github_repo: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SetupCommands {
    /// Interactive first-time setup wizard
    Init {
        #[arg(long, short = 'a')]
        vault_addr: Option<String>,
        /// Use AppRole authentication
        #[arg(long)]
        approle: bool,
        /// Use direct token authentication
        #[arg(long)]
        token: bool,
        /// Configure the systemd renewal timer
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        timer: bool,
    },
    /// Create the Vault policy and AppRole (admin)
    Vault {
        /// Only generate a new Secret ID for the existing AppRole
        #[arg(long, short = 'g')]
        generate_secret: bool,
    },
    /// Build an APT repository server
    AptServer {
        /// Reconfigure an existing installation
        #[arg(long, short = 'r')]
        reconfigure: bool,
    },
    /// Point this machine's APT at a repository
    AptClient {
        /// Repository URL
        url: String,
        #[arg(long, short = 'u')]
        user: Option<String>,
        #[arg(long, short = 'p')]
        password: Option<String>,
        #[arg(long, short = 'c', default_value = "stable")]
        codename: String,
        /// Remove the APT source instead
        #[arg(long, short = 'r')]
        remove: bool,
    },
    /// Manage the renewal timer units
    Systemd {
        /// Enable the timer
        #[arg(long, overrides_with = "disable")]
        enable: bool,
        /// Disable the timer
        #[arg(long)]
        disable: bool,
        /// Show timer status
        #[arg(long, short = 's')]
        status: bool,
    },
    /// Show or edit /etc/vaultctl/config
    Config {
        /// Open the file in $EDITOR
        #[arg(long, short = 'e')]
        edit: bool,
    },
    /// Test connection, authentication, and KV access
    Test,
}

/// Dispatch a parsed command line. Returns the process exit code.
pub fn execute(cli: Cli) -> Result<i32> {
    let mut settings = Settings::load();
    if let Some(addr) = &cli.vault_addr {
        settings.vault_addr = addr.clone();
    }
    if let Some(token) = &cli.vault_token {
        settings.vault_token = Some(token.clone());
    }

    match cli.command {
        Commands::Auth(cmd) => auth::execute(&settings, cmd),
        Commands::Lxc(cmd) => secrets::execute(&settings, crate::core::secrets::SecretKind::Lxc, cmd),
        Commands::Docker(cmd) => docker::execute(&settings, cmd),
        Commands::Token(cmd) => token::execute(&settings, cmd),
        Commands::Compose(cmd) => compose::execute(&settings, cmd),
        Commands::Repo(cmd) => repo::execute(cmd),
        Commands::Setup(cmd) => setup::execute(&settings, cmd),
        Commands::Run {
            name,
            command,
            reset,
            shell,
        } => inject::run(&settings, &name, &command, reset, shell),
        Commands::Sh { name, format } => inject::shell_export(&settings, &name, &format),
        Commands::Scan {
            path,
            name,
            error_if_found,
            json,
            exclude,
        } => inject::scan(&settings, &path, name.as_deref(), error_if_found, json, &exclude),
        Commands::Redact {
            input,
            output,
            name,
            mask,
        } => inject::redact(&settings, input.as_deref(), output.as_deref(), name.as_deref(), &mask),
        Commands::Watch {
            name,
            command,
            interval,
            on_change,
        } => watch::execute(&settings, &name, &command, interval, on_change),
        Commands::Config => {
            show_config(&settings);
            Ok(0)
        }
        Commands::Ls { kind } => secrets::quick_list(&settings, &kind),
        Commands::Get { name, kind } => secrets::quick_get(&settings, &name, &kind),
        Commands::Pass { name, field } => {
            secrets::copy_password(&settings, crate::core::secrets::SecretKind::Lxc, &name, &field)
        }
        Commands::Env { name, output } => docker::generate_env(&settings, &name, &output, false),
        Commands::Completions { shell } => completions::execute(shell),
    }
}

fn show_config(settings: &Settings) {
    output::section("Current Settings");
    let rows = [
        ("Vault address", settings.vault_addr.clone(), "VAULTCTL_VAULT_ADDR"),
        ("KV mount", settings.kv_mount.clone(), "VAULTCTL_KV_MOUNT"),
        ("LXC path", settings.kv_lxc_path.clone(), "VAULTCTL_KV_LXC_PATH"),
        ("Docker path", settings.kv_docker_path.clone(), "VAULTCTL_KV_DOCKER_PATH"),
        ("1Password vault", settings.op_vault.clone(), "VAULTCTL_OP_VAULT"),
        ("1Password item", settings.op_item.clone(), "VAULTCTL_OP_ITEM"),
        (
            "Renew threshold",
            format!("{}s", settings.token_renew_threshold),
            "VAULTCTL_TOKEN_RENEW_THRESHOLD",
        ),
    ];
    for (name, value, env) in rows {
        println!("  {name:<18} {value:<40} {env}");
    }
    if let Some(dir) = Settings::config_dir() {
        println!("\nConfig directory: {}", dir.display());
    }
    if let Some(dir) = Settings::cache_dir() {
        println!("Cache directory: {}", dir.display());
    }
}

//! `vaultctl setup` commands: first-run wizard, Vault-side provisioning,
//! APT server/client installation, and the systemd renewal timer.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use serde_json::json;

use crate::cli::output;
use crate::cli::SetupCommands;
use crate::config::{Settings, SYSTEM_CONFIG_FILE};
use crate::core::client::VaultClient;
use crate::core::repo::{self, RepoConfig};
use crate::core::{session, templates};
use crate::error::{Error, Result};

pub fn execute(settings: &Settings, cmd: SetupCommands) -> Result<i32> {
    match cmd {
        SetupCommands::Init {
            vault_addr,
            approle,
            token,
            timer,
        } => init(settings, vault_addr, approle, token, timer),
        SetupCommands::Vault { generate_secret } => vault_setup(settings, generate_secret),
        SetupCommands::AptServer { reconfigure } => apt_server(reconfigure),
        SetupCommands::AptClient {
            url,
            user,
            password,
            codename,
            remove,
        } => apt_client(&url, user, password, &codename, remove),
        SetupCommands::Systemd {
            enable,
            disable,
            status,
        } => systemd(enable, disable, status),
        SetupCommands::Config { edit } => config(edit),
        SetupCommands::Test => test(settings),
    }
}

#[cfg(unix)]
fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}

fn require_root(command: &str) -> Result<()> {
    if is_root() {
        Ok(())
    } else {
        output::error("Root privilege required.");
        output::hint(&format!("Run: sudo vaultctl {command}"));
        Err(Error::Other("root privilege required".to_string()))
    }
}

fn run_checked(program: &str, args: &[&str]) -> Result<()> {
    let status = Command::new(program).args(args).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(Error::Subprocess {
            command: format!("{program} {}", args.join(" ")),
            code: status.code().unwrap_or(1),
        })
    }
}

fn run_quiet(program: &str, args: &[&str]) -> Result<std::process::Output> {
    Ok(Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()?)
}

fn write_private(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn prompt_text(prompt: &str, default: Option<&str>) -> Result<String> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_string());
    }
    input.interact_text().map_err(|e| Error::Other(e.to_string()))
}

fn prompt_password(prompt: &str) -> Result<String> {
    Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| Error::Other(e.to_string()))
}

fn confirm(prompt: &str, default: bool) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| Error::Other(e.to_string()))
}

// ── setup init ──────────────────────────────────────────────────────────

fn init(
    settings: &Settings,
    vault_addr: Option<String>,
    use_approle: bool,
    use_token: bool,
    timer: bool,
) -> Result<i32> {
    output::section("vaultctl Initial Setup");
    println!("Configures the Vault connection, authentication, and the renewal timer.\n");

    let vault_addr = match vault_addr {
        Some(a) => a,
        None => prompt_text("Vault server address", Some(&settings.vault_addr))?,
    };

    output::dimmed(&format!("Testing connection: {vault_addr}"));
    let mut probe_settings = settings.clone();
    probe_settings.vault_addr = vault_addr.clone();
    let client = VaultClient::new(&probe_settings, None)?;
    let health = client.health();
    if !health.initialized {
        output::error("Cannot connect to Vault server or it is not initialized.");
        return Ok(1);
    }
    if health.sealed {
        output::error("Vault server is sealed.");
        return Ok(1);
    }
    output::success("Connection successful");

    let use_approle = if use_approle || use_token {
        use_approle
    } else {
        let choice = Select::new()
            .with_prompt("Authentication method")
            .items(&[
                "AppRole (recommended, auto-renews on expiry)",
                "Token (manual renewal required)",
            ])
            .default(0)
            .interact()
            .map_err(|e| Error::Other(e.to_string()))?;
        choice == 0
    };

    let mut vault_token = None;
    let mut role_id = None;
    let mut secret_id = None;

    if use_approle {
        output::section("AppRole Authentication");
        output::dimmed("Enter the Role ID and Secret ID from your Vault administrator.");
        let rid = prompt_text("Role ID", None)?;
        let sid = prompt_password("Secret ID")?;

        output::dimmed("Testing AppRole authentication...");
        let auth = client.approle_login(&rid, &sid, &settings.approle_mount)?;
        output::success("AppRole authentication successful");
        output::kv("Policies", &auth.policies.join(", "));
        output::kv(
            "TTL",
            &crate::core::util::format_duration(auth.lease_duration as i64),
        );
        role_id = Some(rid);
        secret_id = Some(sid);
    } else {
        let token = prompt_password("Vault token")?;
        probe_settings.vault_token = Some(token.clone());
        let check = VaultClient::new(&probe_settings, Some(token.clone()))?;
        let info = check.token_lookup()?;
        output::success("Token validation successful");
        output::kv("Policies", &info.policies.join(", "));
        if info.ttl == 0 {
            output::kv("TTL", "unlimited");
        } else {
            output::kv("TTL", &crate::core::util::format_duration(info.ttl as i64));
            if info.ttl < 86400 {
                output::warn("TTL is short. Consider using AppRole.");
            }
        }
        vault_token = Some(token);
    }

    // Config file needs root; print manual instructions otherwise.
    let config_path = Path::new(SYSTEM_CONFIG_FILE);
    let write_config = if config_path.exists() {
        confirm(&format!("{SYSTEM_CONFIG_FILE} already exists. Overwrite?"), false)?
    } else {
        true
    };
    if write_config {
        if is_root() {
            let contents = templates::vaultctl_config(
                &vault_addr,
                vault_token.as_deref(),
                role_id.as_deref(),
                secret_id.as_deref(),
            );
            write_private(config_path, &contents)?;
            output::success(&format!("Config file created: {SYSTEM_CONFIG_FILE}"));
        } else {
            output::warn("Root privilege required to write the config file.");
            output::hint(&format!("sudo vaultctl setup init -a {vault_addr}"));
        }
    } else {
        output::dimmed("Keeping existing config.");
    }

    if timer {
        if is_root() {
            if confirm("Enable the auto-renewal timer?", true)? {
                install_timer_units()?;
                enable_timer()?;
            }
        } else {
            output::warn("Root privilege required for the systemd timer.");
            output::hint("sudo vaultctl setup systemd --enable");
        }
    }

    output::success("Setup complete.");
    output::hint("vaultctl auth status    # check authentication");
    output::hint("vaultctl lxc list       # list LXC entries");
    Ok(0)
}

// ── setup vault (admin) ─────────────────────────────────────────────────

const ROLE_NAME: &str = "vaultctl";
const POLICY_NAME: &str = "vaultctl";

fn vault_setup(settings: &Settings, generate_secret: bool) -> Result<i32> {
    let vault_addr = prompt_text("Vault server address", Some(&settings.vault_addr))?;
    let admin_token = prompt_password("Root/Admin token")?;

    let mut admin_settings = settings.clone();
    admin_settings.vault_addr = vault_addr;
    let client = VaultClient::new(&admin_settings, Some(admin_token))?;

    output::dimmed("Testing connection...");
    client.token_lookup()?;
    output::success("Connected");

    if generate_secret {
        if client
            .approle_read_role(&settings.approle_mount, ROLE_NAME)
            .is_err()
        {
            output::error(&format!(
                "AppRole '{ROLE_NAME}' not found. Run without -g to create it."
            ));
            return Ok(1);
        }
        let role_id = client.approle_role_id(&settings.approle_mount, ROLE_NAME)?;
        let secret_id = client.approle_secret_id(&settings.approle_mount, ROLE_NAME)?;
        print_credentials(&role_id, &secret_id, None);
        return Ok(0);
    }

    output::section("KV Path Configuration");
    output::dimmed("Determines where secrets are stored and what the policy allows.");
    let kv_mount = prompt_text("KV engine mount", Some(&settings.kv_mount))?;
    let kv_path = prompt_text("Secret base path", Some(&settings.kv_lxc_path))?;
    let kv_path = kv_path.trim_matches('/').to_string();
    // The policy covers the whole first path component.
    let policy_path = kv_path.split('/').next().unwrap_or(&kv_path).to_string();

    output::section("1. KV Secrets Engine");
    match client.sys_mounts() {
        Ok(mounts) => {
            if mounts.get(format!("{kv_mount}/")).is_some() {
                output::success(&format!("Exists: {kv_mount}/"));
            } else {
                output::warn(&format!("KV engine '{kv_mount}' not found."));
                output::hint(&format!("Enable it: vault secrets enable -path={kv_mount} kv-v2"));
            }
        }
        Err(e) => output::warn(&e.to_string()),
    }

    output::section("2. Policy");
    let policy_hcl = format!(
        r#"# vaultctl policy
# Read/write access to {kv_mount}/{policy_path}/*

path "{kv_mount}/data/{policy_path}/*" {{
  capabilities = ["create", "read", "update", "delete", "list"]
}}

path "{kv_mount}/metadata/{policy_path}/*" {{
  capabilities = ["list", "read", "delete"]
}}

path "auth/token/lookup-self" {{
  capabilities = ["read"]
}}

path "auth/token/renew-self" {{
  capabilities = ["update"]
}}
"#
    );
    client.policy_write(POLICY_NAME, &policy_hcl)?;
    output::success(&format!("Created: {POLICY_NAME}"));
    output::dimmed(&format!("Access: {kv_mount}/data/{policy_path}/*"));

    output::section("3. AppRole Auth");
    match client.sys_auth() {
        Ok(methods) => {
            if methods.get(format!("{}/", settings.approle_mount)).is_some() {
                output::success(&format!("Already enabled: {}/", settings.approle_mount));
            } else {
                client.sys_enable_auth(&settings.approle_mount, "approle")?;
                output::success(&format!("Enabled: {}/", settings.approle_mount));
            }
        }
        Err(e) => output::warn(&e.to_string()),
    }

    output::section("4. AppRole");
    if client
        .approle_read_role(&settings.approle_mount, ROLE_NAME)
        .is_ok()
    {
        output::success(&format!("Already exists: {ROLE_NAME}"));
    } else {
        client.approle_write_role(
            &settings.approle_mount,
            ROLE_NAME,
            &json!({
                "token_policies": [POLICY_NAME],
                "token_ttl": "1h",
                "token_max_ttl": "24h",
                "secret_id_ttl": "0",
                "secret_id_num_uses": 0,
            }),
        )?;
        output::success(&format!("Created: {ROLE_NAME}"));
    }

    output::section("5. Credentials");
    let role_id = client.approle_role_id(&settings.approle_mount, ROLE_NAME)?;
    let secret_id = client.approle_secret_id(&settings.approle_mount, ROLE_NAME)?;
    print_credentials(&role_id, &secret_id, Some((&kv_mount, &kv_path)));

    output::success("Vault setup complete.");
    output::hint("On each machine: sudo vaultctl setup init --approle");
    Ok(0)
}

fn print_credentials(role_id: &str, secret_id: &str, kv: Option<(&str, &str)>) {
    let rule = style("─".repeat(60)).yellow();
    println!("\n{rule}");
    println!("{}", style("Save these credentials securely!").yellow());
    println!("{rule}\n");
    println!("  Role ID:    {role_id}");
    println!("  Secret ID:  {secret_id}");
    if let Some((mount, path)) = kv {
        println!("\n  KV Mount:   {mount}");
        println!("  KV Path:    {path}");
    }
    println!("\n{rule}");
}

// ── setup apt-server ────────────────────────────────────────────────────

fn apt_server(reconfigure: bool) -> Result<i32> {
    require_root("setup apt-server")?;

    let existing = RepoConfig::load();
    let installed = repo::repo_dir().exists();
    if reconfigure && !installed {
        output::error("APT repository not installed. Run the full setup first.");
        return Ok(1);
    }
    if installed {
        output::warn("Existing configuration found");
        output::kv("Domain", existing.get("DOMAIN").unwrap_or("-"));
        output::kv("GPG Email", existing.get("GPG_EMAIL").unwrap_or("-"));
        output::kv("Web Server", existing.get("WEB_SERVER").unwrap_or("-"));
    }

    let web_server = {
        let default = if existing.get("WEB_SERVER") == Some("traefik") { 1 } else { 0 };
        let choice = Select::new()
            .with_prompt("Web server mode")
            .items(&[
                "Caddy - standalone with automatic HTTPS (Let's Encrypt)",
                "Traefik - nginx backend for an existing Traefik proxy",
            ])
            .default(default)
            .interact()
            .map_err(|e| Error::Other(e.to_string()))?;
        if choice == 0 { "caddy" } else { "traefik" }
    };

    let domain = prompt_text("Domain (e.g. apt.example.com)", existing.get("DOMAIN"))?;
    if domain.is_empty() {
        output::error("Domain is required.");
        return Ok(1);
    }
    let gpg_email = prompt_text("GPG signing email", existing.get("GPG_EMAIL"))?;
    if gpg_email.is_empty() {
        output::error("GPG email is required.");
        return Ok(1);
    }
    let gpg_name = prompt_text(
        "GPG key name",
        Some(existing.get("GPG_NAME").unwrap_or("APT Repository Signing Key")),
    )?;
    let repo_name = prompt_text(
        "Repository name (Origin)",
        Some(existing.get("REPO_NAME").unwrap_or("internal")),
    )?;
    let codename = prompt_text(
        "Distribution codename",
        Some(existing.get("REPO_CODENAME").unwrap_or("stable")),
    )?;
    let arch = prompt_text(
        "Architecture",
        Some(existing.get("REPO_ARCH").unwrap_or("amd64")),
    )?;

    let enable_auth = confirm(
        "Enable authentication?",
        existing.get("ENABLE_AUTH").unwrap_or("true") == "true",
    )?;
    let (auth_user, auth_pass) = if enable_auth {
        let user = prompt_text("Auth username", Some(existing.get("AUTH_USER").unwrap_or("apt")))?;
        output::dimmed("Auth password (Enter to auto-generate or keep existing)");
        let entered = Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .interact()
            .map_err(|e| Error::Other(e.to_string()))?;
        let pass = if !entered.is_empty() {
            entered
        } else if let Some(old) = existing.get("AUTH_PASS") {
            output::dimmed("Keeping existing password");
            old.to_string()
        } else {
            output::dimmed("Auto-generated password");
            generate_password()
        };
        (user, pass)
    } else {
        (String::new(), String::new())
    };

    let listen_port: u16 = if web_server == "traefik" {
        prompt_text(
            "Nginx listen port (Traefik backend)",
            Some(existing.get("LISTEN_PORT").unwrap_or("8080")),
        )?
        .parse()
        .map_err(|_| Error::Other("invalid port".to_string()))?
    } else {
        8080
    };

    output::section("Configuration Summary");
    output::kv("Domain", &domain);
    output::kv("GPG Email", &gpg_email);
    output::kv("Repository", &repo_name);
    output::kv("Codename", &codename);
    output::kv("Web Server", web_server);
    output::kv("Auth", if enable_auth { "enabled" } else { "disabled" });
    if enable_auth {
        output::kv("Username", &auth_user);
        output::kv("Password", "********");
    }
    if web_server == "traefik" {
        output::kv("Listen Port", &listen_port.to_string());
    }
    if !confirm("Proceed with this configuration?", true)? {
        output::dimmed("Cancelled.");
        return Ok(0);
    }

    let mut config = RepoConfig::load();
    config.set("DOMAIN", &domain);
    config.set("GPG_EMAIL", &gpg_email);
    config.set("GPG_NAME", &gpg_name);
    config.set("REPO_NAME", &repo_name);
    config.set("REPO_LABEL", &format!("{} Repository", titlecase(&repo_name)));
    config.set("REPO_CODENAME", &codename);
    config.set("REPO_ARCH", &arch);
    config.set("ENABLE_AUTH", if enable_auth { "true" } else { "false" });
    config.set("AUTH_USER", &auth_user);
    config.set("AUTH_PASS", &auth_pass);
    config.set("WEB_SERVER", web_server);
    config.set("LISTEN_PORT", &listen_port.to_string());

    if !reconfigure {
        install_packages(web_server)?;
        create_repo_dirs()?;
    }

    let gpg_key_id = setup_gpg(&config, reconfigure)?;
    config.set("GPG_KEY_ID", &gpg_key_id);
    fs::create_dir_all(repo::APT_BASE)?;
    config.save()?;

    setup_reprepro(&config)?;
    setup_auth(&config)?;
    if web_server == "caddy" {
        setup_caddy(&config)?;
    } else {
        setup_nginx(&config, listen_port)?;
    }
    create_client_files(&config)?;

    print_apt_summary(&config);
    Ok(0)
}

fn titlecase(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn generate_password() -> String {
    // /dev/urandom through gpg avoids adding an RNG dependency for a
    // one-off setup prompt.
    let out = Command::new("gpg")
        .args(["--gen-random", "--armor", "1", "16"])
        .output();
    match out {
        Ok(o) if o.status.success() => String::from_utf8_lossy(&o.stdout)
            .trim()
            .trim_end_matches('=')
            .to_string(),
        _ => format!("apt-{}", chrono::Local::now().format("%s%f")),
    }
}

fn install_packages(web_server: &str) -> Result<()> {
    output::step("Installing packages");
    let mut packages = vec!["reprepro", "gnupg", "gnupg-agent", "apache2-utils", "curl"];
    if web_server == "caddy" {
        install_caddy()?;
    } else {
        packages.push("nginx");
    }
    run_checked("apt-get", &["update", "-qq"])?;
    let mut args = vec!["install", "-y", "-qq"];
    args.extend(&packages);
    run_checked("apt-get", &args)?;
    output::success("Packages installed");
    Ok(())
}

fn install_caddy() -> Result<()> {
    if which::which("caddy").is_ok() {
        output::success("Caddy already installed");
        return Ok(());
    }
    output::dimmed("Installing Caddy...");
    run_checked(
        "bash",
        &[
            "-c",
            "curl -1sLf 'https://dl.cloudsmith.io/public/caddy/stable/gpg.key' | \
             gpg --dearmor -o /usr/share/keyrings/caddy-stable-archive-keyring.gpg",
        ],
    )?;
    run_checked(
        "bash",
        &[
            "-c",
            "curl -1sLf 'https://dl.cloudsmith.io/public/caddy/stable/debian.deb.txt' | \
             tee /etc/apt/sources.list.d/caddy-stable.list > /dev/null",
        ],
    )?;
    run_checked("apt-get", &["update", "-qq"])?;
    run_checked("apt-get", &["install", "-y", "-qq", "caddy"])
}

fn create_repo_dirs() -> Result<()> {
    output::step("Creating directories");
    let repo = repo::repo_dir();
    for sub in ["conf", "db", "dists", "pool"] {
        fs::create_dir_all(repo.join(sub))?;
    }
    let gpg = repo::gpg_home();
    fs::create_dir_all(&gpg)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&gpg, fs::Permissions::from_mode(0o700))?;
    }
    output::success("Directories created");
    Ok(())
}

fn setup_gpg(config: &RepoConfig, reconfigure: bool) -> Result<String> {
    output::step("Setting up GPG key");
    let gpg_home = repo::gpg_home();
    let email = config.get("GPG_EMAIL").unwrap_or_default();

    let have_key = Command::new("gpg")
        .env("GNUPGHOME", &gpg_home)
        .args(["--list-keys", email])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false);

    if have_key {
        output::success(&format!("Existing GPG key found: {email}"));
    } else if reconfigure {
        return Err(Error::Other("GPG key not found, run the full setup".to_string()));
    } else {
        output::dimmed("Generating new GPG key (this may take a while)...");
        let batch = templates::gpg_batch(
            config.get("GPG_NAME").unwrap_or("APT Repository Signing Key"),
            email,
        );
        let batch_file = std::env::temp_dir().join("vaultctl-gpg-batch");
        fs::write(&batch_file, batch)?;
        let status = Command::new("gpg")
            .env("GNUPGHOME", &gpg_home)
            .args(["--batch", "--gen-key"])
            .arg(&batch_file)
            .status()?;
        let _ = fs::remove_file(&batch_file);
        if !status.success() {
            return Err(Error::Other("GPG key generation failed".to_string()));
        }
        output::success("GPG key generated");
    }

    let key_id = gpg_key_id(&gpg_home)?
        .ok_or_else(|| Error::Other("failed to read GPG key ID".to_string()))?;
    output::kv("Key ID", &key_id);

    // Export the public key in both armored and binary form.
    let repo_path = repo::repo_dir();
    let armored = run_gpg_export(&gpg_home, true)?;
    fs::write(repo_path.join("key.gpg"), armored)?;
    let binary = run_gpg_export(&gpg_home, false)?;
    fs::write(repo_path.join("key"), binary)?;
    output::success("Public key exported");
    Ok(key_id)
}

fn run_gpg_export(gpg_home: &Path, armor: bool) -> Result<Vec<u8>> {
    let mut cmd = Command::new("gpg");
    cmd.env("GNUPGHOME", gpg_home);
    if armor {
        cmd.arg("--armor");
    }
    cmd.arg("--export");
    let out = cmd.output()?;
    if !out.status.success() {
        return Err(Error::Other("gpg --export failed".to_string()));
    }
    Ok(out.stdout)
}

/// Last 8 characters of the first public key's ID, colon format.
fn gpg_key_id(gpg_home: &Path) -> Result<Option<String>> {
    let out = Command::new("gpg")
        .env("GNUPGHOME", gpg_home)
        .args(["--list-keys", "--with-colons"])
        .output()?;
    for line in String::from_utf8_lossy(&out.stdout).lines() {
        if let Some(rest) = line.strip_prefix("pub:") {
            let fields: Vec<&str> = rest.split(':').collect();
            if fields.len() > 3 && fields[3].len() >= 8 {
                return Ok(Some(fields[3][fields[3].len() - 8..].to_string()));
            }
        }
    }
    Ok(None)
}

fn setup_reprepro(config: &RepoConfig) -> Result<()> {
    output::step("Setting up reprepro");
    let repo_path = repo::repo_dir();
    let conf = repo_path.join("conf");
    fs::create_dir_all(&conf)?;

    let distributions = templates::reprepro_distributions(
        config.get("REPO_NAME").unwrap_or("internal"),
        config.get("REPO_LABEL").unwrap_or("Internal Repository"),
        config.codename(),
        config.get("REPO_ARCH").unwrap_or("amd64"),
        config.get("GPG_KEY_ID").unwrap_or("default"),
    );
    fs::write(conf.join("distributions"), distributions)?;

    let options = templates::reprepro_options(
        &repo_path.display().to_string(),
        &repo::gpg_home().display().to_string(),
    );
    fs::write(conf.join("options"), options)?;

    // May fail on an empty repository, which is fine.
    let _ = repo::reprepro(&["export"]);
    output::success("reprepro configured");
    Ok(())
}

fn setup_auth(config: &RepoConfig) -> Result<()> {
    output::step("Setting up authentication");
    let htpasswd = Path::new(repo::APT_BASE).join(".htpasswd");
    let credentials = Path::new(repo::APT_BASE).join(".credentials");

    if config.get("ENABLE_AUTH") != Some("true") {
        output::dimmed("Authentication disabled (public repository)");
        let _ = fs::remove_file(&htpasswd);
        let _ = fs::remove_file(&credentials);
        return Ok(());
    }

    let user = config.get("AUTH_USER").unwrap_or("apt");
    let pass = config.get("AUTH_PASS").unwrap_or_default();
    let out = run_quiet("htpasswd", &["-bc", &htpasswd.display().to_string(), user, pass])?;
    if !out.status.success() {
        return Err(Error::Other("htpasswd failed".to_string()));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&htpasswd, fs::Permissions::from_mode(0o600))?;
    }

    let domain = config.get("DOMAIN").unwrap_or_default();
    write_private(
        &credentials,
        &format!("# APT Repository Credentials\nUSER={user}\nPASS={pass}\nURL=https://{domain}\n"),
    )?;

    output::success("Authentication configured");
    output::warn("Credentials (save securely!)");
    output::kv("Username", user);
    output::kv("Password", pass);
    Ok(())
}

fn setup_caddy(config: &RepoConfig) -> Result<()> {
    output::step("Setting up Caddy");
    let repo_path = repo::repo_dir().display().to_string();
    let domain = config.get("DOMAIN").unwrap_or_default();

    let auth = if config.get("ENABLE_AUTH") == Some("true") {
        let pass = config.get("AUTH_PASS").unwrap_or_default();
        let out = run_quiet("caddy", &["hash-password", "--plaintext", pass])?;
        if !out.status.success() {
            return Err(Error::Other("caddy hash-password failed".to_string()));
        }
        Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
    } else {
        None
    };
    let auth_pair = auth
        .as_deref()
        .map(|hash| (config.get("AUTH_USER").unwrap_or("apt"), hash));

    let caddyfile = templates::caddyfile(domain, &repo_path, auth_pair);
    fs::write("/etc/caddy/Caddyfile", caddyfile)?;
    fs::create_dir_all("/var/log/caddy")?;

    run_checked("systemctl", &["enable", "caddy"])?;
    run_checked("systemctl", &["restart", "caddy"])?;
    output::success("Caddy configured (automatic HTTPS)");
    Ok(())
}

fn setup_nginx(config: &RepoConfig, listen_port: u16) -> Result<()> {
    output::step("Setting up nginx");
    let _ = fs::remove_file("/etc/nginx/sites-enabled/default");

    let repo_path = repo::repo_dir().display().to_string();
    let domain = config.get("DOMAIN").unwrap_or_default();
    let htpasswd = Path::new(repo::APT_BASE).join(".htpasswd");
    let htpasswd_str = htpasswd.display().to_string();
    let htpasswd_path = if config.get("ENABLE_AUTH") == Some("true") {
        Some(htpasswd_str.as_str())
    } else {
        None
    };

    let conf = templates::nginx_conf(domain, &repo_path, listen_port, htpasswd_path);
    fs::write("/etc/nginx/sites-available/apt-repo", conf)?;
    let enabled = PathBuf::from("/etc/nginx/sites-enabled/apt-repo");
    let _ = fs::remove_file(&enabled);
    #[cfg(unix)]
    std::os::unix::fs::symlink("/etc/nginx/sites-available/apt-repo", &enabled)?;

    run_checked("nginx", &["-t"])?;
    run_checked("systemctl", &["enable", "nginx"])?;
    run_checked("systemctl", &["restart", "nginx"])?;
    output::success(&format!("nginx configured (port {listen_port})"));
    Ok(())
}

fn create_client_files(config: &RepoConfig) -> Result<()> {
    output::step("Creating client files");
    let repo_path = repo::repo_dir();
    let domain = config.get("DOMAIN").unwrap_or_default();
    let with_auth = config.get("ENABLE_AUTH") == Some("true");

    let script = templates::setup_client_script(domain, config.codename(), with_auth);
    let script_path = repo_path.join("setup-client.sh");
    fs::write(&script_path, script)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&script_path, fs::Permissions::from_mode(0o755))?;
    }

    let index = templates::index_html(
        domain,
        config.codename(),
        config.get("REPO_ARCH").unwrap_or("amd64"),
        with_auth,
    );
    fs::write(repo_path.join("index.html"), index)?;
    output::success("Client files created");
    Ok(())
}

fn print_apt_summary(config: &RepoConfig) {
    let domain = config.get("DOMAIN").unwrap_or_default();
    output::section("APT Repository Ready");
    output::kv("URL", &format!("https://{domain}"));
    output::kv("Codename", config.codename());
    if config.get("ENABLE_AUTH") == Some("true") {
        output::kv("Auth user", config.get("AUTH_USER").unwrap_or("-"));
        output::hint(&format!(
            "Client setup: curl -fsSL https://{domain}/setup-client.sh | sudo bash -s -- USER PASSWORD"
        ));
    } else {
        output::hint(&format!(
            "Client setup: curl -fsSL https://{domain}/setup-client.sh | sudo bash"
        ));
    }
    output::hint("Publish packages: vaultctl repo add <package.deb>");
}

// ── setup apt-client ────────────────────────────────────────────────────

const KEYRING_PATH: &str = "/usr/share/keyrings/internal-apt.gpg";
const SOURCES_FILE: &str = "/etc/apt/sources.list.d/internal.list";
const AUTH_FILE: &str = "/etc/apt/auth.conf.d/internal.conf";

fn apt_client(
    url: &str,
    user: Option<String>,
    password: Option<String>,
    codename: &str,
    remove: bool,
) -> Result<i32> {
    require_root("setup apt-client")?;

    let domain = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string();

    if remove {
        let _ = fs::remove_file(SOURCES_FILE);
        let _ = fs::remove_file(AUTH_FILE);
        let _ = fs::remove_file(KEYRING_PATH);
        output::success(&format!("Removed APT source for {domain}"));
        return Ok(0);
    }

    let password = match (&user, password) {
        (Some(_), None) => Some(prompt_password("Password")?),
        (_, p) => p,
    };

    output::step("[1/4] Adding GPG key");
    let _ = fs::remove_file(KEYRING_PATH);
    let mut curl_args = vec!["-fsSL".to_string()];
    if let (Some(u), Some(p)) = (&user, &password) {
        curl_args.push("-u".to_string());
        curl_args.push(format!("{u}:{p}"));
    }
    curl_args.push(format!("{url}/key.gpg"));
    let curl_refs: Vec<&str> = curl_args.iter().map(String::as_str).collect();
    let key = run_quiet("curl", &curl_refs)?;
    if !key.status.success() {
        output::error("Failed to download the GPG key.");
        return Ok(1);
    }
    let mut gpg = Command::new("gpg")
        .args(["--dearmor", "-o", KEYRING_PATH])
        .stdin(Stdio::piped())
        .spawn()?;
    if let Some(stdin) = gpg.stdin.as_mut() {
        use std::io::Write;
        stdin.write_all(&key.stdout)?;
    }
    if !gpg.wait()?.success() {
        output::error("Failed to import the GPG key.");
        return Ok(1);
    }

    if let (Some(u), Some(p)) = (&user, &password) {
        output::step("[2/4] Configuring authentication");
        write_private(
            Path::new(AUTH_FILE),
            &format!("machine {domain}\nlogin {u}\npassword {p}\n"),
        )?;
    } else {
        output::dimmed("[2/4] Skipping authentication (public repo)");
    }

    output::step("[3/4] Adding APT source");
    fs::write(
        SOURCES_FILE,
        format!("deb [signed-by={KEYRING_PATH}] {url} {codename} main\n"),
    )?;

    output::step("[4/4] Updating package list");
    if run_checked("apt-get", &["update", "-qq"]).is_err() {
        output::warn("Update failed, but the source was added.");
    }

    output::success("APT client configured.");
    output::hint("Install packages: sudo apt install vaultctl");
    Ok(0)
}

// ── setup systemd ───────────────────────────────────────────────────────

const SERVICE_UNIT: &str = "/etc/systemd/system/vaultctl-renew.service";
const TIMER_UNIT: &str = "/etc/systemd/system/vaultctl-renew.timer";
const TIMER_NAME: &str = "vaultctl-renew.timer";

fn systemd(enable: bool, disable: bool, status: bool) -> Result<i32> {
    if status || (!enable && !disable) {
        show_systemd_status()?;
        if !enable && !disable {
            return Ok(0);
        }
    }

    require_root(if enable {
        "setup systemd --enable"
    } else {
        "setup systemd --disable"
    })?;

    if enable {
        install_timer_units()?;
        enable_timer()?;
    } else {
        let _ = run_checked("systemctl", &["stop", TIMER_NAME]);
        let _ = run_checked("systemctl", &["disable", TIMER_NAME]);
        output::success("systemd timer disabled");
    }
    Ok(0)
}

fn install_timer_units() -> Result<()> {
    fs::write(SERVICE_UNIT, templates::renew_service())?;
    fs::write(TIMER_UNIT, templates::renew_timer())?;
    run_checked("systemctl", &["daemon-reload"])
}

fn enable_timer() -> Result<()> {
    run_checked("systemctl", &["enable", TIMER_NAME])?;
    run_checked("systemctl", &["start", TIMER_NAME])?;
    output::success("systemd timer enabled");
    Ok(())
}

fn show_systemd_status() -> Result<()> {
    output::section("systemd Timer Status");

    let active = systemctl_stdout(&["is-active", TIMER_NAME])? == "active";
    let enabled = systemctl_stdout(&["is-enabled", TIMER_NAME])? == "enabled";
    output::kv("Timer", if active { "active" } else { "inactive" });
    output::kv("Auto-start", if enabled { "yes" } else { "no" });

    if active {
        let next = systemctl_stdout(&["show", TIMER_NAME, "--property=NextElapseUSecRealtime"])?;
        if let Some((_, value)) = next.split_once('=') {
            output::kv("Next run", value);
        }
    }
    let service = systemctl_stdout(&["show", "vaultctl-renew.service", "--property=Result"])?;
    if let Some((_, value)) = service.split_once('=') {
        output::kv("Last result", value);
    }
    Ok(())
}

fn systemctl_stdout(args: &[&str]) -> Result<String> {
    let out = run_quiet("systemctl", args)?;
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

// ── setup config / test ─────────────────────────────────────────────────

fn config(edit: bool) -> Result<i32> {
    let path = Path::new(SYSTEM_CONFIG_FILE);
    if edit {
        require_root("setup config --edit")?;
        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "nano".to_string());
        run_checked(&editor, &[SYSTEM_CONFIG_FILE])?;
        return Ok(0);
    }

    output::section("Configuration Files");
    output::kv(
        "Config",
        &format!(
            "{SYSTEM_CONFIG_FILE} ({})",
            if path.exists() { "exists" } else { "missing" }
        ),
    );

    if !path.exists() {
        output::warn("Config file not found.");
        output::hint("Create it: sudo vaultctl setup init");
        return Ok(0);
    }

    output::section("Current Settings");
    for line in fs::read_to_string(path)?.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let key = trimmed.split('=').next().unwrap_or(trimmed);
        if ["TOKEN", "SECRET", "PASS"].iter().any(|s| key.contains(s)) {
            output::list_item(&format!("{key}=****"));
        } else {
            output::list_item(trimmed);
        }
    }
    Ok(0)
}

fn test(settings: &Settings) -> Result<i32> {
    output::section("Connection Test");

    println!("1. Vault server: {}", settings.vault_addr);
    let client = VaultClient::new(settings, None)?;
    let health = client.health();
    if health.initialized && !health.sealed {
        output::success("Connection successful");
    } else {
        output::error("Connection failed");
        return Ok(1);
    }

    println!("\n2. Authentication");
    let client = match session::authenticated_client(settings) {
        Ok(c) => {
            output::success("Auth successful");
            c
        }
        Err(e) => {
            output::error("Auth failed");
            return Err(e);
        }
    };

    println!("\n3. KV engine: {}/", settings.kv_mount);
    match client.kv_list(&settings.kv_mount, "") {
        Ok(_) => output::success("Accessible"),
        Err(e) => output::warn(&e.to_string()),
    }

    output::success("Test complete");
    Ok(0)
}

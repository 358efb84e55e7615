//! Rendered file contents for the setup commands.
//!
//! Everything the setup wizards write to disk is generated here so the
//! command modules stay readable. Plain `format!` templates.

/// /etc/vaultctl/config written by `setup init`.
pub fn vaultctl_config(
    vault_addr: &str,
    vault_token: Option<&str>,
    role_id: Option<&str>,
    secret_id: Option<&str>,
) -> String {
    let mut out = format!(
        "# vaultctl configuration\n\
         # Generated by vaultctl setup init\n\
         \n\
         VAULT_ADDR={vault_addr}\n"
    );
    if let Some(token) = vault_token {
        out.push_str(&format!("VAULT_TOKEN={token}\n"));
    }
    if let Some(role_id) = role_id {
        out.push_str(&format!("VAULT_ROLE_ID={role_id}\n"));
    }
    if let Some(secret_id) = secret_id {
        out.push_str(&format!("VAULT_SECRET_ID={secret_id}\n"));
    }
    out
}

/// GPG batch file for unattended signing key generation.
pub fn gpg_batch(name: &str, email: &str) -> String {
    format!(
        "%echo Generating APT signing key\n\
         Key-Type: RSA\n\
         Key-Length: 4096\n\
         Subkey-Type: RSA\n\
         Subkey-Length: 4096\n\
         Name-Real: {name}\n\
         Name-Email: {email}\n\
         Expire-Date: 0\n\
         %no-protection\n\
         %commit\n\
         %echo Done\n"
    )
}

/// reprepro conf/distributions.
pub fn reprepro_distributions(
    name: &str,
    label: &str,
    codename: &str,
    arch: &str,
    gpg_key_id: &str,
) -> String {
    format!(
        "Origin: {name}\n\
         Label: {label}\n\
         Codename: {codename}\n\
         Architectures: {arch}\n\
         Components: main\n\
         Description: {label}\n\
         SignWith: {gpg_key_id}\n"
    )
}

/// reprepro conf/options.
pub fn reprepro_options(repo_path: &str, gpg_home: &str) -> String {
    format!(
        "verbose\n\
         basedir {repo_path}\n\
         gnupghome {gpg_home}\n\
         ask-passphrase\n"
    )
}

/// Caddyfile for the repository vhost.
pub fn caddyfile(
    domain: &str,
    repo_path: &str,
    auth: Option<(&str, &str)>, // (user, caddy password hash)
) -> String {
    match auth {
        Some((user, hash)) => format!(
            "{domain} {{\n\
             \x20   root * {repo_path}\n\
             \n\
             \x20   # Public files (GPG key, setup script)\n\
             \x20   @public {{\n\
             \x20       path /key.gpg /key /setup-client.sh /index.html\n\
             \x20   }}\n\
             \x20   handle @public {{\n\
             \x20       file_server\n\
             \x20   }}\n\
             \n\
             \x20   handle {{\n\
             \x20       basicauth {{\n\
             \x20           {user} {hash}\n\
             \x20       }}\n\
             \x20       file_server\n\
             \x20   }}\n\
             \n\
             \x20   log {{\n\
             \x20       output file /var/log/caddy/apt-access.log\n\
             \x20   }}\n\
             }}\n"
        ),
        None => format!(
            "{domain} {{\n\
             \x20   root * {repo_path}\n\
             \x20   file_server browse\n\
             \n\
             \x20   log {{\n\
             \x20       output file /var/log/caddy/apt-access.log\n\
             \x20   }}\n\
             }}\n"
        ),
    }
}

/// nginx site config for the Traefik-backend mode.
pub fn nginx_conf(
    domain: &str,
    repo_path: &str,
    listen_port: u16,
    htpasswd_path: Option<&str>,
) -> String {
    let auth_block = match htpasswd_path {
        Some(path) => format!(
            "        auth_basic \"APT Repository\";\n\
             \x20       auth_basic_user_file {path};\n"
        ),
        None => String::new(),
    };
    let public_block = if htpasswd_path.is_some() {
        "    # Public files (no authentication required)\n\
         \x20   location ~ ^/(key\\.gpg|key|setup-client\\.sh|index\\.html)$ {\n\
         \x20       allow all;\n\
         \x20   }\n\n"
    } else {
        ""
    };
    format!(
        "server {{\n\
         \x20   listen {listen_port};\n\
         \x20   server_name {domain};\n\
         \n\
         \x20   root {repo_path};\n\
         \n\
         {public_block}\
         \x20   location / {{\n\
         {auth_block}\
         \x20       autoindex on;\n\
         \x20       autoindex_exact_size off;\n\
         \x20       autoindex_localtime on;\n\
         \x20   }}\n\
         \n\
         \x20   # Disable caching for repository metadata\n\
         \x20   location /dists/ {{\n\
         \x20       add_header Cache-Control \"no-cache, no-store, must-revalidate\";\n\
         {auth_block}\
         \x20   }}\n\
         \n\
         \x20   access_log /var/log/nginx/apt-access.log;\n\
         \x20   error_log /var/log/nginx/apt-error.log;\n\
         }}\n"
    )
}

/// setup-client.sh served from the repository root.
pub fn setup_client_script(domain: &str, codename: &str, with_auth: bool) -> String {
    if with_auth {
        format!(
            r#"#!/bin/bash
# APT Repository Client Setup Script
set -e

DOMAIN="{domain}"
CODENAME="{codename}"
AUTH_USER="${{1:?Usage: $0 USERNAME PASSWORD}}"
AUTH_PASS="${{2:?Usage: $0 USERNAME PASSWORD}}"

echo "[1/4] Adding GPG key..."
rm -f /usr/share/keyrings/internal-apt.gpg
curl -fsSL -u "$AUTH_USER:$AUTH_PASS" "https://$DOMAIN/key.gpg" | \
    gpg --dearmor -o /usr/share/keyrings/internal-apt.gpg

echo "[2/4] Configuring authentication..."
mkdir -p /etc/apt/auth.conf.d
cat > /etc/apt/auth.conf.d/internal.conf << EOF
machine $DOMAIN
login $AUTH_USER
password $AUTH_PASS
EOF
chmod 600 /etc/apt/auth.conf.d/internal.conf

echo "[3/4] Adding APT source..."
echo "deb [signed-by=/usr/share/keyrings/internal-apt.gpg] https://$DOMAIN $CODENAME main" > \
    /etc/apt/sources.list.d/internal.list

echo "[4/4] Updating package list..."
apt-get update -qq

echo "Setup complete! Install with: sudo apt install vaultctl"
"#
        )
    } else {
        format!(
            r#"#!/bin/bash
# APT Repository Client Setup Script
set -e

DOMAIN="{domain}"
CODENAME="{codename}"

echo "[1/3] Adding GPG key..."
rm -f /usr/share/keyrings/internal-apt.gpg
curl -fsSL "https://$DOMAIN/key.gpg" | \
    gpg --dearmor -o /usr/share/keyrings/internal-apt.gpg

echo "[2/3] Adding APT source..."
echo "deb [signed-by=/usr/share/keyrings/internal-apt.gpg] https://$DOMAIN $CODENAME main" > \
    /etc/apt/sources.list.d/internal.list

echo "[3/3] Updating package list..."
apt-get update -qq

echo "Setup complete! Install with: sudo apt install vaultctl"
"#
        )
    }
}

/// Landing page served at the repository root.
pub fn index_html(domain: &str, codename: &str, arch: &str, with_auth: bool) -> String {
    let badge = if with_auth { "Private" } else { "Public" };
    let badge_color = if with_auth { "#f59e0b" } else { "#10b981" };
    let quick_setup = if with_auth {
        format!("curl -fsSL https://{domain}/setup-client.sh | sudo bash -s -- USER PASSWORD")
    } else {
        format!("curl -fsSL https://{domain}/setup-client.sh | sudo bash")
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>APT Repository - {domain}</title>
    <style>
        body{{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;max-width:800px;margin:0 auto;padding:48px 24px;color:#0a0a0a;line-height:1.5}}
        h1{{font-size:30px;margin-bottom:8px}}
        .badge{{display:inline-block;background:{badge_color};color:#fff;padding:4px 12px;border-radius:20px;font-size:12px;font-weight:600;margin-left:8px}}
        .card{{border:1px solid #e4e4e7;border-radius:8px;padding:24px;margin-bottom:24px}}
        .code{{background:#1e1e2e;color:#cdd6f4;border-radius:8px;padding:16px;font-family:monospace;font-size:13px;overflow-x:auto}}
        dl{{display:inline-block;margin-right:32px}}
        dt{{font-size:12px;color:#71717a;text-transform:uppercase}}
        dd{{font-family:monospace;margin:0}}
        a{{color:#3b82f6}}
    </style>
</head>
<body>
    <h1>APT Repository <span class="badge">{badge}</span></h1>
    <p>Internal package distribution</p>
    <p>
        <dl><dt>Domain</dt><dd>{domain}</dd></dl>
        <dl><dt>Codename</dt><dd>{codename}</dd></dl>
        <dl><dt>Arch</dt><dd>{arch}</dd></dl>
    </p>
    <p><a href="/key.gpg">GPG Key</a> &middot; <a href="/setup-client.sh">Setup Script</a></p>
    <div class="card">
        <h2>Quick Setup</h2>
        <div class="code">{quick_setup}</div>
    </div>
</body>
</html>
"#
    )
}

/// systemd service unit for token auto-renewal.
pub fn renew_service() -> &'static str {
    "[Unit]\n\
     Description=vaultctl token renewal\n\
     After=network-online.target\n\
     Wants=network-online.target\n\
     \n\
     [Service]\n\
     Type=oneshot\n\
     EnvironmentFile=-/etc/vaultctl/config\n\
     ExecStart=/usr/bin/vaultctl token renew --auto\n\
     \n\
     [Install]\n\
     WantedBy=multi-user.target\n"
}

/// systemd timer unit driving the renewal service.
pub fn renew_timer() -> &'static str {
    "[Unit]\n\
     Description=Periodic vaultctl token renewal\n\
     \n\
     [Timer]\n\
     OnBootSec=5min\n\
     OnUnitActiveSec=6h\n\
     RandomizedDelaySec=10min\n\
     \n\
     [Install]\n\
     WantedBy=timers.target\n"
}

/// ctl.sh management script written by `compose init --script`.
pub fn compose_ctl_script(
    compose_file: &str,
    secret_name: &str,
    secrets_file: &str,
    docker_cmd: &str,
) -> String {
    format!(
        r#"#!/bin/bash
# Docker Compose control script (generated by vaultctl compose init)
set -e

COMPOSE_FILE="{compose_file}"
SECRET_NAME="{secret_name}"
SECRETS_FILE="{secrets_file}"

case "${{1:-help}}" in
    up)
        vaultctl docker env "$SECRET_NAME" -o "$SECRETS_FILE"
        {docker_cmd} -f "$COMPOSE_FILE" up -d
        ;;
    down)
        {docker_cmd} -f "$COMPOSE_FILE" down
        ;;
    restart)
        vaultctl docker env "$SECRET_NAME" -o "$SECRETS_FILE"
        {docker_cmd} -f "$COMPOSE_FILE" down
        {docker_cmd} -f "$COMPOSE_FILE" up -d
        ;;
    logs)
        {docker_cmd} -f "$COMPOSE_FILE" logs -f
        ;;
    sync)
        vaultctl docker env "$SECRET_NAME" -o "$SECRETS_FILE"
        ;;
    *)
        echo "Usage: $0 {{up|down|restart|logs|sync}}"
        ;;
esac
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_includes_only_provided_credentials() {
        let approle = vaultctl_config("https://vault:8200", None, Some("rid"), Some("sid"));
        assert!(approle.contains("VAULT_ADDR=https://vault:8200"));
        assert!(approle.contains("VAULT_ROLE_ID=rid"));
        assert!(!approle.contains("VAULT_TOKEN"));

        let token = vaultctl_config("https://vault:8200", Some("hvs.x"), None, None);
        assert!(token.contains("VAULT_TOKEN=hvs.x"));
        assert!(!token.contains("VAULT_ROLE_ID"));
    }

    #[test]
    fn distributions_carries_signing_key() {
        let out = reprepro_distributions("internal", "Internal Repository", "stable", "amd64", "AB12CD34");
        assert!(out.contains("Codename: stable"));
        assert!(out.contains("SignWith: AB12CD34"));
    }

    #[test]
    fn caddyfile_auth_gates_private_paths() {
        let with = caddyfile("apt.example.com", "/var/www/apt/repo", Some(("apt", "$2a$hash")));
        assert!(with.contains("basicauth"));
        assert!(with.contains("@public"));

        let without = caddyfile("apt.example.com", "/var/www/apt/repo", None);
        assert!(without.contains("file_server browse"));
        assert!(!without.contains("basicauth"));
    }

    #[test]
    fn client_script_arg_check_only_with_auth() {
        assert!(setup_client_script("apt.example.com", "stable", true).contains("Usage: $0 USERNAME PASSWORD"));
        assert!(!setup_client_script("apt.example.com", "stable", false).contains("AUTH_USER"));
    }

    #[test]
    fn units_reference_each_other() {
        assert!(renew_service().contains("ExecStart=/usr/bin/vaultctl token renew --auto"));
        assert!(renew_timer().contains("OnUnitActiveSec=6h"));
    }
}

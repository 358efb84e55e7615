//! Authenticated-client resolution.
//!
//! Every command that talks to Vault goes through [`authenticated_client`],
//! an ordered fallback chain: cached token, configured token, AppRole login.
//! The first token that passes a self-lookup wins. Token expiry is not
//! tracked locally; a stale cache simply fails the lookup and the chain
//! moves on.

use std::path::Path;

use tracing::debug;

use crate::config::Settings;
use crate::core::client::VaultClient;
use crate::error::{AuthError, Result};

/// Resolve an authenticated client, or fail with
/// [`AuthError::NotAuthenticated`].
pub fn authenticated_client(settings: &Settings) -> Result<VaultClient> {
    // 1. cached token
    if let Some(token) = read_cached_token()? {
        let client = VaultClient::new(settings, Some(token))?;
        if client.is_authenticated() {
            debug!("using cached token");
            return Ok(client);
        }
        debug!("cached token rejected");
    }

    // 2. token from configuration (env / dotenv / config files)
    if settings.vault_token.is_some() {
        let client = VaultClient::new(settings, None)?;
        if client.is_authenticated() {
            debug!("using configured token");
            return Ok(client);
        }
        debug!("configured token rejected");
    }

    // 3. AppRole login, caching the returned token
    if let (Some(role_id), Some(secret_id)) =
        (&settings.approle_role_id, &settings.approle_secret_id)
    {
        let anonymous = VaultClient::new(settings, Some(String::new()))?;
        match anonymous.approle_login(role_id, secret_id, &settings.approle_mount) {
            Ok(auth) if !auth.client_token.is_empty() => {
                debug!(ttl = auth.lease_duration, "approle login succeeded");
                cache_token(&auth.client_token);
                return Ok(VaultClient::new(settings, Some(auth.client_token))?);
            }
            Ok(_) => debug!("approle login returned no token"),
            Err(e) => debug!(error = %e, "approle login failed"),
        }
    }

    Err(AuthError::NotAuthenticated.into())
}

/// Read the cached token, if any. Unreadable cache files are treated as
/// absent so a permission problem never blocks the fallback chain.
pub fn read_cached_token() -> Result<Option<String>> {
    let path = Settings::token_cache_file()?;
    if !path.exists() {
        return Ok(None);
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            let token = contents.trim().to_string();
            Ok((!token.is_empty()).then_some(token))
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "token cache unreadable");
            Ok(None)
        }
    }
}

/// Persist a token to the cache file (0600). Failures are logged, never
/// fatal: caching is an optimization, not a requirement.
pub fn cache_token(token: &str) {
    let write = || -> Result<()> {
        Settings::ensure_dirs()?;
        let path = Settings::token_cache_file()?;
        write_restricted(&path, token)?;
        Ok(())
    };
    if let Err(e) = write() {
        debug!(error = %e, "failed to cache token");
    }
}

/// Delete the cached token. Returns true when a cache file was removed.
pub fn clear_cached_token() -> Result<bool> {
    let path = Settings::token_cache_file()?;
    if path.exists() {
        std::fs::remove_file(&path)?;
        return Ok(true);
    }
    Ok(false)
}

fn write_restricted(path: &Path, contents: &str) -> std::io::Result<()> {
    std::fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // The cache path is resolved from the environment, so these tests take
    // a lock before touching XDG_CACHE_HOME.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn cache_round_trip() {
        let _guard = ENV_LOCK.lock().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let old = std::env::var_os("XDG_CACHE_HOME");
        std::env::set_var("XDG_CACHE_HOME", tmp.path());

        assert_eq!(read_cached_token().unwrap(), None);
        cache_token("hvs.test-token");
        assert_eq!(read_cached_token().unwrap().as_deref(), Some("hvs.test-token"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(Settings::token_cache_file().unwrap())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(clear_cached_token().unwrap());
        assert!(!clear_cached_token().unwrap());

        match old {
            Some(v) => std::env::set_var("XDG_CACHE_HOME", v),
            None => std::env::remove_var("XDG_CACHE_HOME"),
        }
    }

    #[test]
    fn blank_cache_reads_as_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let old = std::env::var_os("XDG_CACHE_HOME");
        std::env::set_var("XDG_CACHE_HOME", tmp.path());

        Settings::ensure_dirs().unwrap();
        std::fs::write(Settings::token_cache_file().unwrap(), "  \n").unwrap();
        assert_eq!(read_cached_token().unwrap(), None);

        match old {
            Some(v) => std::env::set_var("XDG_CACHE_HOME", v),
            None => std::env::remove_var("XDG_CACHE_HOME"),
        }
    }
}

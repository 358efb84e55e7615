//! Error types for vaultctl.
//!
//! A single top-level [`Error`] wraps the domain-specific enums so callers
//! can match on the failure class while `main` maps each class to a hint.

use thiserror::Error;

/// Top-level error for all vaultctl operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// An external tool exited non-zero; the code propagates to our own exit.
    #[error("{command} exited with code {code}")]
    Subprocess { command: String, code: i32 },

    #[error("{0}")]
    Other(String),
}

/// Vault API errors: non-2xx responses and connection failures.
///
/// The message is the joined `errors` array from the response body when
/// present, otherwise `HTTP <status>`.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct VaultError {
    pub message: String,
    /// HTTP status, absent for connection-level failures.
    pub status: Option<u16>,
}

impl VaultError {
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// True when the secret or path does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

/// Configuration-layer errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to determine home directory")]
    NoHomeDir,
}

/// Authentication errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("authentication required")]
    NotAuthenticated,

    #[error("token not found in 1Password")]
    OnePasswordMissing,

    #[error("1Password CLI (op) is not installed")]
    OnePasswordNotInstalled,

    #[error("1Password sign-in required")]
    OnePasswordNotSignedIn,
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_error_not_found() {
        assert!(VaultError::new("missing", Some(404)).is_not_found());
        assert!(!VaultError::new("denied", Some(403)).is_not_found());
        assert!(!VaultError::new("connection refused", None).is_not_found());
    }

    #[test]
    fn subprocess_error_message() {
        let e = Error::Subprocess {
            command: "reprepro".into(),
            code: 2,
        };
        assert_eq!(e.to_string(), "reprepro exited with code 2");
    }
}

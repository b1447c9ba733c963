//! Credential handling for Moodle logins.
//!
//! Passwords and web service tokens are wrapped in [`SecretValue`], which is
//! zeroed on drop and never shows up in `Debug` or `Display` output. With the
//! `secrets` feature, passwords can be remembered in the operating system's
//! native credential storage:
//! - macOS: Keychain
//! - Windows: Credential Manager
//! - Linux: Secret Service (GNOME Keyring, KDE Wallet, etc.)

#[cfg(feature = "secrets")]
use keyring::Entry;
use zeroize::Zeroize;

use std::fmt;
use thiserror::Error;

/// The service name used for keyring entries.
const SERVICE_NAME: &str = "moodle2pdf";

/// Result type for secrets operations.
pub type SecretsResult<T> = Result<T, SecretsError>;

/// Errors that can occur during secrets operations.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// Failed to access the system keychain.
    #[error("Failed to access system keychain: {0}")]
    KeychainAccess(String),

    /// No password stored for this login.
    #[error("No stored password for {0}")]
    NotFound(String),

    /// Failed to store secret.
    #[error("Failed to store password: {0}")]
    StoreFailed(String),

    /// Failed to delete secret.
    #[error("Failed to delete password: {0}")]
    DeleteFailed(String),

    /// Feature not available.
    #[error("Keychain support not available - compile with 'secrets' feature")]
    FeatureNotAvailable,
}

/// A secret value that is zeroed on drop.
#[derive(Clone, Default, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue {
    value: String,
}

impl SecretValue {
    /// Create a new secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }

    /// Get the secret value.
    ///
    /// Note: Use sparingly and ensure the value is not logged.
    pub fn expose(&self) -> &str {
        &self.value
    }

    /// Check if the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

// Prevent accidental logging of secrets
impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue([REDACTED])")
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Username and password as entered in the credentials dialog.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: SecretValue,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: SecretValue::new(password) }
    }

    /// Both fields must be filled in before a login is attempted.
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

/// Remembers Moodle passwords in the system keychain.
///
/// Entries are keyed by `username@host` so the same user can be stored for
/// several Moodle sites.
#[derive(Debug)]
pub struct CredentialStore {
    /// Service name for keyring entries.
    service: String,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore {
    pub fn new() -> Self {
        Self { service: SERVICE_NAME.to_string() }
    }

    /// Keychain key for a login on a site.
    pub fn key_for(site: &url::Url, username: &str) -> String {
        format!("{}@{}", username, site.host_str().unwrap_or("localhost"))
    }

    /// Store a password in the system keychain.
    #[cfg(feature = "secrets")]
    pub fn store(&self, site: &url::Url, credentials: &Credentials) -> SecretsResult<()> {
        let key = Self::key_for(site, &credentials.username);
        let entry = Entry::new(&self.service, &key)
            .map_err(|e| SecretsError::KeychainAccess(e.to_string()))?;

        entry
            .set_password(credentials.password.expose())
            .map_err(|e| SecretsError::StoreFailed(e.to_string()))?;
        tracing::info!("Stored password for {}", key);
        Ok(())
    }

    #[cfg(not(feature = "secrets"))]
    pub fn store(&self, _site: &url::Url, _credentials: &Credentials) -> SecretsResult<()> {
        Err(SecretsError::FeatureNotAvailable)
    }

    /// Retrieve a stored password.
    #[cfg(feature = "secrets")]
    pub fn retrieve(&self, site: &url::Url, username: &str) -> SecretsResult<SecretValue> {
        let key = Self::key_for(site, username);
        let entry = Entry::new(&self.service, &key)
            .map_err(|e| SecretsError::KeychainAccess(e.to_string()))?;

        let password = entry.get_password().map_err(|e| match e {
            keyring::Error::NoEntry => SecretsError::NotFound(key.clone()),
            other => SecretsError::KeychainAccess(other.to_string()),
        })?;

        Ok(SecretValue::new(password))
    }

    #[cfg(not(feature = "secrets"))]
    pub fn retrieve(&self, _site: &url::Url, _username: &str) -> SecretsResult<SecretValue> {
        Err(SecretsError::FeatureNotAvailable)
    }

    /// Delete a stored password.
    #[cfg(feature = "secrets")]
    pub fn delete(&self, site: &url::Url, username: &str) -> SecretsResult<()> {
        let key = Self::key_for(site, username);
        let entry = Entry::new(&self.service, &key)
            .map_err(|e| SecretsError::KeychainAccess(e.to_string()))?;

        entry.delete_credential().map_err(|e| match e {
            keyring::Error::NoEntry => SecretsError::NotFound(key.clone()),
            other => SecretsError::DeleteFailed(other.to_string()),
        })
    }

    #[cfg(not(feature = "secrets"))]
    pub fn delete(&self, _site: &url::Url, _username: &str) -> SecretsResult<()> {
        Err(SecretsError::FeatureNotAvailable)
    }
}

//! Security helpers.
//!
//! Keeps passwords and tokens out of logs and optionally remembers
//! passwords in the OS keychain.

mod secrets;

pub use secrets::{CredentialStore, Credentials, SecretValue, SecretsError, SecretsResult};

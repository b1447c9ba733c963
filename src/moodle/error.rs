//! Moodle client error types.

use thiserror::Error;

/// Result type for Moodle operations.
pub type MoodleResult<T> = Result<T, MoodleError>;

/// Errors that can occur while talking to a Moodle site.
#[derive(Debug, Error)]
pub enum MoodleError {
    /// Site unreachable or credentials rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The given site URL could not be parsed.
    #[error("Invalid site URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A course link did not match `<site>/course/view.php?id=<n>`.
    #[error("Link not valid: {0}")]
    InvalidLink(String),

    /// Transport level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The web service answered with an exception object.
    #[error("Moodle web service error ({errorcode}): {message}")]
    Remote { errorcode: String, message: String },

    /// The response did not have the expected shape.
    #[error("Unexpected response from Moodle: {0}")]
    Decode(#[from] serde_json::Error),
}

impl MoodleError {
    /// Whether the error means the login has to be repeated.
    pub fn is_auth(&self) -> bool {
        match self {
            Self::Auth(_) | Self::InvalidUrl { .. } => true,
            Self::Remote { errorcode, .. } => errorcode == "invalidtoken",
            _ => false,
        }
    }

    pub fn remote(errorcode: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote { errorcode: errorcode.into(), message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_classification() {
        assert!(MoodleError::Auth("bad".into()).is_auth());
        assert!(MoodleError::remote("invalidtoken", "Invalid token").is_auth());
        assert!(!MoodleError::remote("nopermissions", "No permission").is_auth());
    }

    #[test]
    fn test_remote_display() {
        let err = MoodleError::remote("invalidrecord", "Can't find data record");
        assert_eq!(
            err.to_string(),
            "Moodle web service error (invalidrecord): Can't find data record"
        );
    }
}

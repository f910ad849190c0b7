//! Authentication error types

use std::time::Duration;
use thiserror::Error;

/// Construction-time errors. Fatal and never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid authority URI '{authority}': {reason}")]
    InvalidAuthority { authority: String, reason: String },

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Errors raised by a token exchange with the identity provider
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Network failure talking to identity provider: {0}")]
    NetworkFailure(String),

    #[error("Token request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid grant ({code}): {description}")]
    InvalidGrant { code: String, description: String },

    #[error("Identity provider error ({status}): {message}")]
    ProviderError { status: u16, message: String },
}

/// Coarse classification of an [`AuthError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NetworkFailure,
    Timeout,
    InvalidGrant,
    ProviderError,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::NetworkFailure(_) => AuthErrorKind::NetworkFailure,
            Self::Timeout(_) => AuthErrorKind::Timeout,
            Self::InvalidGrant { .. } => AuthErrorKind::InvalidGrant,
            Self::ProviderError { .. } => AuthErrorKind::ProviderError,
        }
    }

    /// Transient failures the owning HTTP layer may retry.
    /// An invalid grant (bad secret, disabled app) needs an operator.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            AuthErrorKind::NetworkFailure | AuthErrorKind::Timeout
        )
    }

    /// Map a transport error from reqwest, keeping its own timeouts distinct.
    pub(crate) fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::NetworkFailure(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(AuthError::NetworkFailure("reset".into()).is_retryable());
        assert!(AuthError::Timeout(Duration::from_secs(5)).is_retryable());

        let invalid = AuthError::InvalidGrant {
            code: "invalid_client".into(),
            description: "bad secret".into(),
        };
        assert_eq!(invalid.kind(), AuthErrorKind::InvalidGrant);
        assert!(!invalid.is_retryable());

        let provider = AuthError::ProviderError {
            status: 500,
            message: "boom".into(),
        };
        assert!(!provider.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ConfigError::InvalidAuthority {
            authority: "not a url".into(),
            reason: "relative URL without a base".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid authority URI 'not a url': relative URL without a base"
        );
    }
}

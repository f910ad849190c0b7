//! Bearer token issued by the identity provider

use serde::Deserialize;
use std::fmt;
use std::time::{Duration, Instant};

/// Token response from the identity provider
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// OAuth2 error body (RFC 6749 section 5.2)
#[derive(Debug, Deserialize)]
pub(crate) struct TokenErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// An opaque access token plus its reported lifetime, if any.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    expires_at: Option<Instant>,
}

impl Token {
    pub fn new(access_token: impl Into<String>, expires_in: Option<Duration>) -> Self {
        Self {
            access_token: access_token.into(),
            // An expiry too far out to represent is treated as unknown
            expires_at: expires_in.and_then(|d| Instant::now().checked_add(d)),
        }
    }

    pub(crate) fn from_response(response: TokenResponse) -> Self {
        Self::new(
            response.access_token,
            response.expires_in.map(Duration::from_secs),
        )
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Past the lifetime the provider reported. Tokens without one never expire here.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Instant::now())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

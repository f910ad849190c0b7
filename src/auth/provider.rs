//! Client-credentials token provider
//!
//! Exchanges the app's id and secret for a bearer token and keeps the most
//! recent one as the single "current" token.

use crate::auth::credential::Credential;
use crate::auth::error::{AuthError, ConfigError};
use crate::auth::token::{Token, TokenErrorResponse, TokenResponse};
use reqwest::Client;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

/// Default bound on a single grant exchange
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// OAuth2 error codes that mean the app itself is rejected
const INVALID_GRANT_CODES: &[&str] = &[
    "invalid_client",
    "invalid_grant",
    "unauthorized_client",
    "invalid_scope",
];

/// Acquires and caches tokens using the client-credentials grant
#[derive(Debug)]
pub struct TokenProvider {
    credential: Credential,
    http_client: Client,
    timeout: Duration,
    current: RwLock<Option<Token>>,
    // Serialises exchanges so two refreshes never interleave their writes
    exchange_lock: Mutex<()>,
}

impl TokenProvider {
    /// Create a provider with the default exchange timeout
    pub fn new(credential: Credential) -> Result<Self, ConfigError> {
        Self::with_timeout(credential, DEFAULT_TOKEN_TIMEOUT)
    }

    /// Create a provider whose exchanges fail with `Timeout` after `timeout`
    pub fn with_timeout(credential: Credential, timeout: Duration) -> Result<Self, ConfigError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            credential,
            http_client,
            timeout,
            current: RwLock::new(None),
            exchange_lock: Mutex::new(()),
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True once any exchange has succeeded. Never reverts.
    pub async fn is_initialized(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Snapshot of the current token
    pub async fn current(&self) -> Option<Token> {
        self.current.read().await.clone()
    }

    /// Exchange the credential for a fresh token and make it current.
    ///
    /// On failure the previously cached token, if any, stays in place.
    pub async fn acquire(&self) -> Result<Token, AuthError> {
        let _guard = self.exchange_lock.lock().await;
        self.exchange_and_store().await
    }

    /// Same unconditional re-exchange as [`acquire`](Self::acquire).
    /// The client-credentials grant carries no refresh token.
    pub async fn refresh(&self) -> Result<Token, AuthError> {
        let _guard = self.exchange_lock.lock().await;
        tracing::info!("Refreshing access token for client {}", self.credential.client_id());
        self.exchange_and_store().await
    }

    /// Return the cached token, exchanging only if none exists yet.
    ///
    /// Concurrent first callers wait on the same exchange instead of each
    /// starting their own.
    pub async fn get_or_acquire(&self) -> Result<Token, AuthError> {
        if let Some(token) = self.current().await {
            return Ok(token);
        }

        let _guard = self.exchange_lock.lock().await;
        if let Some(token) = self.current().await {
            tracing::debug!("Token acquired by a concurrent caller");
            return Ok(token);
        }
        self.exchange_and_store().await
    }

    /// Caller must hold `exchange_lock`
    async fn exchange_and_store(&self) -> Result<Token, AuthError> {
        let token = match tokio::time::timeout(self.timeout, self.request_token()).await {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                self.log_failure(&e).await;
                return Err(e);
            }
            Err(_) => {
                let e = AuthError::Timeout(self.timeout);
                self.log_failure(&e).await;
                return Err(e);
            }
        };

        {
            let mut current = self.current.write().await;
            *current = Some(token.clone());
        }

        Ok(token)
    }

    async fn log_failure(&self, err: &AuthError) {
        if self.is_initialized().await {
            tracing::warn!("Token exchange failed, keeping last known token: {}", err);
        } else {
            tracing::error!("Token exchange failed: {}", err);
        }
    }

    /// Perform one client-credentials exchange against the grant endpoint
    async fn request_token(&self) -> Result<Token, AuthError> {
        let scope = self.credential.scope_param();
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credential.client_id()),
            ("client_secret", self.credential.client_secret()),
            ("scope", scope.as_str()),
        ];

        tracing::info!("Acquiring new access token for scope: {}", scope);

        let response = self
            .http_client
            .post(self.credential.grant_endpoint().clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::from_transport(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AuthError::from_transport(e, self.timeout))?;
        let token_response: TokenResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::ProviderError {
                status: status.as_u16(),
                message: format!("Failed to parse token response: {}", e),
            })?;

        match token_response.expires_in {
            Some(secs) => tracing::info!("Token acquired successfully, expires in {} seconds", secs),
            None => tracing::info!("Token acquired successfully"),
        }

        Ok(Token::from_response(token_response))
    }
}

/// Map a non-2xx token response to an error kind
fn classify_error(status: u16, body: &str) -> AuthError {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) if INVALID_GRANT_CODES.contains(&err.error.as_str()) => AuthError::InvalidGrant {
            code: err.error,
            description: err.error_description.unwrap_or_default(),
        },
        Ok(err) => AuthError::ProviderError {
            status,
            message: match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
        },
        Err(_) => AuthError::ProviderError {
            status,
            message: body.to_string(),
        },
    }
}

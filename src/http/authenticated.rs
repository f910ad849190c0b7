//! Client runtime that refreshes credentials on 401
//!
//! Wraps an [`HttpClient`] produced by an [`HttpClientFactory`]. A request
//! rejected with 401 triggers exactly one refresh and one replay.

use crate::auth::{AuthError, HttpClientFactory};
use crate::http::HttpClient;
use reqwest::{Request, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use thiserror::Error;

/// Errors from an authenticated send
#[derive(Error, Debug)]
pub enum SendError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request body cannot be replayed after a 401")]
    NotReplayable,
}

/// HTTP client whose requests carry the factory's bearer token
#[derive(Clone)]
pub struct AuthenticatedClient {
    client: HttpClient,
    factory: Arc<dyn HttpClientFactory>,
}

impl AuthenticatedClient {
    /// Initialise the factory if needed, then attach its auth header to a fresh client.
    pub async fn create(factory: Arc<dyn HttpClientFactory>) -> Result<Self, AuthError> {
        if !factory.is_initialized().await {
            tracing::info!("First authenticated request, acquiring token");
            factory.init().await?;
        }

        let mut client = factory.base_client();
        factory.attach_auth_header(&mut client);

        Ok(Self { client, factory })
    }

    pub fn http(&self) -> &HttpClient {
        &self.client
    }

    /// Send `request`; on 401 refresh the token and replay it once.
    ///
    /// A failed refresh surfaces as its `AuthError`, not as the 401.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, SendError> {
        let request = request.build()?;
        let replay = request.try_clone();

        let response = self.client.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        tracing::warn!("Request to {} rejected with 401, refreshing token", response.url());

        let replay: Request = replay.ok_or(SendError::NotReplayable)?;
        self.factory.refresh_auth_header(&self.client).await?;

        Ok(self.client.execute(replay).await?)
    }
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("client", &self.client)
            .finish()
    }
}

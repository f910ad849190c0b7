//! Authenticating HTTP client factories
//!
//! [`HttpClientFactory`] is the whole surface the data-retrieval layer sees.
//! [`ClientCredentialsFactory`] implements it on top of a [`TokenProvider`];
//! other grant types would be further implementations of the same trait.

use crate::auth::credential::Credential;
use crate::auth::error::{AuthError, ConfigError};
use crate::auth::provider::TokenProvider;
use crate::http::{HttpClient, RequestInterceptor};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use std::sync::Arc;
use std::time::Duration;

/// Capability interface for clients that carry OAuth2 bearer tokens
#[async_trait]
pub trait HttpClientFactory: Send + Sync {
    /// True once a token has been obtained
    async fn is_initialized(&self) -> bool;

    /// Obtain the first token. A no-op when already initialized.
    async fn init(&self) -> Result<(), AuthError>;

    /// Install an interceptor that stamps the current token on every request
    fn attach_auth_header(&self, client: &mut HttpClient);

    /// Called after a request was rejected for authentication reasons
    async fn refresh_auth_header(&self, client: &HttpClient) -> Result<(), AuthError>;

    /// Unauthenticated client that authenticated ones are built from
    fn base_client(&self) -> HttpClient;
}

/// Replaces any `Authorization` header with the provider's current token.
///
/// The token is read at send time, so a refresh is picked up by every
/// later request without re-installing the interceptor.
pub struct BearerInterceptor {
    provider: Arc<TokenProvider>,
}

impl BearerInterceptor {
    pub fn new(provider: Arc<TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RequestInterceptor for BearerInterceptor {
    async fn intercept(&self, request: &mut Request) {
        let token = self.provider.current().await;

        // HeaderMap::remove drops every value, so at most one header goes out
        request.headers_mut().remove(AUTHORIZATION);

        let Some(token) = token else {
            tracing::debug!("No token cached, sending {} without Authorization", request.url());
            return;
        };

        if token.is_expired() {
            tracing::debug!("Attaching token past its reported expiry to {}", request.url());
        }

        match HeaderValue::from_str(&token.bearer()) {
            Ok(mut value) => {
                value.set_sensitive(true);
                request.headers_mut().insert(AUTHORIZATION, value);
            }
            Err(_) => tracing::warn!("Access token is not a valid header value, not attaching"),
        }
    }
}

/// Client-credentials flavour of [`HttpClientFactory`]
#[derive(Debug)]
pub struct ClientCredentialsFactory {
    provider: Arc<TokenProvider>,
    base: HttpClient,
}

impl ClientCredentialsFactory {
    /// Build a factory for `resource` under the tenant `authority`.
    ///
    /// A malformed authority fails here, before any network call.
    pub fn new(
        authority: &str,
        client_id: &str,
        client_secret: &str,
        resource: &str,
        token_timeout: Duration,
        base: HttpClient,
    ) -> Result<Self, ConfigError> {
        let credential = Credential::new(authority, client_id, client_secret, resource)?;
        let provider = TokenProvider::with_timeout(credential, token_timeout)?;
        Ok(Self::from_provider(Arc::new(provider), base))
    }

    pub fn from_provider(provider: Arc<TokenProvider>, base: HttpClient) -> Self {
        Self { provider, base }
    }

    pub fn provider(&self) -> &Arc<TokenProvider> {
        &self.provider
    }
}

#[async_trait]
impl HttpClientFactory for ClientCredentialsFactory {
    async fn is_initialized(&self) -> bool {
        self.provider.is_initialized().await
    }

    async fn init(&self) -> Result<(), AuthError> {
        self.provider.get_or_acquire().await.map(|_| ())
    }

    fn attach_auth_header(&self, client: &mut HttpClient) {
        client.add_request_interceptor(Arc::new(BearerInterceptor::new(Arc::clone(
            &self.provider,
        ))));
    }

    async fn refresh_auth_header(&self, _client: &HttpClient) -> Result<(), AuthError> {
        // The installed interceptor reads the provider on every send
        self.provider.refresh().await.map(|_| ())
    }

    fn base_client(&self) -> HttpClient {
        self.base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::DEFAULT_REQUEST_TIMEOUT;
    use serde_json::json;
    use tokio_test::assert_ok;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn factory(server: &MockServer) -> ClientCredentialsFactory {
        ClientCredentialsFactory::new(
            &format!("{}/tenant-id", server.uri()),
            "client-id",
            "secret",
            "https://api.example.com",
            Duration::from_secs(5),
            HttpClient::with_timeout(DEFAULT_REQUEST_TIMEOUT).unwrap(),
        )
        .unwrap()
    }

    async fn mount_token(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/tenant-id/oauth2/v2.0/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "token_type": "Bearer", "access_token": token })),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let server = MockServer::start().await;
        mount_token(&server, "T1").await;

        let factory = factory(&server);
        assert!(!factory.is_initialized().await);
        assert_ok!(factory.init().await);
        assert_ok!(factory.init().await);
        assert!(factory.is_initialized().await);
    }

    #[tokio::test]
    async fn test_interceptor_replaces_existing_header() {
        let server = MockServer::start().await;
        mount_token(&server, "T1").await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(header("authorization", "Bearer T1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let factory = factory(&server);
        assert_ok!(factory.init().await);

        let mut client = factory.base_client();
        factory.attach_auth_header(&mut client);

        let request = client
            .get(&format!("{}/data", server.uri()))
            .header(AUTHORIZATION, "Bearer stale")
            .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .build()
            .unwrap();
        let response = client.execute(request).await.unwrap();
        assert_eq!(response.status(), 200);

        let received = server.received_requests().await.unwrap();
        let data = received.iter().find(|r| r.url.path() == "/data").unwrap();
        assert_eq!(data.headers.get_all("authorization").iter().count(), 1);
    }

    #[tokio::test]
    async fn test_base_client_stays_unauthenticated() {
        let server = MockServer::start().await;
        let factory = factory(&server);

        let mut client = factory.base_client();
        factory.attach_auth_header(&mut client);

        assert_eq!(client.interceptor_count(), 1);
        assert_eq!(factory.base_client().interceptor_count(), 0);
    }
}

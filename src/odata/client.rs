//! OData Client module
//!
//! Thin HTTP client for Microsoft Dynamics 365 OData endpoints. Requests go
//! out unauthenticated until an [`HttpClientFactory`] is installed; from then
//! on the first request acquires a token and every request carries it.

use crate::auth::{AuthError, HttpClientFactory};
use crate::http::{AuthenticatedClient, HttpClient, SendError};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OnceCell;
use tokio::time::sleep;

/// OData client errors
#[derive(Error, Debug)]
pub enum ODataError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized (401) after token refresh: {0}")]
    Unauthorized(String),

    #[error("Rate limited (429): retry after {0} seconds")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<SendError> for ODataError {
    fn from(err: SendError) -> Self {
        match err {
            SendError::Auth(e) => Self::Auth(e),
            SendError::Http(e) => Self::Http(e),
            SendError::NotReplayable => Self::Unauthorized(err.to_string()),
        }
    }
}

/// Query options for entity set requests
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub select: Option<Vec<String>>,
    pub filter: Option<String>,
    pub top: Option<usize>,
    pub cross_company: bool, // F&O only
}

impl QueryOptions {
    /// Build query string from options
    pub fn to_query_string(&self) -> String {
        let mut params = Vec::new();

        if let Some(ref select) = self.select {
            params.push(format!("$select={}", select.join(",")));
        }

        if let Some(ref filter) = self.filter {
            params.push(format!("$filter={}", filter));
        }

        if let Some(top) = self.top {
            params.push(format!("$top={}", top));
        }

        if self.cross_company {
            params.push("cross-company=true".to_string());
        }

        if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        }
    }
}

/// One page of an entity set
#[derive(Debug, Deserialize)]
pub struct ODataResponse {
    #[serde(rename = "@odata.context")]
    pub context: Option<String>,

    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,

    #[serde(default)]
    pub value: Vec<Value>,
}

/// OData client for D365 APIs
pub struct ODataClient {
    endpoint: String,
    http_client: HttpClient,
    factory: Option<Arc<dyn HttpClientFactory>>,
    authenticated: OnceCell<AuthenticatedClient>,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl ODataClient {
    /// Create a new OData client
    ///
    /// # Arguments
    /// * `endpoint` - Service root URL (e.g., "https://org.operations.dynamics.com/data/")
    /// * `http_client` - Client used while no auth factory is installed
    /// * `max_retries` - Maximum attempts for throttled or failing requests
    /// * `retry_delay_ms` - Initial delay between retries in milliseconds
    pub fn new(
        endpoint: String,
        http_client: HttpClient,
        max_retries: u32,
        retry_delay_ms: u64,
    ) -> Self {
        // Ensure endpoint ends with /
        let endpoint = if endpoint.ends_with('/') {
            endpoint
        } else {
            format!("{}/", endpoint)
        };

        Self {
            endpoint,
            http_client,
            factory: None,
            authenticated: OnceCell::new(),
            max_retries: max_retries.max(1),
            retry_delay_ms,
        }
    }

    /// Route later requests through `factory`. No token is fetched until the next request.
    pub fn set_http_client_factory(&mut self, factory: Arc<dyn HttpClientFactory>) {
        self.factory = Some(factory);
        self.authenticated = OnceCell::new();
    }

    pub fn is_authenticated(&self) -> bool {
        self.factory.is_some()
    }

    /// Get endpoint URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: impl Fn(&HttpClient) -> RequestBuilder) -> Result<Response, ODataError> {
        let Some(factory) = &self.factory else {
            let built = request(&self.http_client).build()?;
            return Ok(self.http_client.execute(built).await?);
        };

        let client = self
            .authenticated
            .get_or_try_init(|| AuthenticatedClient::create(Arc::clone(factory)))
            .await?;

        let response = client.send(request(client.http())).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(ODataError::Unauthorized(body));
        }
        Ok(response)
    }

    /// Execute a GET with retry on 429 and 5xx
    async fn execute_with_retry(&self, url: &str) -> Result<Response, ODataError> {
        let mut attempt = 0;
        let mut delay = self.retry_delay_ms;

        loop {
            attempt += 1;

            let response = self
                .send(|http| {
                    http.get(url)
                        .header("Accept", "application/json")
                        .header("OData-MaxVersion", "4.0")
                        .header("OData-Version", "4.0")
                })
                .await?;

            match response.status() {
                status if status.is_success() => return Ok(response),
                StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("Retry-After")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .unwrap_or(delay / 1000);

                    if attempt >= self.max_retries {
                        return Err(ODataError::RateLimited(retry_after));
                    }

                    tracing::warn!(
                        "Rate limited (429), attempt {}/{}, retrying after {} seconds",
                        attempt,
                        self.max_retries,
                        retry_after
                    );

                    sleep(Duration::from_secs(retry_after)).await;
                    delay = delay.saturating_mul(2);
                }
                StatusCode::NOT_FOUND => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ODataError::NotFound(body));
                }
                status if status.is_server_error() => {
                    if attempt >= self.max_retries {
                        let body = response.text().await.unwrap_or_default();
                        return Err(ODataError::ServerError(status.as_u16(), body));
                    }

                    tracing::warn!(
                        "Server error ({}), attempt {}/{}, retrying...",
                        status,
                        attempt,
                        self.max_retries
                    );

                    sleep(Duration::from_millis(delay)).await;
                    delay = delay.saturating_mul(2);
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(ODataError::ServerError(status.as_u16(), body));
                }
            }
        }
    }

    /// Fetch the raw `$metadata` document
    pub async fn fetch_metadata(&self) -> Result<String, ODataError> {
        let url = format!("{}$metadata", self.endpoint);
        tracing::debug!("Fetching: {}", url);

        let response = self
            .send(|http| http.get(&url).header("Accept", "application/xml"))
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ODataError::ServerError(status.as_u16(), body));
        }

        // Large EDMX documents are not always clean UTF-8
        let bytes = response.bytes().await.map_err(|e| {
            ODataError::ParseError(format!("Failed to read metadata bytes: {}", e))
        })?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Fetch one page of an entity set
    ///
    /// # Arguments
    /// * `entity_set` - Entity set name (e.g., "ReleasedProductsV2")
    /// * `next_link` - Optional next page URL from a previous response
    /// * `options` - Query options, ignored when `next_link` is given
    pub async fn fetch_entity_page(
        &self,
        entity_set: &str,
        next_link: Option<&str>,
        options: &QueryOptions,
    ) -> Result<ODataResponse, ODataError> {
        let url = match next_link {
            Some(link) => link.to_string(),
            None => format!("{}{}{}", self.endpoint, entity_set, options.to_query_string()),
        };

        tracing::debug!("Fetching: {}", url);

        let response = self.execute_with_retry(&url).await?;
        let page: ODataResponse = response.json().await.map_err(|e| {
            ODataError::ParseError(format!("Failed to parse OData response: {}", e))
        })?;

        tracing::debug!(
            "Fetched {} records, next_link: {:?}",
            page.value.len(),
            page.next_link.is_some()
        );

        Ok(page)
    }

    /// First record of an entity set, if any
    pub async fn first_entity(
        &self,
        entity_set: &str,
        options: &QueryOptions,
    ) -> Result<Option<Value>, ODataError> {
        let page = self.fetch_entity_page(entity_set, None, options).await?;
        Ok(page.value.into_iter().next())
    }
}

impl std::fmt::Debug for ODataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ODataClient")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.factory.is_some())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

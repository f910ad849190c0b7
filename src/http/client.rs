//! Generic HTTP client with request interceptors

use async_trait::async_trait;
use reqwest::{Client, Method, Request, RequestBuilder, Response};
use std::sync::Arc;
use std::time::Duration;

/// Default per-request timeout, long enough for a large `$metadata` document
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Hook run on every outgoing request right before it is dispatched
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    async fn intercept(&self, request: &mut Request);
}

/// `reqwest::Client` plus an ordered chain of interceptors.
///
/// Cloning is cheap and shares both the connection pool and the chain.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl HttpClient {
    pub fn new(inner: Client) -> Self {
        Self {
            inner,
            interceptors: Vec::new(),
        }
    }

    /// Build a client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = Client::builder().timeout(timeout).build()?;
        Ok(Self::new(inner))
    }

    pub fn add_request_interceptor(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Start a request. Interceptors run when it is passed to [`execute`](Self::execute).
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.inner.request(method, url)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Run the interceptor chain, then send
    pub async fn execute(&self, mut request: Request) -> Result<Response, reqwest::Error> {
        for interceptor in &self.interceptors {
            interceptor.intercept(&mut request).await;
        }
        self.inner.execute(request).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

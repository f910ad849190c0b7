//! D365 OData Auth Library
//!
//! OAuth2 client-credentials token provider for Microsoft Dynamics 365 and
//! an HTTP client factory that attaches, and on 401 refreshes, the bearer
//! token on every outgoing request.

pub mod auth;
pub mod config;
pub mod http;
pub mod odata;

pub use auth::{
    AuthError, AuthErrorKind, ClientCredentialsFactory, ConfigError, Credential,
    HttpClientFactory, Token, TokenProvider,
};
pub use config::{Config, RuntimeConfig};
pub use http::{AuthenticatedClient, HttpClient, RequestInterceptor};
pub use odata::{ODataClient, ODataError, QueryOptions};

//! Azure AD Authentication module
//!
//! Implements the OAuth2 client-credentials flow for app-only access to
//! Microsoft Dynamics 365, and the factory that stamps the resulting bearer
//! token on outgoing requests.

pub mod credential;
pub mod error;
pub mod factory;
pub mod provider;
pub mod token;

pub use credential::Credential;
pub use error::{AuthError, AuthErrorKind, ConfigError};
pub use factory::{BearerInterceptor, ClientCredentialsFactory, HttpClientFactory};
pub use provider::{TokenProvider, DEFAULT_TOKEN_TIMEOUT};
pub use token::Token;

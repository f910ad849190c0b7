//! HTTP module
//!
//! Generic interceptor-aware client and the 401-aware runtime built on it

pub mod authenticated;
pub mod client;

pub use authenticated::{AuthenticatedClient, SendError};
pub use client::{HttpClient, RequestInterceptor, DEFAULT_REQUEST_TIMEOUT};

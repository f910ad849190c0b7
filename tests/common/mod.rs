//! Shared fixtures: a stub identity provider and resource server.

#![allow(dead_code)]

use d365_odata_auth::auth::ClientCredentialsFactory;
use d365_odata_auth::http::{HttpClient, DEFAULT_REQUEST_TIMEOUT};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TENANT: &str = "tenant-id";
pub const GRANT_PATH: &str = "/tenant-id/oauth2/v2.0/token";
pub const RESOURCE: &str = "https://api.example.com";

pub fn token_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token_type": "Bearer",
        "expires_in": 3599,
        "ext_expires_in": 3599,
        "access_token": token
    }))
}

pub fn oauth_error(status: u16, error: &str, description: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(json!({
        "error": error,
        "error_description": description
    }))
}

/// Issue the next token in `tokens` on each call
pub async fn mount_token_sequence(server: &MockServer, tokens: &[&str]) {
    for token in tokens {
        Mock::given(method("POST"))
            .and(path(GRANT_PATH))
            .respond_with(token_response(token))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
}

/// Resource path that accepts only `Bearer {token}`
pub async fn mount_resource(server: &MockServer, resource_path: &str, token: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(resource_path))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "value": [] })))
        .mount(server)
        .await;
}

pub fn factory_for(server: &MockServer) -> ClientCredentialsFactory {
    ClientCredentialsFactory::new(
        &format!("{}/{}", server.uri(), TENANT),
        "client-id",
        "secret",
        RESOURCE,
        Duration::from_secs(5),
        HttpClient::with_timeout(DEFAULT_REQUEST_TIMEOUT).unwrap(),
    )
    .unwrap()
}

/// Requests the mock received on `request_path`
pub async fn requests_to(server: &MockServer, request_path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == request_path)
        .collect()
}

pub fn authorization(request: &Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

/// Numbered tokens "T1", "T2", ... one per grant request
pub struct CountingIssuer {
    issued: AtomicUsize,
}

impl CountingIssuer {
    pub fn new() -> Self {
        Self {
            issued: AtomicUsize::new(0),
        }
    }
}

impl Respond for CountingIssuer {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        token_response(&format!("T{}", n)).set_delay(Duration::from_millis(20))
    }
}

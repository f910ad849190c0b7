//! Client credential and identity-provider endpoints

use crate::auth::error::ConfigError;
use std::fmt;
use url::Url;

/// Immutable client-credentials tuple bound to a tenant authority.
///
/// Every URL is derived and validated once, at construction.
#[derive(Clone)]
pub struct Credential {
    client_id: String,
    client_secret: String,
    authority: Url,
    authorization_endpoint: Url,
    token_endpoint: Url,
    grant_endpoint: Url,
    scopes: Vec<String>,
}

impl Credential {
    /// Build a credential for `resource`, requesting its `/.default` scope.
    ///
    /// # Arguments
    /// * `authority` - Tenant-qualified issuer, e.g. "https://login.microsoftonline.com/<tenant-id>"
    /// * `client_id` - App registration client id
    /// * `client_secret` - App registration secret
    /// * `resource` - Resource URI, e.g. "https://org.operations.dynamics.com"
    pub fn new(
        authority: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        resource: &str,
    ) -> Result<Self, ConfigError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();

        if client_id.trim().is_empty() {
            return Err(ConfigError::MissingCredentials("client_id is empty".into()));
        }
        if client_secret.is_empty() {
            return Err(ConfigError::MissingCredentials(
                "client_secret is empty".into(),
            ));
        }
        if resource.trim().is_empty() {
            return Err(ConfigError::MissingCredentials("resource is empty".into()));
        }

        let base = authority.trim().trim_end_matches('/');
        let authority_url = parse_authority(base)?;

        Ok(Self {
            client_id,
            client_secret,
            authority: authority_url,
            authorization_endpoint: endpoint(base, "/oauth2/authorize")?,
            token_endpoint: endpoint(base, "/oauth2/token")?,
            grant_endpoint: endpoint(base, "/oauth2/v2.0/token")?,
            scopes: vec![default_scope(resource)],
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn authority(&self) -> &Url {
        &self.authority
    }

    /// Declared authorize endpoint. No redirect flow ever uses it.
    pub fn authorization_endpoint(&self) -> &Url {
        &self.authorization_endpoint
    }

    /// Declared token endpoint
    pub fn token_endpoint(&self) -> &Url {
        &self.token_endpoint
    }

    /// Endpoint the client-credentials grant is posted to
    pub fn grant_endpoint(&self) -> &Url {
        &self.grant_endpoint
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Space-separated scope parameter for the token request
    pub(crate) fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority", &self.authority.as_str())
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// `{resource}/.default`, without doubling a trailing slash
pub fn default_scope(resource: &str) -> String {
    let resource = resource.trim();
    if resource.ends_with('/') {
        format!("{}.default", resource)
    } else {
        format!("{}/.default", resource)
    }
}

fn parse_authority(authority: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidAuthority {
        authority: authority.to_string(),
        reason,
    };

    let url = Url::parse(authority).map_err(|e| invalid(e.to_string()))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed".into()));
    }

    Ok(url)
}

fn endpoint(base: &str, suffix: &str) -> Result<Url, ConfigError> {
    let raw = format!("{}{}", base, suffix);
    Url::parse(&raw).map_err(|e| ConfigError::InvalidAuthority {
        authority: base.to_string(),
        reason: e.to_string(),
    })
}

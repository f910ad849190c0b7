//! Configuration loading
//!
//! Reads `d365-odata-auth.toml` (or the file named by `D365_AUTH_CONFIG`),
//! applies environment overrides and validates the result.

use crate::auth::ConfigError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Default config file, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "d365-odata-auth.toml";

/// Login host used when only a tenant id is configured
const DEFAULT_LOGIN_HOST: &str = "https://login.microsoftonline.com";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub azure: AzureConfig,
    pub d365: D365Config,
    pub http: HttpConfig,
}

/// App registration and identity provider
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Tenant-qualified issuer, e.g. "https://login.microsoftonline.com/<tenant-id>"
    pub authority: Option<String>,
    /// Used to build the authority when `authority` is unset
    pub tenant_id: Option<String>,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("authority", &self.authority)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct D365Config {
    /// Environment base URL, e.g. "https://org.operations.dynamics.com"
    pub url: String,
    /// Path of the OData service root under `url`
    pub service_path: String,
    pub entity_set: String,
}

impl Default for D365Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_path: "data".to_string(),
            entity_set: "ReleasedProductsV2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub token_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            token_timeout_secs: 30,
            request_timeout_secs: 120,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Validated settings the binary runs with
#[derive(Clone)]
pub struct RuntimeConfig {
    pub authority: String,
    pub client_id: String,
    pub client_secret: String,
    /// Resource whose `/.default` scope is requested
    pub resource: String,
    /// OData service root, always ending in `/`
    pub endpoint: String,
    pub entity_set: String,
    pub token_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("authority", &self.authority)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("resource", &self.resource)
            .field("endpoint", &self.endpoint)
            .field("entity_set", &self.entity_set)
            .finish()
    }
}

impl Config {
    /// Load from `D365_AUTH_CONFIG` or the default file, then apply env overrides.
    /// A missing default file is fine, everything may come from the environment.
    pub fn load_default() -> Result<Self> {
        let mut config = match env::var("D365_AUTH_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => {
                tracing::debug!("No {} found, using environment only", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };

        config.apply_env();
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env(&mut self) {
        if let Ok(authority) = env::var("AZURE_AUTHORITY") {
            self.azure.authority = Some(authority);
        }
        if let Ok(tenant_id) = env::var("AZURE_TENANT_ID") {
            self.azure.tenant_id = Some(tenant_id);
        }
        if let Ok(client_id) = env::var("AZURE_CLIENT_ID") {
            self.azure.client_id = client_id;
        }
        if let Ok(client_secret) = env::var("AZURE_CLIENT_SECRET") {
            self.azure.client_secret = client_secret;
        }
        if let Ok(url) = env::var("D365_URL") {
            self.d365.url = url;
        }
    }

    /// Validate and resolve into a [`RuntimeConfig`]
    pub fn to_runtime(&self) -> Result<RuntimeConfig, ConfigError> {
        let authority = match (&self.azure.authority, &self.azure.tenant_id) {
            (Some(authority), _) if !authority.trim().is_empty() => authority.trim().to_string(),
            (_, Some(tenant)) if !tenant.trim().is_empty() => {
                format!("{}/{}", DEFAULT_LOGIN_HOST, tenant.trim())
            }
            _ => {
                return Err(ConfigError::MissingCredentials(
                    "set azure.authority or azure.tenant_id (AZURE_AUTHORITY / AZURE_TENANT_ID)"
                        .into(),
                ))
            }
        };

        if self.azure.client_id.trim().is_empty() {
            return Err(ConfigError::MissingCredentials(
                "azure.client_id (AZURE_CLIENT_ID) is not set".into(),
            ));
        }
        if self.azure.client_secret.is_empty() {
            return Err(ConfigError::MissingCredentials(
                "azure.client_secret (AZURE_CLIENT_SECRET) is not set".into(),
            ));
        }
        if self.d365.url.trim().is_empty() {
            return Err(ConfigError::MissingCredentials(
                "d365.url (D365_URL) is not set".into(),
            ));
        }

        if self.http.token_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "http.token_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "http.request_timeout_secs must be greater than zero".into(),
            ));
        }

        let resource = self.d365.url.trim().trim_end_matches('/').to_string();
        let service_path = self.d365.service_path.trim_matches('/');
        let endpoint = if service_path.is_empty() {
            format!("{}/", resource)
        } else {
            format!("{}/{}/", resource, service_path)
        };

        Ok(RuntimeConfig {
            authority,
            client_id: self.azure.client_id.trim().to_string(),
            client_secret: self.azure.client_secret.clone(),
            resource,
            endpoint,
            entity_set: self.d365.entity_set.clone(),
            token_timeout: Duration::from_secs(self.http.token_timeout_secs),
            request_timeout: Duration::from_secs(self.http.request_timeout_secs),
            max_retries: self.http.max_retries,
            retry_delay_ms: self.http.retry_delay_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[azure]
tenant_id = "abcdef01-2345-6789-abcd-ef0123456789"
client_id = "client-id"
client_secret = "secret"

[d365]
url = "https://abcdef01234567890abcdefdevaos.cloudax.dynamics.com/"

[http]
token_timeout_secs = 10
"#;

    #[test]
    fn test_parse_and_resolve() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let runtime = config.to_runtime().unwrap();

        assert_eq!(
            runtime.authority,
            "https://login.microsoftonline.com/abcdef01-2345-6789-abcd-ef0123456789"
        );
        assert_eq!(
            runtime.resource,
            "https://abcdef01234567890abcdefdevaos.cloudax.dynamics.com"
        );
        assert_eq!(
            runtime.endpoint,
            "https://abcdef01234567890abcdefdevaos.cloudax.dynamics.com/data/"
        );
        assert_eq!(runtime.entity_set, "ReleasedProductsV2");
        assert_eq!(runtime.token_timeout, Duration::from_secs(10));
        assert_eq!(runtime.max_retries, 3);
    }

    #[test]
    fn test_explicit_authority_wins() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.azure.authority = Some("https://login.example.com/tenant-id".into());
        let runtime = config.to_runtime().unwrap();
        assert_eq!(runtime.authority, "https://login.example.com/tenant-id");
    }

    #[test]
    fn test_missing_secret() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.azure.client_secret.clear();
        let err = config.to_runtime().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(_)));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.http.token_timeout_secs = 0;
        let err = config.to_runtime().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting(ref m) if m.contains("token_timeout_secs")));

        let mut config = Config::from_toml(SAMPLE).unwrap();
        config.http.request_timeout_secs = 0;
        let err = config.to_runtime().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting(ref m) if m.contains("request_timeout_secs")));
    }

    #[test]
    fn test_empty_config_is_rejected() {
        let err = Config::default().to_runtime().unwrap_err();
        assert!(err.to_string().contains("authority"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let runtime = Config::from_toml(SAMPLE).unwrap().to_runtime().unwrap();
        let debug = format!("{:?}", runtime);
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("<redacted>"));
    }
}

//! D365 OData Auth demo
//!
//! Reads the service metadata anonymously, then installs the
//! client-credentials factory and reads the first record of an entity set.

use anyhow::Context;
use d365_odata_auth::auth::ClientCredentialsFactory;
use d365_odata_auth::config::Config;
use d365_odata_auth::http::HttpClient;
use d365_odata_auth::odata::{ODataClient, QueryOptions};
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout only carries the record
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = Config::load_default()?;
    let runtime_config = config.to_runtime()?;

    tracing::info!(
        "Configured for {} with authority {}",
        runtime_config.endpoint,
        runtime_config.authority
    );

    let http_client = HttpClient::with_timeout(runtime_config.request_timeout)
        .context("Failed to build HTTP client")?;

    let mut client = ODataClient::new(
        runtime_config.endpoint.clone(),
        http_client.clone(),
        runtime_config.max_retries,
        runtime_config.retry_delay_ms,
    );

    // Metadata needs no authentication
    let metadata = client.fetch_metadata().await?;
    tracing::info!("Read entity data model: {} KB", metadata.len() / 1024);

    // From here on we need authentication. Construction validates the
    // authority but does not contact the identity provider.
    let factory = ClientCredentialsFactory::new(
        &runtime_config.authority,
        &runtime_config.client_id,
        &runtime_config.client_secret,
        &runtime_config.resource,
        runtime_config.token_timeout,
        http_client,
    )?;
    client.set_http_client_factory(Arc::new(factory));

    let options = QueryOptions {
        cross_company: true,
        ..Default::default()
    };

    tracing::info!("Reading entities from {}", runtime_config.entity_set);
    match client.first_entity(&runtime_config.entity_set, &options).await? {
        Some(record) => {
            println!("Only first entry:\n{}", serde_json::to_string_pretty(&record)?);
        }
        None => tracing::info!("Entity set {} is empty", runtime_config.entity_set),
    }

    Ok(())
}

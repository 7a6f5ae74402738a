//! Foreground sync of one connection.
//!
//! Uses the same service as the HTTP API, so the run is recorded in sync
//! history and honours the connection's sync lock.

use std::sync::Arc;

use socialspark_core::{ConnectionId, SyncOptions, SyncType};
use socialspark_integrations::{
    build_service,
    config::IntegrationsConfig,
    crypto::CredentialCipher,
    db::PgIntegrationStore,
    platforms::{AdapterRegistry, ApiClient},
};

/// Sync `connection_id` now and print the result as JSON.
///
/// # Errors
///
/// Returns an error for a malformed id or sync type, missing configuration,
/// or a sync that cannot start.
pub async fn run(
    connection_id: &str,
    types: &[String],
    limit: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let connection_id: ConnectionId = connection_id
        .parse()
        .map_err(|_| format!("Invalid connection id: {connection_id}"))?;
    let sync_types = types
        .iter()
        .map(|t| t.trim().parse::<SyncType>())
        .collect::<Result<Vec<_>, _>>()?;

    let config = IntegrationsConfig::from_env()?;
    let pool = socialspark_integrations::db::create_pool(&config.database_url).await?;

    // The worker is dropped: a CLI run never queues background syncs.
    let (service, _worker) = build_service(
        Arc::new(PgIntegrationStore::new(pool)),
        AdapterRegistry::with_builtin_adapters(),
        ApiClient::new()?,
        CredentialCipher::from_config(&config.encryption)?,
        &config.api_base_url,
        config.sync_worker,
    )
    .await?;

    tracing::info!(%connection_id, "Starting sync");
    let result = service
        .sync_store_data(connection_id, &sync_types, SyncOptions { limit })
        .await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

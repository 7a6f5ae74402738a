//! Platform descriptor commands.

use socialspark_core::builtin_platform_configs;
use socialspark_integrations::db::{IntegrationStore, PgIntegrationStore};

use super::{CommandError, connect};

/// Insert or refresh the built-in descriptors.
///
/// Existing rows are overwritten, including `is_active`.
pub async fn seed() -> Result<(), CommandError> {
    let store = PgIntegrationStore::new(connect().await?);

    for config in builtin_platform_configs() {
        store.upsert_platform_config(&config).await?;
        tracing::info!(platform = %config.platform, "Seeded platform config");
    }
    Ok(())
}

/// Print stored descriptors.
pub async fn list() -> Result<(), CommandError> {
    let store = PgIntegrationStore::new(connect().await?);
    let configs = store.load_platform_configs().await?;

    #[allow(clippy::print_stdout)]
    {
        if configs.is_empty() {
            println!("No platforms configured. Run `ss-cli platforms seed`.");
        }
        for config in configs {
            let fields: Vec<_> = config.api_fields.keys().map(String::as_str).collect();
            println!(
                "{:<12} {:<14} {:<8} auth={} fields={}",
                config.platform.as_str(),
                config.display_name,
                if config.is_active { "active" } else { "inactive" },
                config.auth_method.as_str(),
                fields.join(",")
            );
        }
    }
    Ok(())
}

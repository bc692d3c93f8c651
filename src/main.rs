/// Flowmint: workflow definition management
///
/// Boots the subsystem from environment configuration, reports the activity
/// catalog and the stored definitions, then exits.

use flowmint::{
    bootstrap::{bootstrap, init_tracing},
    config::Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::default();
    init_tracing(&config.logging);

    tracing::info!("Starting Flowmint...");
    let management = bootstrap(&config).await?;

    for descriptor in management.registry.list() {
        tracing::info!(
            kind = %descriptor.kind,
            version = descriptor.version,
            category = %descriptor.category,
            "Activity: {} ({} properties)",
            descriptor.display_name,
            descriptor.properties.len()
        );
    }

    for definition_id in management.store.list_definition_ids().await? {
        match management.store.get_latest(&definition_id).await {
            Ok(latest) => tracing::info!(
                definition_id = %definition_id,
                latest = latest.version,
                status = %latest.status,
                "Definition"
            ),
            Err(e) => tracing::warn!(definition_id = %definition_id, "Unreadable definition: {}", e),
        }
    }

    Ok(())
}

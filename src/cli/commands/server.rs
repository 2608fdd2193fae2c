use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{self, StorageBackend};
use crate::database::DatabaseManager;

pub async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let mut config = config::config().clone();
    if let Some(port) = port {
        config.api.port = port;
    }
    crate::app::serve(&config).await
}

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    if config::config().storage.backend == StorageBackend::Memory {
        anyhow::bail!("STORAGE_BACKEND=memory has no schema to migrate");
    }

    DatabaseManager::migrate().await?;
    output_success(&output_format, "Migrations applied", None)?;
    DatabaseManager::close_all().await;
    Ok(())
}

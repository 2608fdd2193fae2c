use serde_json::json;

use crate::app::AppState;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{self, StorageBackend};
use crate::database::open_store;
use crate::services::bootstrap;

pub async fn create_admin(
    name: &str,
    email: &str,
    password: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let config = config::config();
    if config.storage.backend == StorageBackend::Memory {
        anyhow::bail!("create-admin needs persistent storage; set STORAGE_BACKEND=postgres");
    }

    let store = open_store(config).await?;
    let state = AppState::new(store, config.sequence.clone());

    match bootstrap::create_admin(&state, name, email, password).await? {
        Some(user) => output_success(
            &output_format,
            &format!("Created admin '{}'", user.email),
            Some(json!({ "id": user.id, "email": user.email })),
        ),
        None => output_success(&output_format, &format!("A user with email '{}' already exists", email), None),
    }
}

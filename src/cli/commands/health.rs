use serde_json::Value;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

pub async fn ping(base_url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let response = reqwest::get(&url).await?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        let storage = body["data"]["storage"].as_str().unwrap_or("unknown");
        let degraded = body["data"]["degraded_identifiers"].as_u64().unwrap_or(0);
        output_success(
            &output_format,
            &format!("{} is up ({} storage, {} degraded identifiers)", base_url, storage, degraded),
            body.get("data").cloned(),
        )
    } else {
        output_error(
            &output_format,
            &format!("{} answered {}", url, status),
            Some("SERVER_UNHEALTHY"),
        )?;
        anyhow::bail!("health check failed with status {}", status)
    }
}

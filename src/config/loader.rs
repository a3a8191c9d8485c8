use std::path::Path;

use config::{Config, File, FileFormat};
use eyre::{Context, Result};

use crate::config::models::ProxyConfig;

/// Load configuration from a file using the config crate
/// Supports multiple formats: JSON, YAML, TOML, etc.
pub async fn load_config(config_path: &str) -> Result<ProxyConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously
pub fn load_config_sync(config_path: &str) -> Result<ProxyConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension. Unknown extensions parse as
    // JSON so a legacy "config.txt" holding JSON keeps working.
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("toml") => FileFormat::Toml,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Json,
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let proxy_config: ProxyConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(proxy_config)
}

/// Write a default configuration to the given path, pretty-printed so it is
/// pleasant to hand-edit. Used by the `init` command and by first-run bootstrap.
pub async fn write_default_config(config_path: &str) -> Result<ProxyConfig> {
    let config = ProxyConfig::default();
    let rendered = serde_json::to_string_pretty(&config)
        .context("Failed to serialize default configuration")?;

    tokio::fs::write(config_path, format!("{rendered}\n"))
        .await
        .with_context(|| format!("Failed to write default config to {config_path}"))?;

    Ok(config)
}

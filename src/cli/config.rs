use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BackendConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
}

/// Persisted CLI selection (`env.json`). Unset fields fall back to the app config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub backend_url: Option<String>,
    pub anon_key: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_ping: Option<DateTime<Utc>>,
    pub status: Option<ServerStatus>,
}

impl EnvironmentConfig {
    /// Backend settings after applying this selection on top of `base`
    pub fn backend(&self, base: &BackendConfig) -> BackendConfig {
        BackendConfig {
            url: self.backend_url.clone().unwrap_or_else(|| base.url.clone()),
            anon_key: self.anon_key.clone().unwrap_or_else(|| base.anon_key.clone()),
            request_timeout_secs: base.request_timeout_secs,
        }
    }

    pub fn update_ping(&mut self, status: ServerStatus) {
        self.last_ping = Some(Utc::now());
        self.status = Some(status);
    }
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("REALTY_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("realty").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

pub fn environment_config_path() -> anyhow::Result<PathBuf> {
    Ok(get_config_dir()?.join("env.json"))
}

pub fn load_environment_config() -> anyhow::Result<EnvironmentConfig> {
    let env_file = environment_config_path()?;

    if !env_file.exists() {
        return Ok(EnvironmentConfig::default());
    }

    let content = fs::read_to_string(env_file)?;
    let config: EnvironmentConfig = serde_json::from_str(&content)?;
    Ok(config)
}

pub fn save_environment_config(config: &EnvironmentConfig) -> anyhow::Result<()> {
    let env_file = environment_config_path()?;

    let content = serde_json::to_string_pretty(config)?;
    fs::write(env_file, content)?;
    Ok(())
}

pub async fn ping_server(base_url: &str) -> ServerStatus {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    match client.get(&url).timeout(std::time::Duration::from_secs(5)).send().await {
        Ok(response) if response.status().is_success() => ServerStatus::Up,
        _ => ServerStatus::Down,
    }
}

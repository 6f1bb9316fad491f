use clap::Subcommand;
use serde_json::json;
use url::Url;

use crate::cli::config::*;
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Select the auth/database backend")]
    Use {
        #[arg(help = "Backend base URL, e.g. http://localhost:54321")]
        url: String,
        #[arg(long, help = "Project anon key for this backend")]
        anon_key: Option<String>,
    },

    #[command(about = "Show the selected backend")]
    Current,

    #[command(about = "Health check a backend (defaults to the selected one)")]
    Ping {
        #[arg(help = "Backend base URL")]
        url: Option<String>,
    },
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ServerCommands::Use { url, anon_key } => {
            let parsed = Url::parse(&url).map_err(|e| anyhow::anyhow!("Invalid backend URL '{}': {}", url, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow::anyhow!("Backend URL must use http or https"));
            }

            let mut env_config = load_environment_config()?;
            let changed = env_config.backend_url.as_deref() != Some(url.as_str());
            env_config.backend_url = Some(url.clone());
            if anon_key.is_some() {
                env_config.anon_key = anon_key;
            }
            env_config.updated_at = Some(chrono::Utc::now());
            if changed {
                env_config.status = None;
                env_config.last_ping = None;
            }
            save_environment_config(&env_config)?;

            output_success(
                &output_format,
                &format!("Switched to backend '{}'", url),
                Some(json!({ "current_backend": url })),
            )
        }
        ServerCommands::Current => {
            let env_config = load_environment_config()?;
            match &env_config.backend_url {
                Some(url) => {
                    let details = json!({
                        "url": url,
                        "status": env_config.status,
                        "last_ping": env_config.last_ping.map(|t| t.to_rfc3339()),
                        "updated_at": env_config.updated_at
                    });
                    output_current_item(&output_format, "backend", url, details)
                }
                None => output_no_current_item(&output_format, "backend"),
            }
        }
        ServerCommands::Ping { url } => {
            let mut env_config = load_environment_config()?;
            let selected = env_config.backend(&config().backend).url;
            let target = url.clone().unwrap_or(selected);

            let status = ping_server(&target).await;
            if url.is_none() {
                env_config.update_ping(status);
                save_environment_config(&env_config)?;
            }

            match status {
                ServerStatus::Up => output_success(
                    &output_format,
                    &format!("Backend '{}' is up", target),
                    Some(json!({ "url": target, "status": status })),
                ),
                ServerStatus::Down => Err(anyhow::anyhow!("Backend '{}' is not responding", target)),
            }
        }
    }
}

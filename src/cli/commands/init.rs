use clap::Subcommand;
use serde_json::json;

use crate::cli::config::{environment_config_path, get_config_dir, load_environment_config, save_environment_config};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Subcommand)]
pub enum InitCommands {
    #[command(about = "Initialize configuration directory")]
    Config {
        #[arg(long, help = "Overwrite an existing env.json with the configured defaults")]
        force: bool,
    },
}

pub async fn handle(cmd: InitCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        InitCommands::Config { force } => {
            let config_dir = get_config_dir()?;
            let env_file = environment_config_path()?;

            let mut env_config = if force { Default::default() } else { load_environment_config()? };
            let created = force || !env_file.exists();
            if created {
                let backend = &config().backend;
                env_config.backend_url = Some(backend.url.clone());
                env_config.anon_key = Some(backend.anon_key.clone());
                env_config.updated_at = Some(chrono::Utc::now());
                save_environment_config(&env_config)?;
            }

            let message = if created {
                format!("Initialized configuration in {}", config_dir.display())
            } else {
                format!("Configuration already present in {}", config_dir.display())
            };
            output_success(
                &output_format,
                &message,
                Some(json!({
                    "config_dir": config_dir.display().to_string(),
                    "backend_url": env_config.backend_url
                })),
            )
        }
    }
}

// Composition root: wires the hosted client, persisted session and context together.

use std::sync::Arc;

use crate::auth::{FileSessionStore, HostedAuthClient};
use crate::cli::config::{get_config_dir, load_environment_config};
use crate::config::config;
use crate::session::{SessionContext, TracingNavigator};

/// Hosted client for the selected backend, persisting its session in the CLI config dir.
pub fn build_client() -> anyhow::Result<Arc<HostedAuthClient>> {
    let app = config();
    let backend = load_environment_config()?.backend(&app.backend);
    let store = Arc::new(FileSessionStore::in_dir(&get_config_dir()?));

    tracing::debug!(url = %backend.url, "using backend");
    Ok(Arc::new(HostedAuthClient::new(&backend, app.auth.refresh_margin_secs, store)?))
}

pub fn build_context(client: &Arc<HostedAuthClient>) -> Arc<SessionContext> {
    Arc::new(SessionContext::new(
        client.clone(),
        client.clone(),
        Arc::new(TracingNavigator),
        config().auth.clone(),
    ))
}

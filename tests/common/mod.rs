#![allow(dead_code)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tokio::task::JoinHandle;
use uuid::Uuid;

use realty_session::auth::{HostedAuthClient, MemorySessionStore, SessionStore};
use realty_session::config::{AuthConfig, BackendConfig, DevServerConfig};
use realty_session::devserver::store::NewAccount;
use realty_session::devserver::{router, DevServerState};
use realty_session::profile::Role;

pub const ANON_KEY: &str = "test-anon-key";
pub const ADMIN_EMAIL: &str = "admin@realty.test";
pub const ADMIN_PASSWORD: &str = "admin-pass";

/// Dev server running in-process on a free port. Each test gets its own, with an empty store.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: DevServerState,
    task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(configure: impl FnOnce(&mut DevServerConfig)) -> Result<Self> {
        let mut config = DevServerConfig {
            anon_key: ANON_KEY.to_string(),
            jwt_secret: "integration-test-secret".to_string(),
            password_hash_cost: 4,
            require_email_confirmation: true,
            seed_admin_email: Some(ADMIN_EMAIL.to_string()),
            seed_admin_password: Some(ADMIN_PASSWORD.to_string()),
            ..DevServerConfig::default()
        };
        configure(&mut config);

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test port")?;

        let state = DevServerState::new(config);
        let app = router(state.clone());
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            state,
            task,
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn backend(&self) -> BackendConfig {
        BackendConfig {
            url: self.base_url.clone(),
            anon_key: ANON_KEY.to_string(),
            request_timeout_secs: 5,
        }
    }

    pub fn client(&self) -> Result<Arc<HostedAuthClient>> {
        self.client_with_store(Arc::new(MemorySessionStore::new()))
    }

    pub fn client_with_store(&self, store: Arc<dyn SessionStore>) -> Result<Arc<HostedAuthClient>> {
        let auth = AuthConfig::default();
        Ok(Arc::new(HostedAuthClient::new(&self.backend(), auth.refresh_margin_secs, store)?))
    }

    /// Confirmed account with the given role, created directly in the store.
    pub fn account(&self, email: &str, password: &str, role: Role) -> Result<Uuid> {
        let account = self.state.store.create_account(NewAccount {
            email,
            password,
            full_name: "Integration User",
            phone: None,
            confirmed: true,
        })?;
        if role != Role::Client {
            let update = realty_session::auth::ProfileUpdate::role(role);
            self.state.store.update_profile(account.id, &update);
        }
        Ok(account.id)
    }

    pub fn confirmation_code(&self, email: &str) -> Option<String> {
        self.state.store.confirmation_token(email)
    }

    /// Raw HTTP client that already carries the apikey header
    pub fn http(&self) -> Result<reqwest::Client> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("apikey", reqwest::header::HeaderValue::from_static(ANON_KEY));
        Ok(reqwest::Client::builder().default_headers(headers).build()?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn temp_dir(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("realty-{}-{}", label, Uuid::new_v4().simple()))
}

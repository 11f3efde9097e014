//! Test server harness for E2E testing
//!
//! Provides `TestFaceServer` for spawning a real face service router on a
//! random port, wired to fixture keys and in-memory collaborators.

use crate::crypto_fixtures::fixture_key_store;
use crate::mocks::{MockFaceEmbedder, MockFaceIndex, MockIdentityBackend};
use face_service::config::Config;
use face_service::keys::KeyStore;
use face_service::routes::{self, AppState};
use face_service::tokens::{TokenIssuer, TokenVerifier};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Internal service key configured on every test server.
pub const TEST_INTERNAL_KEY: &str = "test-internal-service-key";

/// Registered test user returned by the default identity backend mock.
pub const TEST_USER_ID: &str = "user-0001";
pub const TEST_USER_EMAIL: &str = "ada@example.com";

/// Collaborators for a test server. Defaults: one live face, an empty
/// index, and a backend that creates `TEST_USER_ID`.
pub struct TestCollaborators {
    pub embedder: Arc<MockFaceEmbedder>,
    pub face_index: Arc<MockFaceIndex>,
    pub identity: Arc<MockIdentityBackend>,
}

impl Default for TestCollaborators {
    fn default() -> Self {
        Self {
            embedder: Arc::new(MockFaceEmbedder::single_live_face()),
            face_index: Arc::new(MockFaceIndex::empty()),
            identity: Arc::new(MockIdentityBackend::creating_user(
                TEST_USER_ID,
                TEST_USER_EMAIL,
            )),
        }
    }
}

/// Config accepted by `Config::from_vars`, pointing collaborators at
/// unroutable addresses (the mocks replace the real clients). Every test
/// client connects from 127.0.0.1, so the rate limit is off.
pub fn test_config() -> Result<Config, anyhow::Error> {
    test_config_with(&[])
}

/// `test_config` with some variables overridden.
pub fn test_config_with(overrides: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
    let mut vars: HashMap<String, String> = [
        ("BIND_ADDRESS", "127.0.0.1:0"),
        ("INTERNAL_SERVICE_KEY", TEST_INTERNAL_KEY),
        ("API_URL", "http://identity.invalid"),
        ("QDRANT_ENDPOINT", "http://qdrant.invalid"),
        ("EMBEDDING_SERVICE_URL", "http://embedder.invalid"),
        ("ALLOWED_ORIGINS_DEV", "http://localhost:3000"),
        ("RATE_LIMIT_PER_MINUTE", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    for (name, value) in overrides {
        vars.insert((*name).to_string(), (*value).to_string());
    }

    Ok(Config::from_vars(&vars)?)
}

/// Test harness for spawning the face service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> anyhow::Result<()> {
///     let server = TestFaceServer::spawn().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestFaceServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    collaborators: TestCollaborators,
    _handle: JoinHandle<()>,
}

impl TestFaceServer {
    /// Spawn with default collaborators.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(TestCollaborators::default()).await
    }

    /// Spawn with the given collaborators.
    pub async fn spawn_with(collaborators: TestCollaborators) -> Result<Self, anyhow::Error> {
        Self::spawn_with_config(test_config()?, collaborators).await
    }

    /// Spawn with an explicit config and collaborators.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Sign with fixture keys (no rotation unless the test rotates)
    /// - Start the HTTP server in the background
    pub async fn spawn_with_config(
        config: Config,
        collaborators: TestCollaborators,
    ) -> Result<Self, anyhow::Error> {
        let key_store = fixture_key_store()?;

        let state = Arc::new(AppState::new(
            config,
            key_store,
            collaborators.embedder.clone(),
            collaborators.face_index.clone(),
            collaborators.identity.clone(),
        )?);

        // A standalone recorder: installing a global one would fail on the
        // second server in the same test binary.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state.clone(), metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            collaborators,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn key_store(&self) -> &Arc<KeyStore> {
        &self.state.key_store
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.state.issuer
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.state.verifier
    }

    pub fn embedder(&self) -> &MockFaceEmbedder {
        &self.collaborators.embedder
    }

    pub fn face_index(&self) -> &MockFaceIndex {
        &self.collaborators.face_index
    }

    pub fn identity(&self) -> &MockIdentityBackend {
        &self.collaborators.identity
    }

    /// Client request builder with the internal key already attached.
    pub fn internal_get(&self, client: &reqwest::Client, path: &str) -> reqwest::RequestBuilder {
        client
            .get(format!("{}{path}", self.url()))
            .header("X-Internal-Key", TEST_INTERNAL_KEY)
    }
}

impl Drop for TestFaceServer {
    fn drop(&mut self) {
        // Abort the server task so the port is released when the test ends.
        self._handle.abort();
    }
}

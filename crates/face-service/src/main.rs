use face_service::config::Config;
use face_service::keys::{key_source_for, KeyStore};
use face_service::observability::metrics::init_metrics_recorder;
use face_service::routes::{self, AppState};
use face_service::services::{EmbeddingClient, IdentityClient, QdrantFaceIndex};
use face_service::tasks::KeyRotator;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "face_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Face Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        environment = ?config.environment,
        rotation_interval_secs = config.key_rotation_interval.as_secs(),
        token_ttl_secs = config.token_ttl.as_secs(),
        rate_limit_per_minute = config.rate_limit_per_minute,
        "Configuration loaded successfully"
    );

    // Signing keys are generated in memory; without a first key there is
    // nothing to sign with, so startup stops here.
    let key_source = key_source_for(config.environment);
    let key_store = Arc::new(
        KeyStore::new(key_source, config.key_rotation_interval).map_err(|e| {
            error!("Failed to initialize signing keys: {}", e);
            e
        })?,
    );

    info!(kid = %key_store.current_kid(), "Signing keys initialized");

    let embedder = Arc::new(EmbeddingClient::new(config.embedding_service_url.clone())?);
    let face_index = Arc::new(QdrantFaceIndex::new(
        config.qdrant_endpoint.clone(),
        config.qdrant_collection.clone(),
        config.qdrant_api_key.clone(),
    )?);
    let identity = Arc::new(IdentityClient::new(
        config.api_url.clone(),
        config.internal_service_key.clone(),
    )?);

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to install metrics recorder: {}", e);
        e
    })?;

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;
    let drain_period = config.drain_period;

    let state = Arc::new(AppState::new(
        config,
        Arc::clone(&key_store),
        embedder,
        face_index,
        identity,
    )?);

    let app = routes::build_routes(state, metrics_handle);

    let rotator = KeyRotator::new(Arc::clone(&key_store)).start();

    info!("Face Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(drain_period))
    .await?;

    rotator.stop().await;

    info!("Face Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is over.
async fn shutdown_signal(drain_period: Duration) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    if drain_period.is_zero() {
        info!("Skipping drain period (DRAIN_SECONDS=0)");
    } else {
        warn!("Draining connections for {} seconds...", drain_period.as_secs());
        tokio::time::sleep(drain_period).await;
        info!("Drain period complete");
    }
}

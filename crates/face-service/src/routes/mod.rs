//! HTTP routes for the face service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::errors::FaceError;
use crate::handlers;
use crate::keys::KeyStore;
use crate::middleware::{
    http_metrics_middleware, rate_limit, require_internal_key, InternalKeyState, RateLimiter,
    INTERNAL_KEY_HEADER,
};
use crate::services::{FaceAuthService, FaceEmbedder, FaceIndex, IdentityBackend, JwksPublisher};
use crate::tokens::{TokenIssuer, TokenVerifier};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::{
        predicate::{DefaultPredicate, Predicate, SizeAbove},
        CompressionLayer,
    },
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Largest accepted request body (multipart uploads included).
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

const COMPRESSION_MIN_BYTES: u16 = 1000;

const ANY_ORIGIN: &str = "*";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub key_store: Arc<KeyStore>,
    pub issuer: TokenIssuer,
    pub verifier: TokenVerifier,
    pub jwks: JwksPublisher,
    pub face_auth: FaceAuthService,
    pub internal_auth: Arc<InternalKeyState>,
    /// Absent when `RATE_LIMIT_PER_MINUTE` is 0.
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    /// Wire the token components around `key_store` and the face flows
    /// around the given collaborators.
    pub fn new(
        config: Config,
        key_store: Arc<KeyStore>,
        embedder: Arc<dyn FaceEmbedder>,
        face_index: Arc<dyn FaceIndex>,
        identity: Arc<dyn IdentityBackend>,
    ) -> Result<Self, FaceError> {
        let issuer = TokenIssuer::new(Arc::clone(&key_store), config.token_ttl);
        let verifier = TokenVerifier::new(Arc::clone(&key_store), config.jwt_clock_skew);
        let jwks = JwksPublisher::new(Arc::clone(&key_store));
        let face_auth = FaceAuthService::new(
            embedder,
            face_index,
            identity,
            issuer.clone(),
            config.face_match_threshold,
        );
        let internal_auth = Arc::new(InternalKeyState::new(&config.internal_service_key)?);
        let rate_limiter = (config.rate_limit_per_minute > 0)
            .then(|| Arc::new(RateLimiter::new(config.rate_limit_per_minute)));

        Ok(Self {
            config,
            key_store,
            issuer,
            verifier,
            jwks,
            face_auth,
            internal_auth,
            rate_limiter,
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/metrics` - Prometheus metrics - public
/// - `/api/verify-face`, `/api/register-face` - Face flows - public, per-IP
///   rate limited
/// - `/internal/jwks`, `/internal/keys/rotation`, `/internal/tokens/verify`
///   - require `X-Internal-Key`
/// - CORS, gzip compression, 10 MiB body limit, 30 second timeout
/// - HTTP metrics middleware (outermost)
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    let health_routes = Router::new().route("/health", get(handlers::health_check));

    let mut api_routes = Router::new()
        .route("/api/verify-face", post(handlers::handle_verify_face))
        .route("/api/register-face", post(handlers::handle_register_face));
    if let Some(limiter) = state.rate_limiter.clone() {
        api_routes = api_routes.route_layer(middleware::from_fn_with_state(limiter, rate_limit));
    }
    let api_routes = api_routes.with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let internal_routes = Router::new()
        .route("/internal/jwks", get(handlers::handle_get_jwks))
        .route("/internal/keys/rotation", get(handlers::handle_rotation_info))
        .route("/internal/tokens/verify", post(handlers::handle_introspect))
        .route_layer(middleware::from_fn_with_state(
            state.internal_auth.clone(),
            require_internal_key,
        ))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. DefaultBodyLimit / TimeoutLayer (innermost)
    // 2. CompressionLayer
    // 3. CorsLayer
    // 4. TraceLayer
    // 5. http_metrics_middleware (outermost)
    health_routes
        .merge(api_routes)
        .merge(metrics_routes)
        .merge(internal_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            CompressionLayer::new().compress_when(
                DefaultPredicate::new().and(SizeAbove::new(COMPRESSION_MIN_BYTES)),
            ),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// `*` among the origins allows any origin. It is served by echoing the
/// request's `Origin`, since a literal wildcard cannot carry credentials.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|origin| origin == ANY_ORIGIN) {
        warn!(target: "face.routes", "CORS allows any origin");
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(target: "face.routes", origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(INTERNAL_KEY_HEADER),
        ])
        .allow_credentials(true)
}

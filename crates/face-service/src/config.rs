use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::ops::RangeInclusive;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8000";
pub const DEFAULT_ROTATION_INTERVAL_MINUTES: u64 = 15;
pub const DEFAULT_TOKEN_TTL_MINUTES: u64 = 5;
pub const DEFAULT_QDRANT_COLLECTION: &str = "faces";
pub const DEFAULT_FACE_MATCH_THRESHOLD: f32 = 0.85;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 5;

const ROTATION_INTERVAL_RANGE: RangeInclusive<u64> = 1..=1440;
const TOKEN_TTL_RANGE: RangeInclusive<u64> = 1..=60;
const RATE_LIMIT_RANGE: RangeInclusive<u64> = 0..=10_000;

/// Deployment environment; selects the key source and the CORS origin list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: Option<&String>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if value == "production" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub environment: Environment,
    pub key_rotation_interval: Duration,
    pub token_ttl: Duration,
    pub jwt_clock_skew: Duration,
    pub internal_service_key: SecretString,
    pub api_url: String,
    pub qdrant_endpoint: String,
    pub qdrant_api_key: Option<SecretString>,
    pub qdrant_collection: String,
    pub face_match_threshold: f32,
    pub embedding_service_url: String,
    pub allowed_origins: Vec<String>,
    /// Requests per client IP per minute on `/api` routes; 0 disables the limit.
    pub rate_limit_per_minute: u32,
    pub drain_period: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let environment = Environment::parse(vars.get("APP_ENV"));

        let rotation_minutes = parse_bounded(
            vars,
            "KEY_ROTATION_INTERVAL_MINUTES",
            DEFAULT_ROTATION_INTERVAL_MINUTES,
            ROTATION_INTERVAL_RANGE,
        )?;

        let ttl_minutes = parse_bounded(
            vars,
            "TOKEN_TTL_MINUTES",
            DEFAULT_TOKEN_TTL_MINUTES,
            TOKEN_TTL_RANGE,
        )?;

        let clock_skew_seconds = parse_bounded(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
            0..=MAX_CLOCK_SKEW.as_secs(),
        )?;

        let internal_service_key = SecretString::from(required(vars, "INTERNAL_SERVICE_KEY")?);
        let api_url = trim_trailing_slash(required(vars, "API_URL")?);
        let qdrant_endpoint = trim_trailing_slash(required(vars, "QDRANT_ENDPOINT")?);
        let embedding_service_url = trim_trailing_slash(required(vars, "EMBEDDING_SERVICE_URL")?);

        let qdrant_api_key = vars
            .get("QDRANT_API")
            .filter(|value| !value.is_empty())
            .map(|value| SecretString::from(value.clone()));

        let qdrant_collection = vars
            .get("QDRANT_COLLECTION")
            .filter(|value| !value.is_empty())
            .cloned()
            .unwrap_or_else(|| DEFAULT_QDRANT_COLLECTION.to_string());

        let face_match_threshold = match vars.get("FACE_MATCH_THRESHOLD") {
            Some(raw) => {
                let value: f32 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    name: "FACE_MATCH_THRESHOLD".to_string(),
                    reason: format!("'{raw}' is not a number"),
                })?;
                if !(0.0..=1.0).contains(&value) {
                    return Err(ConfigError::InvalidValue {
                        name: "FACE_MATCH_THRESHOLD".to_string(),
                        reason: format!("{value} is outside 0.0..=1.0"),
                    });
                }
                value
            }
            None => DEFAULT_FACE_MATCH_THRESHOLD,
        };

        let origins_var = if environment.is_production() {
            "ALLOWED_ORIGINS"
        } else {
            "ALLOWED_ORIGINS_DEV"
        };
        let allowed_origins = vars
            .get(origins_var)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let rate_limit_per_minute = parse_bounded(
            vars,
            "RATE_LIMIT_PER_MINUTE",
            u64::from(DEFAULT_RATE_LIMIT_PER_MINUTE),
            RATE_LIMIT_RANGE,
        )
        .map(|value| u32::try_from(value).unwrap_or(u32::MAX))?;

        let drain_seconds = parse_bounded(vars, "DRAIN_SECONDS", 0, 0..=300)?;

        Ok(Config {
            bind_address,
            environment,
            key_rotation_interval: Duration::from_secs(rotation_minutes * 60),
            token_ttl: Duration::from_secs(ttl_minutes * 60),
            jwt_clock_skew: Duration::from_secs(clock_skew_seconds),
            internal_service_key,
            api_url,
            qdrant_endpoint,
            qdrant_api_key,
            qdrant_collection,
            face_match_threshold,
            embedding_service_url,
            allowed_origins,
            rate_limit_per_minute,
            drain_period: Duration::from_secs(drain_seconds),
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_bounded(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    range: RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let Some(raw) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        name: name.to_string(),
        reason: format!("'{raw}' is not a non-negative integer"),
    })?;

    if !range.contains(&value) {
        return Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!(
                "{value} is outside {}..={}",
                range.start(),
                range.end()
            ),
        });
    }

    Ok(value)
}

fn trim_trailing_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

//! Gateway configuration.
//!
//! # Configuration Layers
//!
//! 1. **Process settings** come from environment variables (or a `.env`
//!    file) with development defaults. See [`Config`].
//! 2. **Gateway settings** (routes and rate limiting) come from a TOML file
//!    named by `GATEWAY_CONFIG`. See [`GatewayConfig`]. Without a file the
//!    gateway starts with no routes and rate limiting disabled.
//!
//! # Example Gateway File
//!
//! ```toml
//! [rate-limiting]
//! enabled = true
//! default-limit = { requests-per-minute = 60, burst-size = 10 }
//!
//! [rate-limiting.user-limits]
//! admin = { requests-per-minute = 600 }
//!
//! [rate-limiting.path-limits]
//! "/gateway/catalog/.*" = { requests-per-minute = 30, burst-size = 5 }
//!
//! [[routes]]
//! id = "catalog"
//! path = "/gateway/catalog/**"
//! service-name = "catalog"
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{RateLimitConfig, RateLimitStrategy, RouteDefinition};
use crate::router::PathTemplate;

/// Upper bound on `retry-attempts` for a single route.
pub const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Process settings loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// let gateway = GatewayConfig::load(&config)?;
/// println!("Gateway will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    /// Maximum request body size in bytes (default: 10MB).
    /// Bodies are buffered before forwarding, so this also bounds memory.
    pub max_request_body_size: usize,

    // =========================================================================
    // Gateway Configuration
    // =========================================================================
    /// Path of the TOML gateway file (routes + rate limiting)
    pub gateway_config_path: Option<PathBuf>,

    /// Register the development `discovery` and `catalog` instances at startup
    pub seed_default_instances: bool,

    /// Mount the `/debug` introspection and admin endpoints
    pub debug_endpoints: bool,

    /// Overrides `rate-limiting.enabled` from the gateway file when set
    pub rate_limit_enabled: Option<bool>,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a variable cannot be parsed
    /// (e.g., non-numeric PORT value) or fails validation.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 8080)?,
            max_request_body_size: Self::parse_env("MAX_REQUEST_BODY_SIZE", 10 * 1024 * 1024)?, // 10MB

            gateway_config_path: env::var("GATEWAY_CONFIG")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            seed_default_instances: Self::parse_env("SEED_DEFAULT_INSTANCES", true)?,
            debug_endpoints: Self::parse_env("DEBUG_ENDPOINTS", true)?,
            rate_limit_enabled: Self::parse_optional_env("RATE_LIMIT_ENABLED")?,

            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            metrics_port: Self::parse_env("METRICS_PORT", 9090)?,
        };

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_enabled()
            .then(|| SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }

    /// Parse an environment variable into the specified type with a default value.
    fn parse_env<T>(name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(Self::parse_optional_env(name)?.unwrap_or(default))
    }

    fn parse_optional_env<T>(name: &str) -> AppResult<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(None),
        }
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead.
impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            gateway_config_path: None,
            seed_default_instances: true,
            debug_endpoints: true,
            rate_limit_enabled: None,
            log_level: "info".to_string(),
            metrics_port: 9090,
        }
    }
}

// =============================================================================
// Gateway file
// =============================================================================

/// Routes and rate limiting, read from the gateway file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GatewayConfig {
    #[serde(default)]
    pub rate_limiting: RateLimitSettings,
    /// Ordered; wildcard and template routes match in this order
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
}

impl GatewayConfig {
    /// Load the gateway file named by `config`, apply environment overrides
    /// and validate the result.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the file cannot be read or parsed,
    /// or if validation fails.
    pub fn load(config: &Config) -> AppResult<Self> {
        let mut gateway = match &config.gateway_config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                info!("GATEWAY_CONFIG not set, starting with no routes");
                Self::default()
            }
        };

        if let Some(enabled) = config.rate_limit_enabled {
            gateway.rate_limiting.enabled = enabled;
        }

        gateway.validate()?;
        Ok(gateway)
    }

    /// Parse a gateway file without validating it.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;
        let gateway = Self::from_toml_str(&contents)?;
        info!(
            path = %path.display(),
            routes = gateway.routes.len(),
            "Loaded gateway configuration"
        );
        Ok(gateway)
    }

    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        toml::from_str(contents)
            .map_err(|e| AppError::ConfigError(format!("Invalid gateway configuration: {e}")))
    }

    /// Check routes and rate limits for consistency.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` describing the first problem found.
    pub fn validate(&self) -> AppResult<()> {
        self.rate_limiting.validate()?;

        let mut ids = HashSet::new();
        let mut paths = HashSet::new();
        for route in &self.routes {
            if !ids.insert(route.id.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate route id: {}",
                    route.id
                )));
            }
            if !paths.insert(route.path.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate route path: {}",
                    route.path
                )));
            }
            if !route.path.starts_with('/') {
                return Err(AppError::ConfigError(format!(
                    "Route {} path must start with '/': {}",
                    route.id, route.path
                )));
            }
            if route.service_name.is_empty() {
                return Err(AppError::ConfigError(format!(
                    "Route {} has an empty service-name",
                    route.id
                )));
            }
            if route.retry_attempts > MAX_RETRY_ATTEMPTS {
                return Err(AppError::ConfigError(format!(
                    "Route {} retry-attempts must be at most {MAX_RETRY_ATTEMPTS}, got {}",
                    route.id, route.retry_attempts
                )));
            }
            if route.is_template() {
                PathTemplate::parse(&route.path).map_err(|e| {
                    AppError::ConfigError(format!("Route {} has an invalid path: {e}", route.id))
                })?;
            }
        }

        Ok(())
    }
}

/// Backing store named in `rate-limiting.storage.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageType {
    #[default]
    Memory,
    Redis,
    Hybrid,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "MEMORY",
            Self::Redis => "REDIS",
            Self::Hybrid => "HYBRID",
        }
    }
}

/// `rate-limiting.storage`. Buckets are always kept in memory; remote types
/// are accepted only when they may fall back to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub redis_key_prefix: String,
    pub fallback_to_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Memory,
            redis_key_prefix: "gateway:ratelimit:".to_string(),
            fallback_to_memory: true,
        }
    }
}

impl StorageConfig {
    /// Description of the store actually in use, for introspection.
    pub fn describe(&self) -> String {
        match self.storage_type {
            StorageType::Memory => StorageType::Memory.as_str().to_string(),
            other => format!("MEMORY (fallback from {})", other.as_str()),
        }
    }
}

/// The `[rate-limiting]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RateLimitSettings {
    pub enabled: bool,
    /// Bypass limiting for paths under `debug-path-prefix`
    pub skip_debug_endpoints: bool,
    pub default_strategy: RateLimitStrategy,
    pub default_limit: RateLimitConfig,
    /// Parsed and reported; no process-wide bucket enforces it
    pub global_limit: RateLimitConfig,
    /// Keyed by exact client identifier
    pub user_limits: HashMap<String, RateLimitConfig>,
    /// Keyed by a regex that must match the whole request path. Checked in
    /// key order; the first match wins.
    pub path_limits: BTreeMap<String, RateLimitConfig>,
    pub storage: StorageConfig,
    pub health_path_prefix: String,
    pub metrics_path_prefix: String,
    pub debug_path_prefix: String,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            skip_debug_endpoints: true,
            default_strategy: RateLimitStrategy::TokenBucket,
            default_limit: RateLimitConfig::per_minute(60).with_burst(10),
            global_limit: RateLimitConfig::per_minute(1000).with_burst(100),
            user_limits: HashMap::new(),
            path_limits: BTreeMap::new(),
            storage: StorageConfig::default(),
            health_path_prefix: "/health".to_string(),
            metrics_path_prefix: "/prometheus".to_string(),
            debug_path_prefix: "/debug".to_string(),
        }
    }
}

impl RateLimitSettings {
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` for zero limits, unsupported
    /// strategies, bad path patterns or a remote store without fallback.
    pub fn validate(&self) -> AppResult<()> {
        check_strategy("default-strategy", self.default_strategy)?;
        check_limit("default-limit", &self.default_limit)?;
        check_limit("global-limit", &self.global_limit)?;

        for (client, limit) in &self.user_limits {
            check_limit(&format!("user-limits.{client}"), limit)?;
        }

        for (pattern, limit) in &self.path_limits {
            check_limit(&format!("path-limits.{pattern}"), limit)?;
            anchored_regex(pattern).map_err(|e| {
                AppError::ConfigError(format!("Invalid path-limits pattern {pattern:?}: {e}"))
            })?;
        }

        match self.storage.storage_type {
            StorageType::Memory => {}
            other if self.storage.fallback_to_memory => {
                warn!(
                    storage = other.as_str(),
                    "Rate limit storage backend not available, falling back to MEMORY"
                );
            }
            other => {
                return Err(AppError::ConfigError(format!(
                    "Rate limit storage {} is not available and fallback-to-memory is false",
                    other.as_str()
                )));
            }
        }

        Ok(())
    }
}

/// Compile a path-limit pattern so that it must match the whole path.
pub fn anchored_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

fn check_limit(name: &str, limit: &RateLimitConfig) -> AppResult<()> {
    if limit.requests_per_minute == 0 {
        return Err(AppError::ConfigError(format!(
            "{name}: requests-per-minute must be greater than 0"
        )));
    }
    if limit.burst_size == 0 {
        return Err(AppError::ConfigError(format!(
            "{name}: burst-size must be greater than 0"
        )));
    }
    check_strategy(name, limit.strategy)
}

fn check_strategy(name: &str, strategy: RateLimitStrategy) -> AppResult<()> {
    match strategy {
        RateLimitStrategy::TokenBucket => Ok(()),
        other => Err(AppError::ConfigError(format!(
            "{name}: rate limit strategy {other:?} is not implemented, use TOKEN_BUCKET"
        ))),
    }
}

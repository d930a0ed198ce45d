//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Server configuration (host, port)
    pub server: ServerSettings,

    /// Database configuration (PostgreSQL)
    pub database: DatabaseSettings,

    /// Redis configuration (rate limiting backend)
    pub redis: RedisSettings,

    /// Session JWT verification settings
    pub jwt: JwtSettings,

    /// OAuth 2.0 lifetimes and registry limits
    pub oauth: OAuthSettings,

    /// Rate limiting configuration
    pub rate_limit: RateLimitSettings,

    /// CORS configuration
    pub cors: CorsSettings,

    /// WebSocket gateway configuration
    pub websocket: WebSocketSettings,

    /// Log output configuration
    pub log: LogSettings,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// Server binding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,

    /// Port number to listen on
    pub port: u16,
}

/// PostgreSQL database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections to maintain
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    pub acquire_timeout: u64,

    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    /// Redis connection URL. Rate limiting is disabled when unset.
    pub url: Option<String>,
}

/// Session JWT settings.
///
/// Sessions are issued by the account service; this server only verifies them.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared secret used to verify session tokens
    pub secret: String,
}

/// OAuth 2.0 server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthSettings {
    /// Authorization code lifetime in seconds
    pub authorization_code_ttl_secs: i64,

    /// Access token lifetime in seconds
    pub access_token_ttl_secs: i64,

    /// Refresh token lifetime in days
    pub refresh_token_ttl_days: i64,

    /// Maximum number of applications per developer
    pub max_applications_per_developer: usize,

    /// Requests per minute granted to newly created applications
    pub default_rate_limit: i32,

    /// Interval between expired grant/token purges, in seconds
    pub cleanup_interval_secs: u64,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            authorization_code_ttl_secs: 600,
            access_token_ttl_secs: 3600,
            refresh_token_ttl_days: 30,
            max_applications_per_developer: 2,
            default_rate_limit: 1000,
            cleanup_interval_secs: 3600,
        }
    }
}

/// Rate limiting configuration for the public OAuth endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    /// Requests per minute per client IP on /oauth endpoints
    pub oauth_requests_per_minute: u32,

    /// Gateway handshakes per minute per client IP
    pub gateway_connects_per_minute: u32,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsSettings {
    /// Allowed origins (comma-separated in env)
    pub allowed_origins: Vec<String>,
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketSettings {
    /// Maximum message size in bytes (default: 64KB)
    pub max_message_size: usize,

    /// Maximum frame size in bytes (default: 16KB)
    pub max_frame_size: usize,

    /// Time allowed for the `auth` frame when the id is not in the handshake
    pub handshake_timeout_secs: u64,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// `pretty` or `json`
    pub format: String,
}

/// Minimum required length for the session JWT secret (256 bits = 32 bytes)
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if a value fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout", 30)?
            .set_default("database.run_migrations", true)?
            .set_default("oauth.authorization_code_ttl_secs", 600)?
            .set_default("oauth.access_token_ttl_secs", 3600)?
            .set_default("oauth.refresh_token_ttl_days", 30)?
            .set_default("oauth.max_applications_per_developer", 2)?
            .set_default("oauth.default_rate_limit", 1000)?
            .set_default("oauth.cleanup_interval_secs", 3600)?
            .set_default("rate_limit.oauth_requests_per_minute", 30)?
            .set_default("rate_limit.gateway_connects_per_minute", 10)?
            .set_default("cors.allowed_origins", vec!["http://localhost:3000"])?
            .set_default("websocket.max_message_size", 65536_i64)?
            .set_default("websocket.max_frame_size", 16384_i64)?
            .set_default("websocket.handshake_timeout_secs", 10_i64)?
            .set_default("log.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__OAUTH__ACCESS_TOKEN_TTL_SECS=900 -> oauth.access_token_ttl_secs = 900
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", std::env::var("SERVER_HOST").ok())?
            .set_override_option("server.port", std::env::var("SERVER_PORT").ok())?
            .set_override_option("database.url", std::env::var("DATABASE_URL").ok())?
            .set_override_option("redis.url", std::env::var("REDIS_URL").ok())?
            .set_override_option("jwt.secret", std::env::var("JWT_SECRET").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.validate()?;
                Ok(settings)
            })
    }

    /// Reject configurations that would weaken the server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "JWT secret must be at least {} characters. Current length: {}",
                MIN_JWT_SECRET_LENGTH,
                self.jwt.secret.len()
            )));
        }
        if self.oauth.authorization_code_ttl_secs <= 0
            || self.oauth.access_token_ttl_secs <= 0
            || self.oauth.refresh_token_ttl_days <= 0
        {
            return Err(ConfigError::Message(
                "OAuth lifetimes must be positive".into(),
            ));
        }
        if self.oauth.max_applications_per_developer == 0 {
            return Err(ConfigError::Message(
                "oauth.max_applications_per_developer must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Get the full server address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

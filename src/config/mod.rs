//! Configuration management for auth-gateway
//!
//! Configuration is read once at startup from a YAML file or from
//! environment variables and is never mutated afterwards. Keys accept both
//! snake_case and the PascalCase names used by existing deployments
//! (`ConnectionString`, `AuthConfig.Username`, ...).

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix
const ENV_PREFIX: &str = "AUTH_GATEWAY_";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Connection string of the default audit database
    #[serde(default, alias = "ConnectionString")]
    pub connection_string: Option<String>,

    /// Credentials and target database
    #[serde(default, alias = "AuthConfig")]
    pub auth: Option<AuthConfig>,

    /// Failure lockout policy
    #[serde(default)]
    pub lockout: LockoutSettings,

    /// Bearer session policy
    #[serde(default)]
    pub session: SessionSettings,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables prefixed `AUTH_GATEWAY_`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(host) = env_var("SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = env_var("SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        config.connection_string = env_var("CONNECTION_STRING");

        let username = env_var("AUTH_USERNAME");
        let password = env_var("AUTH_PASSWORD");
        let target_db = env_var("AUTH_TARGET_DB");
        let auto_login_secret = env_var("AUTH_AUTO_LOGIN_SECRET");
        // The section only exists when at least one of its keys is set.
        if username.is_some()
            || password.is_some()
            || target_db.is_some()
            || auto_login_secret.is_some()
        {
            config.auth = Some(AuthConfig {
                username,
                password,
                target_db,
                auto_login_secret,
            });
        }

        if let Some(max_failures) = env_var("LOCKOUT_MAX_FAILURES") {
            config.lockout.max_failures = max_failures
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid lockout max_failures".to_string()))?;
        }
        if let Some(secs) = env_var("LOCKOUT_DURATION_SECS") {
            config.lockout.lockout_duration_secs = secs
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid lockout duration".to_string()))?;
        }
        if let Some(secs) = env_var("SESSION_TTL_SECS") {
            config.session.ttl_secs = secs
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid session ttl".to_string()))?;
        }
        if let Some(secs) = env_var("SESSION_SWEEP_INTERVAL_SECS") {
            config.session.sweep_interval_secs = secs
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid session sweep interval".to_string()))?;
        }

        if let Some(enabled) = env_var("OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Some(endpoint) = env_var("OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }
        if let Some(level) = env_var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = env_var("LOG_FORMAT") {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check that every required value is present
    ///
    /// Returns the immutable credentials the gateway runs with. Any missing
    /// value is fatal: the process must not serve traffic without it.
    pub fn validate(&self) -> Result<Credentials, ConfigError> {
        let connection_string = self
            .connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("ConnectionString".to_string()))?;

        let auth = self
            .auth
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("AuthConfig".to_string()))?;

        let username = required(&auth.username, "AuthConfig.Username")?;
        let password = required(&auth.password, "AuthConfig.Password")?;
        let target_db = required(&auth.target_db, "AuthConfig.TargetDB")?;
        let auto_login_secret = required(&auth.auto_login_secret, "AuthConfig.AutoLoginSecret")?;

        if !is_valid_database_name(&target_db) {
            return Err(ConfigError::InvalidValue(format!(
                "AuthConfig.TargetDB must match [A-Za-z0-9_-]+, got {:?}",
                target_db
            )));
        }

        if self.lockout.max_failures == 0 {
            return Err(ConfigError::InvalidValue(
                "lockout.max_failures must be at least 1".to_string(),
            ));
        }

        if self.lockout.lockout_duration_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "lockout.lockout_duration_secs must be positive".to_string(),
            ));
        }

        if self.session.ttl_secs == 0 || self.session.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "session.ttl_secs and session.sweep_interval_secs must be positive".to_string(),
            ));
        }

        Ok(Credentials {
            connection_string: connection_string.to_string(),
            username,
            password,
            target_db,
            auto_login_secret,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name)).ok()
}

fn required(value: &Option<String>, name: &str) -> Result<String, ConfigError> {
    value
        .as_ref()
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingRequired(name.to_string()))
}

/// Check that a database name can be used as a file name
pub fn is_valid_database_name(name: &str) -> bool {
    let re = regex_lite::Regex::new(r"^[A-Za-z0-9_-]+$")
        .expect("Invalid regex pattern for database names");
    re.is_match(name)
}

/// Validated credentials, immutable after startup
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub connection_string: String,
    pub username: String,
    pub password: String,
    pub target_db: String,
    pub auto_login_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("connection_string", &self.connection_string)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("target_db", &self.target_db)
            .field("auto_login_secret", &"<redacted>")
            .finish()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8181
}

/// `AuthConfig` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Expected username
    #[serde(default, alias = "Username")]
    pub username: Option<String>,

    /// Expected password (plain text or an Argon2 PHC string)
    #[serde(default, alias = "Password")]
    pub password: Option<String>,

    /// Name of the audit database
    #[serde(default, alias = "TargetDB")]
    pub target_db: Option<String>,

    /// Shared secret accepted by `/auth-secret`
    #[serde(default, alias = "AutoLoginSecret")]
    pub auto_login_secret: Option<String>,
}

/// Failure lockout policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockoutSettings {
    /// Consecutive failures that trigger a lockout
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,

    /// Lockout length in seconds
    #[serde(default = "default_lockout_duration")]
    pub lockout_duration_secs: u64,
}

impl LockoutSettings {
    pub fn lockout_duration(&self) -> Duration {
        Duration::from_secs(self.lockout_duration_secs)
    }
}

impl Default for LockoutSettings {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            lockout_duration_secs: default_lockout_duration(),
        }
    }
}

fn default_max_failures() -> u32 {
    5
}

fn default_lockout_duration() -> u64 {
    900 // 15 minutes
}

/// Bearer session policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSettings {
    /// Token lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Interval of the expired-token sweep in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl SessionSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_session_ttl() -> u64 {
    7200 // 2 hours
}

fn default_sweep_interval() -> u64 {
    300
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OTLP export is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name reported to the collector
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "auth-gateway".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax; unknown variables are left untouched.
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `tally.toml` in the working directory (or the path in
//! `TALLY_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tally_adapter_table_azure::SasToken;
use tally_app::services::counter_service::RetryPolicy;

const DEFAULT_CONFIG_PATH: &str = "tally.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Counter store settings.
    pub store: StoreConfig,
    /// Increment behaviour.
    pub counter: CounterConfig,
    /// HTTP surface settings.
    pub http: HttpConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Which table implementation backs the counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Azure Table Storage.
    #[default]
    Azure,
    /// Local `SQLite` file.
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "azure" => Ok(Self::Azure),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::Validation(format!(
                "unknown store backend {other:?} (expected `azure` or `sqlite`)"
            ))),
        }
    }
}

/// Counter store configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Selected backend.
    pub backend: StoreBackend,
    /// Azure Table settings, used when `backend = "azure"`.
    pub azure: AzureConfig,
    /// `SQLite` settings, used when `backend = "sqlite"`.
    pub sqlite: SqliteConfig,
}

/// Azure Table Storage credentials and endpoint.
#[derive(Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Storage account name.
    pub account: String,
    /// Shared access signature granting read/write on the table.
    pub sas_token: String,
    /// Endpoint override (e.g. Azurite).
    pub endpoint: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("account", &self.account)
            .field("sas_token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Increment behaviour.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Read-increment-write attempts per request before giving up.
    pub max_attempts: u32,
}

/// HTTP surface configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Origins allowed by CORS; empty disables CORS, `*` allows any.
    pub cors_allowed_origins: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Config {
    /// Load configuration from the config file (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, an
    /// override does not parse, or the result fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("TALLY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("TALLY_HOST") {
            self.server.host = val;
        }
        if let Some(val) = lookup("TALLY_PORT") {
            self.server.port = parse_number("TALLY_PORT", &val)?;
        }
        if let Some(val) = lookup("TALLY_BIND") {
            let Some((host, port)) = val.rsplit_once(':') else {
                return Err(ConfigError::Validation(format!(
                    "TALLY_BIND must be host:port, got {val:?}"
                )));
            };
            self.server.host = host.to_string();
            self.server.port = parse_number("TALLY_BIND", port)?;
        }
        if let Some(val) = lookup("TALLY_STORE") {
            self.store.backend = val.parse()?;
        }
        if let Some(val) = lookup("AZURE_STORAGE_ACCOUNT") {
            self.store.azure.account = val;
        }
        if let Some(val) = lookup("AZURE_STORAGE_SAS_TOKEN") {
            self.store.azure.sas_token = val;
        }
        if let Some(val) = lookup("AZURE_TABLE_ENDPOINT") {
            self.store.azure.endpoint = Some(val);
        }
        if let Some(val) = lookup("TALLY_DATABASE_URL") {
            self.store.sqlite.url = val;
        }
        if let Some(val) = lookup("TALLY_MAX_ATTEMPTS") {
            self.counter.max_attempts = parse_number("TALLY_MAX_ATTEMPTS", &val)?;
        }
        if let Some(val) = lookup("TALLY_CORS_ORIGINS") {
            self.http.cors_allowed_origins = val
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(ToString::to_string)
                .collect();
        }
        if let Some(val) = lookup("TALLY_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.counter.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "counter.max_attempts must be at least 1".to_string(),
            ));
        }
        match self.store.backend {
            StoreBackend::Azure => {
                if self.store.azure.account.is_empty() {
                    return Err(ConfigError::Validation(
                        "azure backend needs store.azure.account or AZURE_STORAGE_ACCOUNT"
                            .to_string(),
                    ));
                }
                if self.store.azure.sas_token.is_empty() {
                    return Err(ConfigError::Validation(
                        "azure backend needs store.azure.sas_token or AZURE_STORAGE_SAS_TOKEN"
                            .to_string(),
                    ));
                }
            }
            StoreBackend::Sqlite => {
                if self.store.sqlite.url.is_empty() {
                    return Err(ConfigError::Validation(
                        "sqlite backend needs store.sqlite.url".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Retry policy for the counter service.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.counter.max_attempts)
    }

    /// Settings for the Azure Table adapter.
    #[must_use]
    pub fn azure_table(&self) -> tally_adapter_table_azure::Config {
        let azure = &self.store.azure;
        let mut config = tally_adapter_table_azure::Config::new(
            azure.account.clone(),
            SasToken::new(azure.sas_token.clone()),
        );
        config.endpoint.clone_from(&azure.endpoint);
        config.timeout = Duration::from_secs(azure.timeout_secs);
        config
    }

    /// Settings for the `SQLite` adapter.
    #[must_use]
    pub fn sqlite_database(&self) -> tally_adapter_storage_sqlite_sqlx::Config {
        tally_adapter_storage_sqlite_sqlx::Config {
            database_url: self.store.sqlite.url.clone(),
        }
    }
}

fn parse_number<N: std::str::FromStr>(name: &str, value: &str) -> Result<N, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{name} is not a valid number: {value:?}")))
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            sas_token: String::new(),
            endpoint: None,
            timeout_secs: tally_adapter_table_azure::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:tally.db?mode=rwc".to_string(),
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "tallyd=info,tally=info,tower_http=debug".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

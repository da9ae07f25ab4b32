//! Configuration loading from cards.toml.

use axum::http::HeaderName;
use policy::Policy;
use serde::Deserialize;
use service::PagingLimits;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Path value that selects an in-memory store.
pub const MEMORY_STORE: &str = ":memory:";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub paging: PagingConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Ownership rules (`[ownership]`).
    #[serde(flatten)]
    pub policy: Policy,
}

/// HTTP listener settings.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Upper bound on each store call made while serving a request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// How long SQLite waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_page_size")]
    pub default_size: u32,

    #[serde(default = "default_max_page_size")]
    pub max_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_size: default_page_size(),
            max_size: default_max_page_size(),
        }
    }
}

/// Where the upstream identity provider puts the verified principal.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_principal_header")]
    pub principal_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            principal_header: default_principal_header(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cards.db")
}

fn default_busy_timeout_ms() -> u64 {
    2_000
}

fn default_page_size() -> u32 {
    service::paging::DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u32 {
    service::paging::MAX_PAGE_SIZE
}

fn default_principal_header() -> String {
    "x-authenticated-user".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CARDS_BIND` and `CARDS_DB` overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bind) = lookup("CARDS_BIND") {
            self.server.bind = bind;
        }
        if let Some(path) = lookup("CARDS_DB") {
            self.storage.path = PathBuf::from(path);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.paging.default_size == 0 {
            return Err(ConfigError::Invalid("paging.default_size must be positive".into()));
        }
        if self.paging.max_size < self.paging.default_size {
            return Err(ConfigError::Invalid(
                "paging.max_size must not be below paging.default_size".into(),
            ));
        }
        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("server.request_timeout_ms must be positive".into()));
        }
        self.principal_header()?;
        Ok(())
    }

    pub fn principal_header(&self) -> Result<HeaderName, ConfigError> {
        HeaderName::try_from(self.auth.principal_header.as_str()).map_err(|_| {
            ConfigError::Invalid(format!(
                "auth.principal_header is not a valid header name: {:?}",
                self.auth.principal_header
            ))
        })
    }

    pub fn paging_limits(&self) -> PagingLimits {
        PagingLimits {
            default_size: self.paging.default_size,
            max_size: self.paging.max_size,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }

    pub fn is_memory_store(&self) -> bool {
        self.storage.path.as_os_str() == MEMORY_STORE
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

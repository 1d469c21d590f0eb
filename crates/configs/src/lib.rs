//! around/crates/configs/src/lib.rs
//!
//! Layered settings for the `around` binary.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults (the `Default` impls below)
//! 2. optional `config/around.toml`
//! 3. environment variables `AROUND__<SECTION>__<KEY>`, e.g. `AROUND__CACHE__TTL_SECS=10`
//!
//! A `.env` file in the working directory is loaded into the environment first.

use std::time::Duration;

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const ENV_PREFIX: &str = "AROUND";
pub const CONFIG_FILE: &str = "config/around";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
    pub auth: AuthSettings,
    pub credentials: CredentialSettings,
    pub media: MediaSettings,
    pub search: SearchSettings,
    pub cache: CacheSettings,
    pub archive: ArchiveSettings,
    pub moderation: ModerationSettings,
    pub timeouts: TimeoutSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Upper bound on a request body, multipart uploads included.
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            max_upload_bytes: 32 * 1024 * 1024,
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Json,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub jwt_secret: SecretString,
    pub token_ttl_hours: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: SecretString::from(""),
            token_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Postgres URL; in-memory credentials when unset.
    pub database_url: Option<SecretString>,
    pub max_connections: u32,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    #[default]
    Memory,
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub backend: MediaBackend,
    /// Root directory for the `local` backend.
    pub local_root: String,
    /// Prefix of every returned media URL.
    pub public_base_url: String,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            backend: MediaBackend::Memory,
            local_root: "./data/media".into(),
            public_base_url: "http://localhost:8080/media".into(),
            bucket: None,
            region: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Elasticsearch node; in-memory index when unset.
    pub elasticsearch_url: Option<String>,
    pub index: String,
    pub max_hits: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            elasticsearch_url: None,
            index: "around".into(),
            max_hits: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Redis URL; in-memory cache when unset.
    pub redis_url: Option<String>,
    pub ttl_secs: u64,
    /// Key on parsed coordinates instead of the raw query strings.
    pub normalize_keys: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: 30,
            normalize_keys: false,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    pub enabled: bool,
    /// ClickHouse HTTP endpoint; in-memory archive when unset.
    pub clickhouse_url: Option<String>,
    pub database: String,
    pub table: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            clickhouse_url: None,
            database: "default".into(),
            table: "post_archive".into(),
            user: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModerationSettings {
    pub blocked_terms: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub collaborator_ms: u64,
    pub upload_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            collaborator_ms: 5_000,
            upload_ms: 30_000,
        }
    }
}

impl TimeoutSettings {
    pub fn collaborator(&self) -> Duration {
        Duration::from_millis(self.collaborator_ms)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_millis(self.upload_ms)
    }
}

impl Settings {
    /// Loads `.env`, then defaults, `config/around.toml` and `AROUND__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env");
        }
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(env_source(ENV_PREFIX));
        Self::from_config(builder.build()?)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.expose_secret().is_empty() {
            return Err(ConfigError::Invalid("auth.jwt_secret must be set".into()));
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("auth.token_ttl_hours must be positive".into()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be positive".into()));
        }
        if self.timeouts.collaborator_ms == 0 || self.timeouts.upload_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        if self.search.max_hits == 0 {
            return Err(ConfigError::Invalid("search.max_hits must be positive".into()));
        }
        if self.media.backend == MediaBackend::S3 && self.media.bucket.is_none() {
            return Err(ConfigError::Invalid("media.bucket is required for the s3 backend".into()));
        }
        Ok(())
    }
}

fn env_source(prefix: &str) -> Environment {
    Environment::with_prefix(prefix)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("moderation.blocked_terms")
}

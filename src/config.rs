//! Configuration Module
//!
//! Loads the service configuration from YAML (with `KVFRONT__*` environment
//! overrides) and validates it before anything is served.

use std::path::{Path, PathBuf};

use ::config::{Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;

use crate::logging::Level;
use crate::storage::MAX_TTL_SECS;

// == Config Error ==
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Unreadable file, bad YAML, or a value of the wrong type
    #[error("unable to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("default_ttl must be a non-negative integer (got {0})")]
    NegativeTtl(i64),

    #[error("default_ttl must not exceed {max} seconds (got {got})")]
    TtlTooLarge { got: i64, max: u32 },

    #[error("tls cert/key values are mutually inclusive")]
    UnpairedTls,

    #[error("cassandra username/password values are mutually inclusive")]
    UnpairedCredentials,

    #[error("a cassandra CA must be configured if key and cert are")]
    CassandraTlsWithoutCa,

    #[error("cassandra tls key/cert values are mutually inclusive")]
    UnpairedCassandraTls,
}

// == Config ==
/// Application-wide configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service_name: String,
    /// Path prefix of every key; always begins and ends with `/`
    pub base_uri: String,
    pub listen_address: String,
    pub listen_port: u16,
    /// Seconds; 0 means values never expire
    pub default_ttl: i64,
    pub log_level: Level,
    pub tls: TlsConfig,
    pub cassandra: CassandraConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "kvfront".to_string(),
            base_uri: "/v1/".to_string(),
            listen_address: "localhost".to_string(),
            listen_port: 8080,
            default_ttl: 86_400,
            log_level: Level::Info,
            tls: TlsConfig::default(),
            cassandra: CassandraConfig::default(),
        }
    }
}

/// Certificate and key for serving HTTPS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl TlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.cert.is_some() || self.key.is_some()
    }

    /// The PEM certificate chain and private key, when both are set.
    pub fn pem_files(&self) -> Option<(&Path, &Path)> {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

/// Backing store connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CassandraConfig {
    pub hosts: Vec<String>,
    pub port: u16,
    pub keyspace: String,
    pub table: String,
    pub local_dc: Option<String>,
    pub query_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub tls: CassandraTlsConfig,
    pub authentication: AuthenticationConfig,
}

impl Default for CassandraConfig {
    fn default() -> Self {
        Self {
            hosts: vec!["localhost".to_string()],
            port: 9042,
            keyspace: "kvfront".to_string(),
            table: "values".to_string(),
            local_dc: None,
            query_timeout_ms: 12_000,
            connect_timeout_ms: 5_000,
            tls: CassandraTlsConfig::default(),
            authentication: AuthenticationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CassandraTlsConfig {
    pub ca: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
}

impl CassandraTlsConfig {
    pub fn is_enabled(&self) -> bool {
        self.ca.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// Reads and validates a YAML configuration file.
    ///
    /// Values can be overridden with `KVFRONT__<KEY>` environment variables,
    /// nested keys separated by `__` (e.g. `KVFRONT__CASSANDRA__PORT`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
            .add_source(
                Environment::with_prefix("KVFRONT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cassandra.hosts")
                    .try_parsing(true),
            )
            .build()?;
        settings.try_deserialize::<Config>()?.validate()
    }

    /// Parses and validates configuration from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        settings.try_deserialize::<Config>()?.validate()
    }

    /// Normalizes the base URI and checks cross-field constraints.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if !self.base_uri.ends_with('/') {
            self.base_uri.push('/');
        }
        if !self.base_uri.starts_with('/') {
            self.base_uri.insert(0, '/');
        }

        if self.default_ttl < 0 {
            return Err(ConfigError::NegativeTtl(self.default_ttl));
        }
        if self.default_ttl > i64::from(MAX_TTL_SECS) {
            return Err(ConfigError::TtlTooLarge {
                got: self.default_ttl,
                max: MAX_TTL_SECS,
            });
        }

        if !mutually_inclusive(&self.tls.cert, &self.tls.key) {
            return Err(ConfigError::UnpairedTls);
        }

        let auth = &self.cassandra.authentication;
        if !mutually_inclusive(&auth.username, &auth.password) {
            return Err(ConfigError::UnpairedCredentials);
        }

        let tls = &self.cassandra.tls;
        if tls.ca.is_none() && (tls.cert.is_some() || tls.key.is_some()) {
            return Err(ConfigError::CassandraTlsWithoutCa);
        }
        if tls.ca.is_some() && !mutually_inclusive(&tls.cert, &tls.key) {
            return Err(ConfigError::UnpairedCassandraTls);
        }

        Ok(self)
    }

    /// The default TTL in seconds. Only meaningful after [`Config::validate`].
    pub fn default_ttl_secs(&self) -> u32 {
        u32::try_from(self.default_ttl).unwrap_or(0)
    }

    /// `listen_address:listen_port`
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.listen_port)
    }
}

/// True when both are set or neither is.
fn mutually_inclusive<A, B>(a: &Option<A>, b: &Option<B>) -> bool {
    a.is_some() == b.is_some()
}

//! Service configuration, read from the environment.

use std::net::{IpAddr, SocketAddr};

use tenure_infra::db::DatabaseConfig;
use tenure_subscriptions::ExpiryPolicy;

/// Which storage variant backs the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Postgres,
}

/// API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: IpAddr,
    pub port: u16,
    pub backend: StorageBackend,
    /// Present whenever `backend` is `Postgres`.
    pub database: Option<DatabaseConfig>,
    pub expiry_policy: ExpiryPolicy,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            backend: StorageBackend::Memory,
            database: None,
            expiry_policy: ExpiryPolicy::default(),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST")
            .unwrap_or_else(|| "0.0.0.0".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HOST"))?;

        let port = lookup("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let backend = match lookup("STORAGE_BACKEND").as_deref().map(str::trim) {
            None | Some("") if database_url.is_some() => StorageBackend::Postgres,
            None | Some("") | Some("memory") => StorageBackend::Memory,
            Some("postgres") => StorageBackend::Postgres,
            Some(_) => return Err(ConfigError::Invalid("STORAGE_BACKEND")),
        };

        let database = match backend {
            StorageBackend::Memory => None,
            StorageBackend::Postgres => {
                let url = database_url.ok_or(ConfigError::Missing("DATABASE_URL"))?;
                let mut database = DatabaseConfig::new(url);

                if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
                    database.max_connections = raw
                        .parse::<u32>()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or(ConfigError::Invalid("DATABASE_MAX_CONNECTIONS"))?;
                }
                if let Some(raw) = lookup("DATABASE_CONNECT_TIMEOUT_SECS") {
                    database.connect_timeout_secs = raw
                        .parse()
                        .map_err(|_| ConfigError::Invalid("DATABASE_CONNECT_TIMEOUT_SECS"))?;
                }
                if let Some(raw) = lookup("DATABASE_AUTO_MIGRATE") {
                    database.auto_migrate = parse_flag(&raw, "DATABASE_AUTO_MIGRATE")?;
                }
                if let Some(raw) = lookup("DATABASE_SEED") {
                    database.seed = parse_flag(&raw, "DATABASE_SEED")?;
                }
                Some(database)
            }
        };

        let expiry_policy = match lookup("EXPIRY_EXEMPT_PAUSED") {
            Some(raw) if parse_flag(&raw, "EXPIRY_EXEMPT_PAUSED")? => ExpiryPolicy::ExemptPaused,
            _ => ExpiryPolicy::IncludePaused,
        };

        Ok(Self {
            host,
            port,
            backend,
            database,
            expiry_policy,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_flag(raw: &str, key: &'static str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(key)),
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

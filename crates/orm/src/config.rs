//! ORM configuration loaded from the environment
//!
//! | variable                  | default      |
//! |---------------------------|--------------|
//! | `DATABASE_URL`            | required     |
//! | `DB_MAX_CONNECTIONS`      | `10`         |
//! | `DB_ACQUIRE_TIMEOUT`      | `30` seconds |
//! | `ORM_MAX_RETRIES`         | `10`         |
//! | `ORM_RETRY_BASE_DELAY_MS` | `100`        |
//! | `ORM_MODELS_DIR`          | unset        |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::error::ModelError;
use crate::query::retry::RetryPolicy;
use crate::query::table::{DbConfig, TenantContext};

#[derive(Debug, Clone)]
pub struct OrmConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub retry: RetryPolicy,
    /// Directory of model definition files, if definitions are file based
    pub models_dir: Option<PathBuf>,
}

impl OrmConfig {
    /// Defaults for everything but the database URL
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            models_dir: None,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| ConfigError::MissingEnvVar {
            var: "DATABASE_URL".to_string(),
        })?;

        let max_connections: u32 = parse_or_default(&lookup, "DB_MAX_CONNECTIONS", 10, "positive integer")?;
        let acquire_timeout: u64 = parse_or_default(&lookup, "DB_ACQUIRE_TIMEOUT", 30, "seconds")?;
        let max_attempts: u32 = parse_or_default(&lookup, "ORM_MAX_RETRIES", 10, "positive integer")?;
        let base_delay_ms: u64 = parse_or_default(&lookup, "ORM_RETRY_BASE_DELAY_MS", 100, "milliseconds")?;

        let retry = RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            ..RetryPolicy::default()
        };

        Ok(OrmConfig {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout),
            retry,
            models_dir: lookup("ORM_MODELS_DIR").map(PathBuf::from),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "database_url".to_string(),
                reason: "Database URL cannot be empty".to_string(),
            });
        }

        let url = Url::parse(&self.database_url).map_err(|e| ConfigError::InvalidValue {
            field: "database_url".to_string(),
            value: self.database_url.clone(),
            expected: format!("a valid URL ({})", e),
        })?;

        if url.scheme() != "mysql" {
            return Err(ConfigError::InvalidValue {
                field: "database_url".to_string(),
                value: url.scheme().to_string(),
                expected: "mysql".to_string(),
            });
        }

        if self.max_connections == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "max_connections".to_string(),
                reason: "Pool needs at least one connection".to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed {
                field: "max_attempts".to_string(),
                reason: "At least one attempt is required".to_string(),
            });
        }

        Ok(())
    }

    /// Database settings used to qualify tenant tables.
    ///
    /// The database name is the path segment of `DATABASE_URL`.
    pub fn db_config(&self) -> Result<DbConfig, ConfigError> {
        let url = Url::parse(&self.database_url).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })?;

        let database = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(DbConfig {
            database,
            host: url.host_str().map(str::to_string),
            port: url.port(),
        })
    }
}

impl OrmConfig {
    /// Request context for `tenant_id`, with the database settings taken
    /// from `DATABASE_URL`.
    pub fn tenant_context(&self, tenant_id: impl Into<String>) -> Result<TenantContext, ConfigError> {
        Ok(TenantContext::tenant(tenant_id, self.db_config()?))
    }
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T, expected: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            field: key.to_string(),
            value: raw,
            expected: expected.to_string(),
        }),
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}")]
    MissingEnvVar { var: String },

    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue { field: String, value: String, expected: String },

    #[error("Validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("Configuration parsing error: {message}")]
    ParseError { message: String },
}

impl From<ConfigError> for ModelError {
    fn from(err: ConfigError) -> Self {
        ModelError::Configuration(err.to_string())
    }
}

//! Configuration management for the server.

use std::env;

/// Default request body limit for import routes (16 MiB).
const DEFAULT_MAX_IMPORT_BYTES: usize = 16 * 1024 * 1024;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Largest snapshot body accepted by the import routes
    pub max_import_bytes: usize,
    /// Upper bound of the connection pool
    pub db_max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let max_import_bytes = match env::var("MAX_IMPORT_BYTES") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("MAX_IMPORT_BYTES"))?,
            Err(_) => DEFAULT_MAX_IMPORT_BYTES,
        };

        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(value) => value
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("DB_MAX_CONNECTIONS"))?,
            Err(_) => 10,
        };

        Ok(Self {
            host,
            port,
            database_url,
            max_import_bytes,
            db_max_connections,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {0} value")]
    InvalidNumber(&'static str),
}

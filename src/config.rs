//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage backend: `inmemory://` or a Postgres DSN
    pub db_uri: String,

    /// Address the HTTP collaborator binds to
    pub listen_addr: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_uri = env::var("DB_URI").map_err(|_| ConfigError::MissingEnv("DB_URI"))?;

        let listen_addr =
            env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

        Ok(Self {
            db_uri,
            listen_addr,
        })
    }

    /// Whether the in-memory backend is selected
    pub fn is_inmemory(&self) -> bool {
        self.db_uri == crate::event_store::INMEMORY_URI
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),
}

use std::env;
use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoClient;
use thiserror::Error;

use crate::dynamo::DynamoUserTable;
use crate::memory::MemoryUserTable;
use crate::table::UserTable;

pub const DEFAULT_TABLE_NAME: &str = "users";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("USER_TABLE_BACKEND must be 'dynamo' or 'memory', got '{0}'")]
    UnknownBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Dynamo,
    Memory,
}

/// Console settings read from the Lambda environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// `TABLE_NAME`, default `users`.
    pub table_name: String,
    /// `USER_TABLE_BACKEND`: `dynamo` (default) or `memory` for local runs.
    pub backend: Backend,
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(
            env::var("TABLE_NAME").ok(),
            env::var("USER_TABLE_BACKEND").ok(),
        )
    }

    fn from_vars(table_name: Option<String>, backend: Option<String>) -> Result<Self, ConfigError> {
        let table_name = table_name
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());

        let backend = match backend.as_deref().map(str::trim) {
            None | Some("") | Some("dynamo") => Backend::Dynamo,
            Some("memory") => Backend::Memory,
            Some(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        Ok(Self {
            table_name,
            backend,
        })
    }

    /// Build the users table for this configuration.
    pub async fn build_table(&self) -> Arc<dyn UserTable> {
        match self.backend {
            Backend::Dynamo => {
                let config = aws_config::load_from_env().await;
                Arc::new(DynamoUserTable::new(
                    DynamoClient::new(&config),
                    self.table_name.clone(),
                ))
            }
            Backend::Memory => {
                tracing::warn!("Using in-memory users table; data is lost on cold start");
                Arc::new(MemoryUserTable::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::from_vars(None, None).unwrap();
        assert_eq!(config.table_name, "users");
        assert_eq!(config.backend, Backend::Dynamo);
    }

    #[test]
    fn test_overrides() {
        let config = ConsoleConfig::from_vars(
            Some("staff".to_string()),
            Some("memory".to_string()),
        )
        .unwrap();
        assert_eq!(config.table_name, "staff");
        assert_eq!(config.backend, Backend::Memory);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = ConsoleConfig::from_vars(None, Some("postgres".to_string())).unwrap_err();
        assert_eq!(err, ConfigError::UnknownBackend("postgres".to_string()));
        assert_eq!(
            err.to_string(),
            "USER_TABLE_BACKEND must be 'dynamo' or 'memory', got 'postgres'"
        );
    }
}

/// Configuration management for Flowmint
///
/// Handles the definition store backend, the activity catalog sources and
/// logging. Every field has an environment override for container deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Definition store configuration
    pub store: StoreConfig,
    /// Activity catalog configuration
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl StoreBackend {
    /// Unknown values fall back to the in-memory store
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "sqlite" => StoreBackend::Sqlite,
            _ => StoreBackend::Memory,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory holding definitions.db (default: "data")
    pub data_dir: String,
}

impl StoreConfig {
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("definitions.db")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Optional JSON manifest with activity kinds beyond the built-ins
    pub manifest_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing EnvFilter directive (e.g., "info,flowmint=debug")
    pub filter: String,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            store: StoreConfig {
                backend: std::env::var("FLOWMINT_STORE")
                    .map(|v| StoreBackend::parse(&v))
                    .unwrap_or(StoreBackend::Memory),
                data_dir: std::env::var("FLOWMINT_DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            },
            catalog: CatalogConfig {
                manifest_path: std::env::var("FLOWMINT_CATALOG_MANIFEST")
                    .ok()
                    .filter(|p| !p.trim().is_empty()),
            },
            logging: LoggingConfig {
                filter: std::env::var("FLOWMINT_LOG").unwrap_or_else(|_| "info".to_string()),
            },
        }
    }
}

impl Config {
    /// Configuration that touches nothing on disk
    pub fn in_memory() -> Self {
        Self {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                data_dir: "data".to_string(),
            },
            catalog: CatalogConfig { manifest_path: None },
            logging: LoggingConfig {
                filter: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parsing() {
        assert_eq!(StoreBackend::parse("SQLite"), StoreBackend::Sqlite);
        assert_eq!(StoreBackend::parse("memory"), StoreBackend::Memory);
        assert_eq!(StoreBackend::parse("postgres"), StoreBackend::Memory);
    }

    #[test]
    fn database_lives_in_the_data_dir() {
        let mut config = Config::in_memory();
        config.store.data_dir = "/var/lib/flowmint".into();
        assert_eq!(
            config.store.database_path(),
            PathBuf::from("/var/lib/flowmint/definitions.db")
        );
    }

    #[test]
    fn config_serializes_backend_in_lowercase() {
        let json = serde_json::to_value(Config::in_memory()).unwrap();
        assert_eq!(json["store"]["backend"], "memory");
        assert!(json["catalog"]["manifest_path"].is_null());
    }
}

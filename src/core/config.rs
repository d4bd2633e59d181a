use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which forward-store backend an indexer is configured to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DbKind {
    /// `sled`-backed LSM-style engine.
    LsmEngine,
    /// Single-file append log fronted by an in-memory B-tree.
    BTreeEngine,
}

impl Default for DbKind {
    fn default() -> Self {
        DbKind::LsmEngine
    }
}

/// Configuration shared by a standalone `Indexer`: storage backend, its
/// location, and the initial inverted-index sizing hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub db_kind: DbKind,
    pub db_path: PathBuf,
    /// Initial capacity hint for the inverted index (`docNumEstimate`).
    pub doc_num_estimate: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            db_kind: DbKind::default(),
            db_path: PathBuf::from("./data"),
            doc_num_estimate: 10_000,
        }
    }
}

/// Configuration for a worker process: its own indexer plus the registry it
/// advertises itself to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub indexer: IndexerConfig,
    /// Registry addresses. Empty means single-node mode: no registration.
    pub registry_endpoints: Vec<String>,
    pub service_port: u16,
    /// Lease refresh cadence; the registry's TTL must exceed this.
    pub heartbeat_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfig {
            indexer: IndexerConfig::default(),
            registry_endpoints: Vec::new(),
            service_port: 7700,
            heartbeat_seconds: 3,
        }
    }
}

impl WorkerConfig {
    /// Parse from a TOML file, then apply any `CORVID_*` environment
    /// variable overrides recognized below.
    pub fn load(path: &std::path::Path) -> crate::core::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: WorkerConfig = toml::from_str(&text)
            .map_err(|e| crate::core::error::Error::new(crate::core::error::ErrorKind::Parse, e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Rejects a `service_port` of 1024 or below, per spec's error
    /// taxonomy (`InvalidArgument`, raised by the indexer and by worker
    /// registration alike).
    pub fn validate(&self) -> crate::core::error::Result<()> {
        if self.service_port <= 1024 {
            return Err(crate::core::error::Error::new(
                crate::core::error::ErrorKind::InvalidArgument,
                format!("service_port {} must be greater than 1024", self.service_port),
            ));
        }
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("CORVID_SERVICE_PORT") {
            if let Ok(p) = port.parse() {
                self.service_port = p;
            }
        }
        if let Ok(path) = std::env::var("CORVID_DB_PATH") {
            self.indexer.db_path = PathBuf::from(path);
        }
        if let Ok(endpoints) = std::env::var("CORVID_REGISTRY_ENDPOINTS") {
            self.registry_endpoints =
                endpoints.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
        }
    }
}

/// Configuration for the cluster dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelConfig {
    pub registry_endpoints: Vec<String>,
    /// Registry proxy cache refresh interval, in milliseconds.
    pub registry_cache_refresh_millis: u64,
    pub dial_timeout_millis: u64,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        SentinelConfig {
            registry_endpoints: Vec::new(),
            registry_cache_refresh_millis: 100,
            dial_timeout_millis: 200,
        }
    }
}

impl SentinelConfig {
    pub fn load(path: &std::path::Path) -> crate::core::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: SentinelConfig = toml::from_str(&text)
            .map_err(|e| crate::core::error::Error::new(crate::core::error::ErrorKind::Parse, e.to_string()))?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoints) = std::env::var("CORVID_REGISTRY_ENDPOINTS") {
            self.registry_endpoints =
                endpoints.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[test]
    fn default_worker_config_has_a_valid_service_port() {
        WorkerConfig::default().validate().unwrap();
    }

    #[test]
    fn service_port_at_or_below_1024_is_rejected() {
        let mut config = WorkerConfig::default();
        config.service_port = 1024;
        let err = config.validate().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidArgument));

        config.service_port = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn service_port_above_1024_is_accepted() {
        let mut config = WorkerConfig::default();
        config.service_port = 1025;
        config.validate().unwrap();
    }
}

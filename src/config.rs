//! Data Source Configuration
//!
//! JSON document selecting a backend:
//!
//! ```json
//! { "backend": "memory", "seed_file": "fixtures.json" }
//! { "backend": "rest", "url": "https://xyz.example.co", "api_key": "...", "schema": "public" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::datasource::DataSource;
use crate::error::{DataSourceError, DataSourceResult};
use crate::memory::MemoryDataSource;
use crate::rest::{RestDataSource, RestSettings};

/// In-memory backend settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySettings {
    /// Fixture loaded at connect time (default: none)
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

/// Backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DataSourceConfig {
    Memory(MemorySettings),
    Rest(RestSettings),
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        DataSourceConfig::Memory(MemorySettings::default())
    }
}

impl DataSourceConfig {
    /// Read, parse and validate a config file.
    ///
    /// A relative `seed_file` is resolved against the config file's directory.
    pub fn load(path: &Path) -> DataSourceResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            DataSourceError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let mut config = Self::from_json(&content)?;

        if let DataSourceConfig::Memory(MemorySettings {
            seed_file: Some(seed),
        }) = &mut config
        {
            if seed.is_relative() {
                if let Some(dir) = path.parent() {
                    *seed = dir.join(&*seed);
                }
            }
        }

        Ok(config)
    }

    /// Parse and validate a config document
    pub fn from_json(content: &str) -> DataSourceResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| DataSourceError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DataSourceResult<()> {
        match self {
            DataSourceConfig::Memory(_) => Ok(()),
            DataSourceConfig::Rest(settings) => settings.validate(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            DataSourceConfig::Memory(_) => "memory",
            DataSourceConfig::Rest(_) => "rest",
        }
    }
}

/// Build the data source a config describes
pub fn connect(config: &DataSourceConfig) -> DataSourceResult<Arc<dyn DataSource>> {
    config.validate()?;
    match config {
        DataSourceConfig::Memory(settings) => {
            let source = MemoryDataSource::new();
            if let Some(seed) = &settings.seed_file {
                source.seed_file(seed)?;
            }
            Ok(Arc::new(source))
        }
        DataSourceConfig::Rest(settings) => Ok(Arc::new(RestDataSource::new(settings.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DataSourceConfig::default();
        assert_eq!(config.backend_name(), "memory");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_rest_with_defaults() {
        let config = DataSourceConfig::from_json(
            r#"{"backend": "rest", "url": "https://x.example.co", "api_key": "k"}"#,
        )
        .unwrap();

        match config {
            DataSourceConfig::Rest(settings) => {
                assert_eq!(settings.schema, "public");
                assert_eq!(settings.api_key, "k");
            }
            other => panic!("expected rest config, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_invalid() {
        let err = DataSourceConfig::from_json(
            r#"{"backend": "rest", "url": "x.example.co", "api_key": "k"}"#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");

        assert!(DataSourceConfig::from_json(r#"{"backend": "sqlite"}"#).is_err());
        assert!(DataSourceConfig::from_json(
            r#"{"backend": "rest", "url": "https://x.example.co", "api_key": ""}"#
        )
        .is_err());
    }

    #[test]
    fn test_load_resolves_seed_relative_to_config() {
        let dir = TempDir::new().unwrap();
        let seed_path = dir.path().join("fixtures.json");
        fs::write(&seed_path, r#"{"students": [{"id": "a", "name": "Ann"}]}"#).unwrap();

        let config_path = dir.path().join("datasource.json");
        let mut file = fs::File::create(&config_path).unwrap();
        write!(file, r#"{{"backend": "memory", "seed_file": "fixtures.json"}}"#).unwrap();

        let config = DataSourceConfig::load(&config_path).unwrap();
        assert_eq!(
            config,
            DataSourceConfig::Memory(MemorySettings {
                seed_file: Some(seed_path)
            })
        );

        assert!(connect(&config).is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = DataSourceConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_connect_memory_is_seeded() {
        let dir = TempDir::new().unwrap();
        let seed_path = dir.path().join("fixtures.json");
        fs::write(&seed_path, r#"{"students": [{"id": "a"}, {"id": "b"}]}"#).unwrap();

        let config = DataSourceConfig::Memory(MemorySettings {
            seed_file: Some(seed_path),
        });
        let db = connect(&config).unwrap();
        let response = db.from("students").select("*").await;

        assert_eq!(response.count(), 2);
    }
}

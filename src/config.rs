//! Tunables for conversion and search.

use crate::error::{Result, VecError};
use crate::fvecs::DEFAULT_READ_BATCH_SIZE;
use crate::search::DEFAULT_K;
use crate::store::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Batch and chunk sizes plus the default neighbor count.
///
/// Missing JSON fields fall back to the defaults:
///
/// ```
/// use vecscan::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{ "k": 3 }"#).unwrap();
/// assert_eq!(config.k, 3);
/// assert_eq!(config.chunk_size, 10_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Records decoded per batch while reading fvecs input.
    pub read_batch_size: usize,
    /// Rows per chunk streamed from the store during search.
    pub chunk_size: usize,
    /// Neighbors returned when the caller does not specify `k`.
    pub k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            read_batch_size: DEFAULT_READ_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            k: DEFAULT_K,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<EngineConfig> {
        let config: EngineConfig = serde_json::from_str(text).map_err(|e| VecError::InvalidConfig {
            field: "config",
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<EngineConfig> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| VecError::io(path, e))?;
        Self::from_json(&text)
    }

    /// Batch and chunk sizes must be at least 1. `k` may be 0.
    pub fn validate(&self) -> Result<()> {
        if self.read_batch_size == 0 {
            return Err(VecError::InvalidConfig {
                field: "read_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.chunk_size == 0 {
            return Err(VecError::InvalidConfig {
                field: "chunk_size",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_test {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.read_batch_size, 1024);
        assert_eq!(config.chunk_size, 10_000);
        assert_eq!(config.k, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(r#"{"read_batch_size": 64}"#).unwrap();
        assert_eq!(config.read_batch_size, 64);
        assert_eq!(config.k, 10);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let result = EngineConfig::from_json(r#"{"chunk_size": 0}"#);
        assert!(matches!(result, Err(VecError::InvalidConfig { field: "chunk_size", .. })));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let result = EngineConfig::from_json("{ k: ");
        assert!(matches!(result, Err(VecError::InvalidConfig { field: "config", .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"k": 5, "chunk_size": 128}"#).unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config, EngineConfig { k: 5, chunk_size: 128, ..EngineConfig::default() });
    }
}

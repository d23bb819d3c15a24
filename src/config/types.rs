use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub workers: WorkerConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Byte budget for the full-record store.
    #[serde(default = "default_record_cache_bytes")]
    pub record_cache_bytes: usize,

    /// Byte budget for the rating store.
    #[serde(default = "default_rating_cache_bytes")]
    pub rating_cache_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Cache-miss chunk size per worker.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Worker pool cap; defaults to min(6, 2 x cores) when unset.
    #[serde(default)]
    pub max_workers: Option<usize>,

    /// Collapse to sequential execution (packaged/sandboxed deployments).
    #[serde(default)]
    pub constrained_runtime: bool,

    /// Run parallel even under a constrained runtime.
    #[serde(default)]
    pub force_parallel: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Explicit path to the exiftool executable; PATH lookup when unset.
    #[serde(default)]
    pub exiftool_path: Option<PathBuf>,
}

fn default_record_cache_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_rating_cache_bytes() -> usize {
    1024 * 1024
}

fn default_chunk_size() -> usize {
    crate::fetch::DEFAULT_CHUNK_SIZE
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            record_cache_bytes: default_record_cache_bytes(),
            rating_cache_bytes: default_rating_cache_bytes(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_workers: None,
            constrained_runtime: false,
            force_parallel: false,
        }
    }
}

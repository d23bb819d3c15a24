mod types;

pub use types::*;

use crate::fetch::{self, ConcurrencyPolicy};
use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./tagvault.toml",
        "~/.config/tagvault/config.toml",
        "/etc/tagvault/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.workers.chunk_size == 0 {
        anyhow::bail!("Worker chunk size cannot be 0");
    }

    if config.workers.max_workers == Some(0) {
        anyhow::bail!("Worker count cannot be 0");
    }

    if config.cache.record_cache_bytes == 0 || config.cache.rating_cache_bytes == 0 {
        anyhow::bail!("Cache byte budgets cannot be 0");
    }

    if let Some(path) = &config.tools.exiftool_path {
        if !path.exists() {
            tracing::warn!("Configured exiftool path does not exist: {:?}", path);
        }
    }

    Ok(())
}

/// Resolve the worker policy once at startup from config plus environment.
///
/// `TAGVAULT_WORKERS` overrides the pool cap; `TAGVAULT_PARALLEL` forces
/// parallel execution under a constrained runtime. Nothing downstream reads
/// the environment again.
pub fn resolve_policy(config: &Config) -> ConcurrencyPolicy {
    let mut policy = ConcurrencyPolicy {
        max_workers: config
            .workers
            .max_workers
            .unwrap_or_else(fetch::default_worker_count),
        chunk_size: config.workers.chunk_size,
        constrained_runtime: config.workers.constrained_runtime,
        force_parallel: config.workers.force_parallel,
    };

    if let Ok(raw) = std::env::var("TAGVAULT_WORKERS") {
        match raw.parse::<usize>() {
            Ok(n) if n >= 1 => policy.max_workers = n,
            _ => tracing::warn!("Ignoring invalid TAGVAULT_WORKERS value: {raw}"),
        }
    }

    if let Ok(raw) = std::env::var("TAGVAULT_PARALLEL") {
        policy.force_parallel = matches!(raw.as_str(), "1" | "true" | "yes");
    }

    policy
}

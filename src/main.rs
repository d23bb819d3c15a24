mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;
use tagvault::cache::{CacheStore, MemoryStore};
use tagvault::config::{self, Config};
use tagvault::extract::{self, ExifToolSource, ExtractionGate};
use tagvault::fetch::BatchFetcher;
use tagvault::write::MetadataWriter;
use tagvault::{paths, scan};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "tagvault=debug".to_string()
        } else {
            "tagvault=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Fetch { paths, json } => fetch_paths(paths, json, cli.config.as_deref()),
        Commands::Scan { dir, json } => {
            let found = scan::collect_image_paths(&dir);
            if found.is_empty() {
                anyhow::bail!("No image files found under {:?}", dir);
            }
            fetch_paths(found, json, cli.config.as_deref())
        }
        Commands::Detail { path } => show_detail(&path, cli.config.as_deref()),
        Commands::Rate { path, rating } => {
            let (_, writer) = build_pipeline(&load(cli.config.as_deref())?)?;
            if !writer.set_rating(&path, rating) {
                anyhow::bail!("Failed to set rating {} on {}", rating, path);
            }
            println!("Rated {} -> {}", path, rating);
            Ok(())
        }
        Commands::Label { path, label } => {
            let (_, writer) = build_pipeline(&load(cli.config.as_deref())?)?;
            if !writer.set_label(&path, &label) {
                anyhow::bail!("Failed to set label {:?} on {}", label, path);
            }
            println!("Labeled {} -> {:?}", path, label);
            Ok(())
        }
        Commands::Rotate {
            path,
            direction,
            physical,
        } => {
            let (_, writer) = build_pipeline(&load(cli.config.as_deref())?)?;
            if !writer.apply_rotation(&path, direction.into(), physical) {
                anyhow::bail!("Failed to rotate {}", path);
            }
            println!("Rotated {}", path);
            Ok(())
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            let _ = config::load_config_or_default(path.as_deref())?;
            println!("Configuration OK");
            Ok(())
        }
        Commands::Version => {
            println!("tagvault {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load(config_path: Option<&std::path::Path>) -> Result<Config> {
    config::load_config_or_default(config_path)
}

/// Wire the caches, backend, and gate into a fetcher/writer pair.
fn build_pipeline(config: &Config) -> Result<(BatchFetcher, MetadataWriter)> {
    let rating_store: Arc<dyn CacheStore> =
        Arc::new(MemoryStore::new(config.cache.rating_cache_bytes));
    let record_store: Arc<dyn CacheStore> =
        Arc::new(MemoryStore::new(config.cache.record_cache_bytes));

    let source = match &config.tools.exiftool_path {
        Some(path) => ExifToolSource::with_executable(path.clone()),
        None => ExifToolSource::new()?,
    };
    let gate = ExtractionGate::new(Box::new(source));
    let policy = config::resolve_policy(config);
    tracing::debug!(?policy, "pipeline policy resolved");

    let fetcher = BatchFetcher::new(
        rating_store.clone(),
        record_store.clone(),
        gate.clone(),
        policy,
    );
    let writer = MetadataWriter::new(rating_store, record_store, gate);
    Ok((fetcher, writer))
}

fn fetch_paths(
    inputs: Vec<String>,
    json: bool,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let config = load(config_path)?;
    let (fetcher, _) = build_pipeline(&config)?;

    let records = fetcher.fetch_batch(&inputs);

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let mut keys: Vec<_> = records.keys().collect();
    keys.sort();
    for key in keys {
        let record = &records[key];
        if record.is_error() {
            let reason = record
                .raw
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            println!("{key}: ERROR ({reason})");
            continue;
        }
        println!(
            "{key}: rating={} label={} date={}",
            record.rating,
            record.label.as_deref().unwrap_or("-"),
            record
                .date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

fn show_detail(input: &str, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = load(config_path)?;
    let (fetcher, _) = build_pipeline(&config)?;

    if paths::resolve(input).is_none() {
        return Err(tagvault::error::Error::PathUnresolved(input.to_string()).into());
    }

    match fetcher.fetch_detail(input) {
        Some(raw) => {
            println!("{}", serde_json::to_string_pretty(&raw)?);
            Ok(())
        }
        None => anyhow::bail!("No metadata available for {}", input),
    }
}

fn check_tools() -> Result<()> {
    let mut all_ok = true;
    for info in extract::check_tools() {
        if info.available {
            println!(
                "  [ok] {} {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version"),
                info.path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            );
        } else {
            all_ok = false;
            println!("  [missing] {}", info.name);
        }
    }
    if !all_ok {
        anyhow::bail!("Required tools are missing");
    }
    Ok(())
}

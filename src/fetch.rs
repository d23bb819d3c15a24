//! Cache-first batch metadata fetching.
//!
//! The fetcher resolves every input path, serves what it can from the
//! full-record cache, and sends the misses through a bounded worker pool in
//! fixed-size chunks. Workers overlap stat calls and merging; the actual
//! backend reads serialize through the [`ExtractionGate`]. A batch always
//! returns a complete map covering every input — failures surface as
//! error-tagged records, never as missing keys or aborted siblings.

use crate::cache::{self, CacheStore};
use crate::extract::{ExtractionGate, TagMap};
use crate::parse;
use crate::paths;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Number of cache-miss paths handed to one worker at a time.
pub const DEFAULT_CHUNK_SIZE: usize = 8;

/// Cap on the default worker count regardless of core count.
pub const MAX_DEFAULT_WORKERS: usize = 6;

/// Default worker pool size: `min(6, 2 x available cores)`, at least one.
pub fn default_worker_count() -> usize {
    MAX_DEFAULT_WORKERS.min(2 * num_cpus::get()).max(1)
}

/// Worker-pool policy, resolved once at startup and passed in — never read
/// from the environment inside the hot path.
#[derive(Debug, Clone)]
pub struct ConcurrencyPolicy {
    /// Maximum number of extraction workers.
    pub max_workers: usize,
    /// Cache-miss chunk size.
    pub chunk_size: usize,
    /// Packaged/sandboxed deployments default to sequential execution.
    pub constrained_runtime: bool,
    /// Run parallel even under a constrained runtime.
    pub force_parallel: bool,
}

impl Default for ConcurrencyPolicy {
    fn default() -> Self {
        Self {
            max_workers: default_worker_count(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            constrained_runtime: false,
            force_parallel: false,
        }
    }
}

impl ConcurrencyPolicy {
    /// Worker count for one batch. Constrained runtimes collapse to a single
    /// worker unless explicitly overridden; correctness never depends on
    /// this because the gate serializes backend calls regardless.
    pub fn effective_workers(&self) -> usize {
        if self.constrained_runtime && !self.force_parallel {
            1
        } else {
            self.max_workers.max(1)
        }
    }
}

/// Per-image result of a batch fetch.
///
/// `rating`, `label`, and `date` are the lifted, UI-ready fields; `raw` is
/// the open passthrough tag map (an `error` entry instead of tag data when
/// extraction failed or the file was missing). Returned records are
/// immutable snapshots — the pipeline never mutates a map it has handed out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRecord {
    pub rating: u8,
    pub label: Option<String>,
    pub date: Option<NaiveDate>,
    pub raw: TagMap,
}

impl MetadataRecord {
    /// Whether this record carries an extraction error instead of tag data.
    pub fn is_error(&self) -> bool {
        self.raw.contains_key("error")
    }
}

fn error_raw(message: &str) -> TagMap {
    let mut map = TagMap::new();
    map.insert("error".to_string(), Value::String(message.to_string()));
    map
}

/// Cache-coordinating batch fetcher.
///
/// Holds its two cache stores, the extraction gate, and the resolved
/// concurrency policy; constructed once and reused.
pub struct BatchFetcher {
    rating_store: Arc<dyn CacheStore>,
    record_store: Arc<dyn CacheStore>,
    gate: ExtractionGate,
    policy: ConcurrencyPolicy,
}

impl BatchFetcher {
    /// Create a fetcher over the given stores, gate, and policy.
    pub fn new(
        rating_store: Arc<dyn CacheStore>,
        record_store: Arc<dyn CacheStore>,
        gate: ExtractionGate,
        policy: ConcurrencyPolicy,
    ) -> Self {
        Self {
            rating_store,
            record_store,
            gate,
            policy,
        }
    }

    /// Fetch UI-ready records for a batch of paths.
    ///
    /// Returns a map keyed by canonical key covering every input path;
    /// duplicate inputs are deduplicated by canonical key. Unresolvable or
    /// failed items get error-tagged records rather than aborting the batch.
    pub fn fetch_batch(&self, inputs: &[String]) -> HashMap<String, MetadataRecord> {
        // canonical key -> (operational path, raw tag map)
        let mut raw_by_key: HashMap<String, (String, TagMap)> = HashMap::new();
        // (operational path, canonical key) pairs needing extraction.
        let mut misses: Vec<(String, String)> = Vec::new();
        let mut miss_keys: HashSet<String> = HashSet::new();

        for input in inputs {
            match paths::resolve(input) {
                None => {
                    let key = paths::canonical_key_for_missing(input);
                    if raw_by_key.contains_key(&key) || miss_keys.contains(&key) {
                        continue;
                    }
                    let operational = paths::normalized_input(input);
                    // Reuse a cached not-found record when present so a
                    // permanently missing file is not re-written every batch.
                    let raw = match cache::get_or_miss(&*self.record_store, &key) {
                        Some(Value::Object(map)) => map,
                        _ => {
                            let raw = error_raw("not found");
                            cache::set_or_log(
                                &*self.record_store,
                                &key,
                                Value::Object(raw.clone()),
                            );
                            raw
                        }
                    };
                    raw_by_key.insert(key, (operational, raw));
                }
                Some(identity) => {
                    if raw_by_key.contains_key(&identity.canonical_key)
                        || miss_keys.contains(&identity.canonical_key)
                    {
                        continue;
                    }
                    match cache::get_or_miss(&*self.record_store, &identity.canonical_key) {
                        Some(Value::Object(map)) => {
                            raw_by_key
                                .insert(identity.canonical_key, (identity.operational_path, map));
                        }
                        Some(other) => {
                            warn!(
                                key = %identity.canonical_key,
                                ?other,
                                "malformed cache entry, treating as miss"
                            );
                            miss_keys.insert(identity.canonical_key.clone());
                            misses.push((identity.operational_path, identity.canonical_key));
                        }
                        None => {
                            miss_keys.insert(identity.canonical_key.clone());
                            misses.push((identity.operational_path, identity.canonical_key));
                        }
                    }
                }
            }
        }

        if !misses.is_empty() {
            debug!(
                total = inputs.len(),
                hits = raw_by_key.len(),
                misses = misses.len(),
                "extracting cache misses"
            );

            let extracted = self.extract_misses(&misses);

            let key_by_operational: HashMap<&str, &str> = misses
                .iter()
                .map(|(operational, key)| (operational.as_str(), key.as_str()))
                .collect();

            for (operational, raw) in extracted {
                let Some(key) = key_by_operational.get(operational.as_str()) else {
                    continue;
                };
                cache::set_or_log(&*self.record_store, key, Value::Object(raw.clone()));
                raw_by_key.insert((*key).to_string(), (operational, raw));
            }
        }

        raw_by_key
            .into_iter()
            .map(|(key, (operational, raw))| (key, derive_record(raw, &operational)))
            .collect()
    }

    /// Full raw tag map for a single path, extracting on a cache miss.
    ///
    /// This is the detail accessor: batch callers consume only the lifted
    /// fields, viewers that need the whole tag table come through here.
    pub fn fetch_detail(&self, input: &str) -> Option<TagMap> {
        let identity = paths::resolve(input)?;
        if let Some(Value::Object(map)) =
            cache::get_or_miss(&*self.record_store, &identity.canonical_key)
        {
            return Some(map);
        }

        // Take the raw map from the batch result rather than re-reading the
        // store: a store is free to decline or immediately evict the entry,
        // and the extraction must not be lost when it does.
        let mut records = self.fetch_batch(std::slice::from_ref(&identity.operational_path));
        records.remove(&identity.canonical_key).map(|r| r.raw)
    }

    /// Fast rating lookup through the rating store, falling back to a full
    /// fetch (and populating the rating store) on a miss.
    pub fn rating(&self, input: &str) -> u8 {
        let key = match paths::resolve(input) {
            Some(identity) => identity.canonical_key,
            None => return 0,
        };

        if let Some(value) = cache::get_or_miss(&*self.rating_store, &key) {
            return parse::parse_rating(&value);
        }

        let records = self.fetch_batch(std::slice::from_ref(&input.to_string()));
        let rating = records.get(&key).map(|r| r.rating).unwrap_or(0);
        cache::set_or_log(&*self.rating_store, &key, Value::from(rating));
        rating
    }

    /// Run the miss list through the worker pool (or sequentially) and
    /// collect `(operational path, raw map)` pairs in completion order.
    fn extract_misses(&self, misses: &[(String, String)]) -> Vec<(String, TagMap)> {
        let chunk_size = self.policy.chunk_size.max(1);
        let chunks: Vec<&[(String, String)]> = misses.chunks(chunk_size).collect();
        let workers = self.policy.effective_workers().min(chunks.len());

        if workers <= 1 {
            return chunks
                .iter()
                .flat_map(|chunk| extract_chunk(&self.gate, chunk))
                .collect();
        }

        let cursor = AtomicUsize::new(0);
        let results: Mutex<Vec<(String, TagMap)>> = Mutex::new(Vec::with_capacity(misses.len()));

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(chunk) = chunks.get(index) else {
                        break;
                    };
                    let mut out = extract_chunk(&self.gate, chunk);
                    results.lock().append(&mut out);
                });
            }
        });

        results.into_inner()
    }
}

/// Extract one chunk of operational paths. Per-item failures become error
/// records; a bad file never cancels the rest of the chunk.
fn extract_chunk(gate: &ExtractionGate, chunk: &[(String, String)]) -> Vec<(String, TagMap)> {
    let mut out = Vec::with_capacity(chunk.len());

    for (operational, _key) in chunk {
        let path = Path::new(operational);

        // Files can disappear between resolution and extraction.
        if !path.exists() {
            warn!(path = %operational, "file vanished before extraction");
            let err = crate::error::Error::FileMissing(path.to_path_buf());
            out.push((operational.clone(), error_raw(&err.to_string())));
            continue;
        }

        match gate.read_all_tags(path) {
            Ok(raw) => out.push((operational.clone(), raw)),
            Err(e) => {
                warn!(path = %operational, error = %e, "extraction failed");
                out.push((operational.clone(), error_raw(&e.to_string())));
            }
        }
    }

    out
}

/// Derive the lifted fields from a raw map. Error records default rating
/// and label but still walk the filename/filesystem date fallbacks.
fn derive_record(raw: TagMap, operational_path: &str) -> MetadataRecord {
    let failed = raw.contains_key("error");

    let rating = if failed {
        0
    } else {
        raw.get(parse::RATING_TAG)
            .map(parse::parse_rating)
            .unwrap_or(0)
    };
    let label = if failed {
        None
    } else {
        raw.get(parse::LABEL_TAG).and_then(parse::parse_label)
    };
    let date = parse::resolve_date(if failed { None } else { Some(&raw) }, operational_path);

    MetadataRecord {
        rating,
        label,
        date,
        raw,
    }
}

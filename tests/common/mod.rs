//! Shared test harness: a fake extraction backend with reentrancy
//! assertions plus a fully wired pipeline over temp-dir fixtures.

// Not every test binary uses every helper.
#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tagvault::cache::{CacheStore, MemoryStore};
use tagvault::error::{Error, Result};
use tagvault::extract::{ExtractionGate, TagMap, TagSource};
use tagvault::fetch::{BatchFetcher, ConcurrencyPolicy};
use tagvault::write::MetadataWriter;

/// Fake [`TagSource`] backed by an in-memory tag table.
///
/// Asserts it is never called reentrantly — the property the real backend
/// requires and the gate must guarantee. All state is behind `Arc`s so the
/// test keeps a handle after the gate takes ownership of its clone.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub tags: Arc<Mutex<HashMap<String, TagMap>>>,
    pub reads: Arc<AtomicUsize>,
    pub writes: Arc<Mutex<Vec<(String, String, Value)>>>,
    pub fail_reads: Arc<Mutex<HashSet<String>>>,
    pub fail_writes: Arc<AtomicBool>,
    in_flight: Arc<AtomicBool>,
}

impl FakeBackend {
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn fail_reads_for(&self, path: &str) {
        self.fail_reads.lock().insert(path.to_string());
    }
}

impl TagSource for FakeBackend {
    fn read_all_tags(&mut self, path: &Path) -> Result<TagMap> {
        assert!(
            !self.in_flight.swap(true, Ordering::SeqCst),
            "extraction backend called reentrantly"
        );
        // Widen the race window so unserialized callers would collide.
        std::thread::sleep(Duration::from_millis(2));
        self.reads.fetch_add(1, Ordering::SeqCst);

        let key = path.to_string_lossy().to_string();
        let result = if self.fail_reads.lock().contains(&key) {
            Err(Error::extraction("injected read failure"))
        } else {
            Ok(self.tags.lock().get(&key).cloned().unwrap_or_default())
        };

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    fn write_tag(&mut self, path: &Path, tag: &str, value: &Value) -> Result<()> {
        assert!(
            !self.in_flight.swap(true, Ordering::SeqCst),
            "extraction backend called reentrantly"
        );

        let key = path.to_string_lossy().to_string();
        let result = if self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::extraction("injected write failure"))
        } else {
            self.writes
                .lock()
                .push((key.clone(), tag.to_string(), value.clone()));
            self.tags
                .lock()
                .entry(key)
                .or_default()
                .insert(tag.to_string(), value.clone());
            Ok(())
        };

        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

/// [`CacheStore`] whose every operation fails, for exercising the
/// treat-errors-as-miss policy end to end.
pub struct FailingStore;

impl CacheStore for FailingStore {
    fn get(&self, _: &str) -> Result<Option<Value>> {
        Err(Error::cache("store offline"))
    }

    fn set(&self, _: &str, _: Value) -> Result<()> {
        Err(Error::cache("store offline"))
    }

    fn delete(&self, _: &str) -> Result<()> {
        Err(Error::cache("store offline"))
    }

    fn contains(&self, _: &str) -> Result<bool> {
        Err(Error::cache("store offline"))
    }
}

/// Fully wired pipeline over a temp directory and a [`FakeBackend`].
pub struct Pipeline {
    pub backend: FakeBackend,
    pub rating_store: Arc<MemoryStore>,
    pub record_store: Arc<MemoryStore>,
    pub fetcher: BatchFetcher,
    pub writer: MetadataWriter,
    pub dir: tempfile::TempDir,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::with_policy(ConcurrencyPolicy::default())
    }

    pub fn with_policy(policy: ConcurrencyPolicy) -> Self {
        Self::build(policy, 8 * 1024 * 1024)
    }

    /// Pipeline whose record store has a tiny byte budget, so every record
    /// set is declined.
    pub fn with_record_budget(record_bytes: usize) -> Self {
        Self::build(ConcurrencyPolicy::default(), record_bytes)
    }

    fn build(policy: ConcurrencyPolicy, record_bytes: usize) -> Self {
        let backend = FakeBackend::default();
        let rating_store = Arc::new(MemoryStore::new(1024 * 1024));
        let record_store = Arc::new(MemoryStore::new(record_bytes));
        let gate = ExtractionGate::new(Box::new(backend.clone()));

        let fetcher = BatchFetcher::new(
            rating_store.clone() as Arc<dyn CacheStore>,
            record_store.clone() as Arc<dyn CacheStore>,
            gate.clone(),
            policy,
        );
        let writer = MetadataWriter::new(
            rating_store.clone() as Arc<dyn CacheStore>,
            record_store.clone() as Arc<dyn CacheStore>,
            gate,
        );

        Self {
            backend,
            rating_store,
            record_store,
            fetcher,
            writer,
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    /// Create an empty image file on disk and register its fake tags.
    /// Returns the full path string.
    pub fn add_image(&self, name: &str, tags: &[(&str, Value)]) -> String {
        let path = self.dir.path().join(name);
        std::fs::File::create(&path).expect("create fixture file");
        let path = path.to_string_lossy().to_string();

        let mut map = TagMap::new();
        for (tag, value) in tags {
            map.insert((*tag).to_string(), value.clone());
        }
        self.backend.tags.lock().insert(path.clone(), map);
        path
    }
}

//! Tag extraction backends and the gate serializing access to them.
//!
//! The backend is not thread-safe: every call, read or write, from any
//! worker, must go through one process-wide [`ExtractionGate`]. Concurrency
//! in the batch fetcher comes from overlapping the non-gated work (stat
//! calls, path resolution, merging) across threads, never from parallel
//! backend calls.

mod exiftool;

pub use exiftool::ExifToolSource;

use crate::error::Result;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

/// Merged EXIF+IPTC+XMP tag map for one file, including file size, pixel
/// dimensions, and MIME type. Open-ended passthrough; the tag vocabulary is
/// whatever the backend returns.
pub type TagMap = Map<String, Value>;

/// A metadata extraction backend.
///
/// Implementations may hold process handles or other mutable state; the
/// gate guarantees exclusive access for the duration of each call.
pub trait TagSource: Send {
    /// Read all tags for one file.
    fn read_all_tags(&mut self, path: &Path) -> Result<TagMap>;

    /// Write a single tag value to one file.
    fn write_tag(&mut self, path: &Path, tag: &str, value: &Value) -> Result<()>;
}

/// Process-wide mutual-exclusion gate around a [`TagSource`].
///
/// Cloning shares the same underlying mutex, so every pipeline component
/// constructed from one gate serializes against all the others. Owned and
/// injected explicitly so tests can substitute a fake backend that asserts
/// non-reentrancy.
#[derive(Clone)]
pub struct ExtractionGate {
    inner: Arc<Mutex<Box<dyn TagSource>>>,
}

impl ExtractionGate {
    /// Wrap a backend in a new gate.
    pub fn new(source: Box<dyn TagSource>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(source)),
        }
    }

    /// Read all tags for one file while holding the gate.
    pub fn read_all_tags(&self, path: &Path) -> Result<TagMap> {
        let mut source = self.inner.lock();
        source.read_all_tags(path)
    }

    /// Write one tag while holding the gate.
    pub fn write_tag(&self, path: &Path, tag: &str, value: &Value) -> Result<()> {
        let mut source = self.inner.lock();
        source.write_tag(path, tag, value)
    }
}

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// Version string if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available and get its information.
pub fn check_tool(name: &str, version_arg: &str) -> ToolInfo {
    let result = Command::new(name).arg(version_arg).output();

    match result {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.trim().to_string());

            ToolInfo {
                name: name.to_string(),
                available: true,
                version,
                path: which::which(name).ok(),
            }
        }
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check the extraction tools this pipeline can use.
pub fn check_tools() -> Vec<ToolInfo> {
    vec![check_tool("exiftool", "-ver")]
}

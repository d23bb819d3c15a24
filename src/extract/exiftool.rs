//! ExifTool subprocess backend.
//!
//! One `exiftool` invocation per call: `-json -n` for reads (numeric output
//! so ratings and orientations come back as numbers, not display strings),
//! single-assignment writes with `-overwrite_original`. ExifTool itself
//! merges EXIF, IPTC, and XMP and includes file size, dimensions, and MIME
//! type in its output, which is exactly the passthrough map the pipeline
//! caches.

use super::{TagMap, TagSource};
use crate::error::{Error, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Extraction backend shelling out to the `exiftool` executable.
pub struct ExifToolSource {
    executable: PathBuf,
}

impl ExifToolSource {
    /// Locate `exiftool` on PATH.
    pub fn new() -> Result<Self> {
        let executable =
            which::which("exiftool").map_err(|_| Error::tool_not_found("exiftool"))?;
        Ok(Self { executable })
    }

    /// Use a specific executable path (from configuration).
    pub fn with_executable(executable: PathBuf) -> Self {
        Self { executable }
    }
}

impl TagSource for ExifToolSource {
    fn read_all_tags(&mut self, path: &Path) -> Result<TagMap> {
        debug!(path = %path.display(), "exiftool read");
        let output = Command::new(&self.executable)
            .args(["-json", "-n", "-charset", "filename=UTF8"])
            .arg(path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction(format!(
                "exiftool exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        // exiftool emits a one-element JSON array per input file.
        let mut parsed: Vec<TagMap> = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::parse_error("exiftool", e.to_string()))?;

        parsed
            .pop()
            .ok_or_else(|| Error::parse_error("exiftool", "empty result array"))
    }

    fn write_tag(&mut self, path: &Path, tag: &str, value: &Value) -> Result<()> {
        debug!(path = %path.display(), tag, "exiftool write");
        let output = Command::new(&self.executable)
            .arg(format!("-{}={}", tag, render_value(value)))
            .args(["-n", "-overwrite_original", "-charset", "filename=UTF8"])
            .arg(path)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction(format!(
                "exiftool write of {} failed: {}",
                tag,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Render a JSON value as an exiftool assignment argument. Strings go bare
/// (exiftool does its own quoting of the argv element); everything else
/// uses the JSON rendering.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

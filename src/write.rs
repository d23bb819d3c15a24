//! Single-item metadata writes with cache invalidation.
//!
//! Writes follow the invalidate-on-write discipline: a successful write
//! updates the rating store (for ratings) and unconditionally deletes the
//! full-record entry, so the next read re-extracts instead of serving a
//! stale combined record. Failures leave every cache untouched.

use crate::cache::{self, CacheStore};
use crate::extract::ExtractionGate;
use crate::parse;
use crate::paths::{self, PathIdentity};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Logical rotation requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
    Half,
}

/// Compose an EXIF orientation code (1-8) with a logical rotation.
///
/// The mapping preserves mirror/flip state: codes 2, 4, 5, and 7 stay
/// within the mirrored cycle. Out-of-domain current codes are treated as 1.
pub fn compose_orientation(current: u8, rotation: Rotation) -> u8 {
    let current = if (1..=8).contains(&current) { current } else { 1 };
    match rotation {
        Rotation::Clockwise => match current {
            1 => 6,
            6 => 3,
            3 => 8,
            8 => 1,
            2 => 7,
            7 => 4,
            4 => 5,
            5 => 2,
            _ => unreachable!(),
        },
        Rotation::CounterClockwise => match current {
            1 => 8,
            8 => 3,
            3 => 6,
            6 => 1,
            2 => 5,
            5 => 4,
            4 => 7,
            7 => 2,
            _ => unreachable!(),
        },
        Rotation::Half => match current {
            1 => 3,
            3 => 1,
            6 => 8,
            8 => 6,
            2 => 4,
            4 => 2,
            5 => 7,
            7 => 5,
            _ => unreachable!(),
        },
    }
}

/// Single-item metadata writer.
///
/// Shares the gate (and therefore the backend) with the batch fetcher, so
/// writes never overlap reads inside the non-thread-safe backend.
pub struct MetadataWriter {
    rating_store: Arc<dyn CacheStore>,
    record_store: Arc<dyn CacheStore>,
    gate: ExtractionGate,
}

impl MetadataWriter {
    /// Create a writer over the given stores and gate.
    pub fn new(
        rating_store: Arc<dyn CacheStore>,
        record_store: Arc<dyn CacheStore>,
        gate: ExtractionGate,
    ) -> Self {
        Self {
            rating_store,
            record_store,
            gate,
        }
    }

    /// Set the star rating (0-5). Returns false for out-of-domain values,
    /// unresolvable paths, or backend failures; no cache is touched then.
    pub fn set_rating(&self, input: &str, rating: i64) -> bool {
        if !(0..=5).contains(&rating) {
            warn!(path = input, rating, "rating outside 0..=5 rejected");
            return false;
        }
        let Some(identity) = self.resolve_for_write(input) else {
            return false;
        };

        if !self.write_tag(&identity, parse::RATING_TAG, &Value::from(rating)) {
            return false;
        }

        cache::set_or_log(&*self.rating_store, &identity.canonical_key, Value::from(rating));
        cache::delete_or_log(&*self.record_store, &identity.canonical_key);
        info!(path = %identity.operational_path, rating, "rating written");
        true
    }

    /// Set the color label. An empty label is written through as-is, which
    /// clears the tag.
    pub fn set_label(&self, input: &str, label: &str) -> bool {
        let Some(identity) = self.resolve_for_write(input) else {
            return false;
        };

        if !self.write_tag(&identity, parse::LABEL_TAG, &Value::from(label)) {
            return false;
        }

        cache::delete_or_log(&*self.record_store, &identity.canonical_key);
        info!(path = %identity.operational_path, label, "label written");
        true
    }

    /// Set the EXIF orientation code (1-8).
    pub fn set_orientation(&self, input: &str, orientation: i64) -> bool {
        if !(1..=8).contains(&orientation) {
            warn!(path = input, orientation, "orientation outside 1..=8 rejected");
            return false;
        }
        let Some(identity) = self.resolve_for_write(input) else {
            return false;
        };

        if !self.write_tag(&identity, parse::ORIENTATION_TAG, &Value::from(orientation)) {
            return false;
        }

        cache::delete_or_log(&*self.record_store, &identity.canonical_key);
        info!(path = %identity.operational_path, orientation, "orientation written");
        true
    }

    /// Apply a logical rotation.
    ///
    /// When the pixel data was physically rotated by the caller, orientation
    /// resets to the normalized code 1; otherwise the current code is
    /// composed with the requested rotation.
    pub fn apply_rotation(&self, input: &str, rotation: Rotation, pixels_rotated: bool) -> bool {
        if pixels_rotated {
            return self.set_orientation(input, 1);
        }

        let current = self.current_orientation(input);
        let next = compose_orientation(current, rotation);
        self.set_orientation(input, i64::from(next))
    }

    /// Current orientation code: from the cached record when available,
    /// otherwise a gate-guarded read. Unknown defaults to 1.
    fn current_orientation(&self, input: &str) -> u8 {
        let Some(identity) = paths::resolve(input) else {
            return 1;
        };

        let cached = match cache::get_or_miss(&*self.record_store, &identity.canonical_key) {
            Some(Value::Object(map)) => map.get(parse::ORIENTATION_TAG).cloned(),
            _ => None,
        };
        if let Some(value) = cached {
            return orientation_code(&value);
        }

        match self.gate.read_all_tags(Path::new(&identity.operational_path)) {
            Ok(raw) => raw
                .get(parse::ORIENTATION_TAG)
                .map(orientation_code)
                .unwrap_or(1),
            Err(e) => {
                warn!(path = %identity.operational_path, error = %e, "orientation read failed");
                1
            }
        }
    }

    fn resolve_for_write(&self, input: &str) -> Option<PathIdentity> {
        match paths::resolve(input) {
            Some(identity) => Some(identity),
            None => {
                warn!(path = input, "cannot write metadata for unresolved path");
                None
            }
        }
    }

    /// Re-stat and perform one gate-guarded tag write. Returns false on any
    /// failure so callers skip cache mutation.
    fn write_tag(&self, identity: &PathIdentity, tag: &str, value: &Value) -> bool {
        let path = Path::new(&identity.operational_path);

        // The file can vanish between resolution and the write.
        if !path.exists() {
            warn!(path = %identity.operational_path, "file gone before write");
            return false;
        }

        match self.gate.write_tag(path, tag, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %identity.operational_path, tag, error = %e, "tag write failed");
                false
            }
        }
    }
}

fn orientation_code(value: &Value) -> u8 {
    let code = parse_code(value);
    if (1..=8).contains(&code) {
        code
    } else {
        1
    }
}

fn parse_code(value: &Value) -> u8 {
    match value {
        Value::Number(n) => n.as_i64().and_then(|v| u8::try_from(v).ok()).unwrap_or(1),
        Value::String(s) => s.trim().parse().unwrap_or(1),
        _ => 1,
    }
}

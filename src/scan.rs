//! Directory scanning for image files.
//!
//! Produces the path lists that feed [`fetch_batch`](crate::fetch::BatchFetcher::fetch_batch).

use crate::paths;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Recursively collect image file paths under a root directory.
///
/// Follows symlinks, skips unreadable entries, and returns paths sorted for
/// stable batch ordering.
pub fn collect_image_paths(root: &Path) -> Vec<String> {
    let mut found = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_dir() || !paths::is_image_file(path) {
            continue;
        }
        found.push(path.to_string_lossy().to_string());
    }

    found.sort();
    debug!(root = %root.display(), count = found.len(), "collected image paths");
    found
}

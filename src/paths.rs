//! Path resolution and canonical cache keys.
//!
//! Filesystems that store filenames in decomposed Unicode form (macOS HFS+,
//! some removable media) report a different byte sequence than the composed
//! form a caller typed or stored. Resolution tries the input as given, then
//! its NFC and NFD forms, and keys every cache lookup by the NFC form of
//! whichever variant actually exists so one file never produces two entries.

use std::path::Path;
use unicode_normalization::UnicodeNormalization;

/// List of supported image file extensions.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "tif", "tiff", "webp", "heic", "heif", "gif", "bmp", "dng", "cr2",
    "cr3", "nef", "arw", "orf", "raf", "rw2",
];

/// Check if a path has an image file extension.
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Identity of a resolved file: the path variant that exists on disk plus
/// the normalized key used for all cache lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathIdentity {
    /// Path string usable directly for filesystem and extraction calls.
    pub operational_path: String,
    /// NFC normalization of `operational_path`; the sole cache key.
    pub canonical_key: String,
}

/// Resolve a user-supplied path string to a [`PathIdentity`].
///
/// Tries, in order: the separator-normalized input, its NFC form, its NFD
/// form. The first variant that exists on disk becomes the operational path.
/// Returns `None` for empty input or when no variant exists.
pub fn resolve(input: &str) -> Option<PathIdentity> {
    if input.trim().is_empty() {
        return None;
    }

    let given = normalize_separators(input);
    let nfc: String = given.nfc().collect();
    let nfd: String = given.nfd().collect();

    for candidate in [given.as_str(), nfc.as_str(), nfd.as_str()] {
        if Path::new(candidate).exists() {
            return Some(PathIdentity {
                operational_path: candidate.to_string(),
                canonical_key: candidate.nfc().collect(),
            });
        }
    }

    None
}

/// Canonical key for a path that did not resolve to an existing file.
///
/// Missing files still get cache entries (their not-found records), so they
/// need the same NFC keying as resolved paths.
pub fn canonical_key_for_missing(input: &str) -> String {
    normalize_separators(input).nfc().collect()
}

/// Normalized form of the input usable as an operational path for a file
/// that does not exist (filename-based date parsing, log output).
pub fn normalized_input(input: &str) -> String {
    normalize_separators(input)
}

#[cfg(windows)]
fn normalize_separators(input: &str) -> String {
    input.replace('/', "\\")
}

#[cfg(not(windows))]
fn normalize_separators(input: &str) -> String {
    // Backslash is a legal filename character on Unix; leave it alone.
    input.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    // "café" with a precomposed e-acute.
    const NAME_NFC: &str = "caf\u{e9}.jpg";
    // "café" with a combining acute accent.
    const NAME_NFD: &str = "cafe\u{301}.jpg";

    #[test]
    fn test_is_image_file() {
        assert!(is_image_file(Path::new("photo.jpg")));
        assert!(is_image_file(Path::new("photo.JPG")));
        assert!(is_image_file(Path::new("/some/dir/raw.NEF")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("no_extension")));
    }

    #[test]
    fn test_resolve_empty_input() {
        assert!(resolve("").is_none());
        assert!(resolve("   ").is_none());
    }

    #[test]
    fn test_resolve_missing_file() {
        assert!(resolve("/nonexistent/path/photo.jpg").is_none());
    }

    #[test]
    fn test_resolve_plain_ascii() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        File::create(&path).unwrap();

        let identity = resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(identity.operational_path, path.to_str().unwrap());
        assert_eq!(identity.canonical_key, identity.operational_path);
    }

    #[test]
    fn test_canonical_key_stable_across_normalization_forms() {
        let dir = tempfile::tempdir().unwrap();
        // Store the file under its decomposed name, as an NFD filesystem would.
        let on_disk = dir.path().join(NAME_NFD);
        File::create(&on_disk).unwrap();

        let nfd_input = on_disk.to_str().unwrap().to_string();
        let nfc_input = format!("{}/{}", dir.path().to_str().unwrap(), NAME_NFC);

        let from_nfd = resolve(&nfd_input).expect("NFD input should resolve");
        let from_nfc = resolve(&nfc_input).expect("NFC input should resolve");

        assert_eq!(from_nfd.canonical_key, from_nfc.canonical_key);
        // The key is always the composed form.
        assert!(from_nfd.canonical_key.ends_with(NAME_NFC));
    }

    #[test]
    fn test_canonical_key_for_missing_is_nfc() {
        let key = canonical_key_for_missing(&format!("/gone/{NAME_NFD}"));
        assert!(key.ends_with(NAME_NFC));
    }
}

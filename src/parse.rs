//! Pure tag-value parsing: ratings, labels, and capture dates.
//!
//! Everything here is stateless and total — malformed input degrades to a
//! default instead of an error, because a single odd tag value must never
//! sink a whole batch.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tag names consulted for the capture date, in preference order.
///
/// This is the batch-fetch preference list; the detail view uses the same
/// one so both paths agree on which tag wins.
pub const DATE_TAG_PREFERENCE: &[&str] = &[
    "DateTimeOriginal",
    "CreateDate",
    "DateCreated",
    "DateTimeDigitized",
    "MediaCreateDate",
    "ModifyDate",
    "FileModifyDate",
];

/// Tag holding the star rating.
pub const RATING_TAG: &str = "Rating";

/// Tag holding the color label.
pub const LABEL_TAG: &str = "Label";

/// Tag holding the EXIF orientation code.
pub const ORIENTATION_TAG: &str = "Orientation";

/// Parse a star rating from a tag value.
///
/// Accepts numbers and numeric strings, truncates fractions, and clamps to
/// 0..=5. Anything else yields 0.
pub fn parse_rating(value: &Value) -> u8 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(f) if f.is_finite() => f.trunc().clamp(0.0, 5.0) as u8,
        _ => 0,
    }
}

/// Parse a color label from a tag value. Empty-after-trim values are `None`.
pub fn parse_label(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Date-time formats tried first, in order. EXIF colon style leads because
/// it is by far the most common in the wild.
const DATETIME_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y.%m.%d %H:%M:%S",
];

/// Date-only formats tried against the date portion of the string.
const DATE_FORMATS: &[&str] = &["%Y:%m:%d", "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d"];

/// Parse a date from a raw tag value string.
///
/// Strips trailing fractional seconds, a trailing `Z`, and trailing numeric
/// UTC offsets before matching, then tries full date-time patterns first and
/// date-only patterns against the date portion.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = clean_datetime(raw);
    if cleaned.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Some(dt.date());
        }
    }

    let date_part = cleaned
        .split(|c| c == ' ' || c == 'T')
        .next()
        .unwrap_or(&cleaned);
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, format) {
            return Some(date);
        }
    }

    None
}

/// Strip the decorations cameras and editors append after the seconds field.
fn clean_datetime(raw: &str) -> String {
    static OFFSET_RE: OnceLock<Regex> = OnceLock::new();
    static FRACTION_RE: OnceLock<Regex> = OnceLock::new();

    let offset_re =
        OFFSET_RE.get_or_init(|| Regex::new(r"[+-]\d{2}:?\d{2}$").expect("valid regex"));
    // A fraction only ever follows a seconds field; a bare `\.\d+$` would
    // also bite the day out of dot-separated dates like `2023.01.15`.
    let fraction_re = FRACTION_RE
        .get_or_init(|| Regex::new(r"(\d{2}:\d{2}:\d{2})\.\d+$").expect("valid regex"));

    let mut text = raw.trim().to_string();
    text = offset_re.replace(&text, "").trim_end().to_string();
    text = text.trim_end_matches(['Z', 'z']).trim_end().to_string();
    text = fraction_re.replace(&text, "$1").trim_end().to_string();
    text
}

/// Parse a date out of a filename.
///
/// Two shapes are recognized: contiguous `YYYYMMDD` followed by a separator
/// or end-of-string (`IMG_20230115_120000.jpg`), and `YYYY` / `MM` / `DD`
/// split by single non-digit separators (`2023-01-15 beach.jpg`). Candidates
/// outside [1900, current_year + 10] or not forming a real calendar date are
/// rejected.
pub fn parse_date_from_filename(name: &str) -> Option<NaiveDate> {
    static COMPACT_RE: OnceLock<Regex> = OnceLock::new();
    static SEPARATED_RE: OnceLock<Regex> = OnceLock::new();

    let compact = COMPACT_RE.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9])(\d{4})(\d{2})(\d{2})(?:[^0-9]|$)").expect("valid regex")
    });
    let separated = SEPARATED_RE.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9])(\d{4})[^0-9](\d{2})[^0-9](\d{2})(?:[^0-9]|$)")
            .expect("valid regex")
    });

    for re in [compact, separated] {
        if let Some(caps) = re.captures(name) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            if let Some(date) = validate_date(year, month, day) {
                return Some(date);
            }
        }
    }

    None
}

fn validate_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let max_year = Utc::now().year() + 10;
    if !(1900..=max_year).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day)
    {
        return None;
    }
    // from_ymd_opt rejects impossible combinations like Feb 30.
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Resolve the best-effort capture date for one file.
///
/// Fallback chain: (1) first parseable value across [`DATE_TAG_PREFERENCE`]
/// in the raw tag map, (2) a date parsed from the filename, (3) the
/// filesystem timestamp. Error records pass `raw = None` and still get the
/// filename and filesystem fallbacks.
pub fn resolve_date(
    raw: Option<&serde_json::Map<String, Value>>,
    operational_path: &str,
) -> Option<NaiveDate> {
    if let Some(map) = raw {
        for tag in DATE_TAG_PREFERENCE {
            if let Some(text) = map.get(*tag).and_then(value_as_text) {
                if let Some(date) = parse_date(&text) {
                    return Some(date);
                }
            }
        }
    }

    let path = Path::new(operational_path);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if let Some(date) = parse_date_from_filename(name) {
            return Some(date);
        }
    }

    filesystem_date(path)
}

/// Filesystem timestamp fallback: the modification time, or the birth time
/// when the platform reports one that is plausible and earlier.
pub fn filesystem_date(path: &Path) -> Option<NaiveDate> {
    let meta = std::fs::metadata(path).ok()?;
    let modified = meta.modified().ok();
    // Some filesystems report a zero or near-epoch birth time; ignore those.
    let created = meta
        .created()
        .ok()
        .filter(|t| *t > UNIX_EPOCH + Duration::from_secs(86_400));

    let stamp: SystemTime = match (created, modified) {
        (Some(c), Some(m)) => c.min(m),
        (Some(c), None) => c,
        (None, Some(m)) => m,
        (None, None) => return None,
    };

    let dt: DateTime<Utc> = stamp.into();
    Some(dt.date_naive())
}

fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_rating_numeric() {
        assert_eq!(parse_rating(&json!(3)), 3);
        assert_eq!(parse_rating(&json!(5)), 5);
        assert_eq!(parse_rating(&json!(0)), 0);
    }

    #[test]
    fn test_parse_rating_clamps() {
        assert_eq!(parse_rating(&json!(9)), 5);
        assert_eq!(parse_rating(&json!(-2)), 0);
        assert_eq!(parse_rating(&json!(3.9)), 3);
    }

    #[test]
    fn test_parse_rating_strings() {
        assert_eq!(parse_rating(&json!("4")), 4);
        assert_eq!(parse_rating(&json!(" 2.7 ")), 2);
        assert_eq!(parse_rating(&json!("99")), 5);
        assert_eq!(parse_rating(&json!("three")), 0);
    }

    #[test]
    fn test_parse_rating_garbage() {
        assert_eq!(parse_rating(&json!(null)), 0);
        assert_eq!(parse_rating(&json!(["a"])), 0);
        assert_eq!(parse_rating(&json!("")), 0);
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label(&json!("Red")), Some("Red".to_string()));
        assert_eq!(parse_label(&json!("  Blue  ")), Some("Blue".to_string()));
        assert_eq!(parse_label(&json!(2)), Some("2".to_string()));
        assert_eq!(parse_label(&json!("")), None);
        assert_eq!(parse_label(&json!("   ")), None);
        assert_eq!(parse_label(&json!(null)), None);
    }

    #[test]
    fn test_parse_date_exif_style() {
        assert_eq!(parse_date("2023:01:15 10:30:00"), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("2023:01:15"), Some(date(2023, 1, 15)));
    }

    #[test]
    fn test_parse_date_iso_variants() {
        assert_eq!(parse_date("2023-01-15 10:30:00"), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("2023-01-15T10:30:00"), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("2023-01-15"), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("2023/01/15 10:30:00"), Some(date(2023, 1, 15)));
        assert_eq!(parse_date("2023.01.15"), Some(date(2023, 1, 15)));
    }

    #[test]
    fn test_parse_date_strips_decorations() {
        assert_eq!(
            parse_date("2023-01-15T10:30:00.123456"),
            Some(date(2023, 1, 15))
        );
        assert_eq!(parse_date("2023-01-15T10:30:00Z"), Some(date(2023, 1, 15)));
        assert_eq!(
            parse_date("2023-01-15T10:30:00+02:00"),
            Some(date(2023, 1, 15))
        );
        assert_eq!(
            parse_date("2023:01:15 10:30:00.50-0700"),
            Some(date(2023, 1, 15))
        );
    }

    #[test]
    fn test_parse_date_dot_dates_keep_their_day() {
        // The fraction stripper must not eat the day of a dot-separated date.
        assert_eq!(parse_date("2023.01.15"), Some(date(2023, 1, 15)));
        assert_eq!(
            parse_date("2023.01.15 10:30:00.25"),
            Some(date(2023, 1, 15))
        );
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("0000:00:00 00:00:00"), None);
    }

    #[test]
    fn test_filename_date_compact() {
        assert_eq!(
            parse_date_from_filename("IMG_20230115_120000.jpg"),
            Some(date(2023, 1, 15))
        );
        assert_eq!(
            parse_date_from_filename("20230115.jpg"),
            Some(date(2023, 1, 15))
        );
    }

    #[test]
    fn test_filename_date_separated() {
        assert_eq!(
            parse_date_from_filename("2023-01-15 beach.jpg"),
            Some(date(2023, 1, 15))
        );
        assert_eq!(
            parse_date_from_filename("scan 2023_01_15.tif"),
            Some(date(2023, 1, 15))
        );
    }

    #[test]
    fn test_filename_date_rejects_invalid() {
        // Feb 30 is not a real date.
        assert_eq!(parse_date_from_filename("IMG_20230230_1.jpg"), None);
        // Year out of range.
        assert_eq!(parse_date_from_filename("IMG_18991231_1.jpg"), None);
        assert_eq!(parse_date_from_filename("IMG_99990101_1.jpg"), None);
        // No date shape at all.
        assert_eq!(parse_date_from_filename("DSC_0042.jpg"), None);
        // Eight digits embedded in a longer digit run are not a date.
        assert_eq!(parse_date_from_filename("123456789012.jpg"), None);
    }

    #[test]
    fn test_resolve_date_prefers_tags() {
        let mut map = serde_json::Map::new();
        map.insert("ModifyDate".into(), json!("2024:06:01 09:00:00"));
        map.insert("DateTimeOriginal".into(), json!("2023:01:15 10:30:00"));
        let resolved = resolve_date(Some(&map), "IMG_19990909_1.jpg");
        assert_eq!(resolved, Some(date(2023, 1, 15)));
    }

    #[test]
    fn test_resolve_date_skips_unparseable_tag() {
        let mut map = serde_json::Map::new();
        map.insert("DateTimeOriginal".into(), json!("0000:00:00"));
        map.insert("CreateDate".into(), json!("2022:05:04 08:00:00"));
        let resolved = resolve_date(Some(&map), "photo.jpg");
        assert_eq!(resolved, Some(date(2022, 5, 4)));
    }

    #[test]
    fn test_resolve_date_filename_fallback() {
        let resolved = resolve_date(None, "/gone/IMG_20230115_120000.jpg");
        assert_eq!(resolved, Some(date(2023, 1, 15)));
    }

    #[test]
    fn test_resolve_date_filesystem_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("undated.jpg");
        std::fs::File::create(&path).unwrap();

        let resolved = resolve_date(None, path.to_str().unwrap());
        // Freshly created file: its timestamp is today.
        assert_eq!(resolved, Some(Utc::now().date_naive()));
    }
}

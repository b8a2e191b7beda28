//! Version string comparison for the `$v*` operators.
//!
//! Versions are normalized into strings that sort correctly under plain ordinal comparison:
//! numeric parts are left-padded, and a release version gets a `~` suffix so that it sorts after
//! its own pre-releases. Any input normalizes; nothing here can fail.
use std::cmp::Ordering;

/// Width numeric parts are left-padded to.
const NUMERIC_PART_WIDTH: usize = 5;

/// Largest printable ASCII character. Appended to release versions.
const RELEASE_MARKER: &str = "~";

/// Normalize a version string for ordinal comparison.
///
/// ```
/// # use questline::padded_version_string;
/// assert_eq!(padded_version_string("v1.2.3+build.7"), "    1-    2-    3-~");
/// assert_eq!(padded_version_string("1.0.0-rc.1"), "    1-    0-    0-rc-    1");
/// ```
pub fn padded_version_string(input: &str) -> String {
    let trimmed = input.strip_prefix('v').unwrap_or(input);
    let trimmed = trimmed.split_once('+').map_or(trimmed, |(version, _build)| version);

    let mut parts: Vec<&str> = trimmed.split(['-', '.']).collect();
    if parts.len() == 3 && parts.iter().all(|part| is_numeric(part)) {
        parts.push(RELEASE_MARKER);
    }

    parts
        .iter()
        .map(|part| {
            if is_numeric(part) {
                format!("{part:>width$}", width = NUMERIC_PART_WIDTH)
            } else {
                (*part).to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn is_numeric(part: &str) -> bool {
    !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())
}

/// Compare two version strings.
///
/// ```
/// # use questline::compare_versions;
/// # use std::cmp::Ordering;
/// assert_eq!(compare_versions("1.0.0", "1.0.0-beta"), Ordering::Greater);
/// assert_eq!(compare_versions("9.0.0", "10.0.0"), Ordering::Less);
/// ```
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    ordinal_cmp(&padded_version_string(a), &padded_version_string(b))
}

/// Ordinal string comparison over UTF-16 code units, not Unicode scalar values.
pub(crate) fn ordinal_cmp(a: &str, b: &str) -> Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

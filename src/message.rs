//! Message date extraction
//!
//! Reads a single email message file and derives the calendar year used to
//! route it into its archive. Absence of a usable date header is a normal
//! outcome, not an error: only an unreadable file raises one.

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ArchiveError, Result};

/// Format the Date header value must match, in chrono strftime syntax
///
/// This is the common RFC 2822 shape with a numeric timezone offset, e.g.
/// `Wed, 12 Jun 2019 10:00:00 +0000`. Parsing is strict: values in any other
/// shape (including named zones such as `GMT`) yield no year and the message
/// is skipped rather than guessed at.
pub const DATE_HEADER_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Calendar year a message is routed by
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(pub i32);

impl Year {
    /// Create a new Year
    pub fn new(year: i32) -> Self {
        Self(year)
    }

    /// Get the inner i32 value
    pub fn get(&self) -> i32 {
        self.0
    }

    /// File name of the archive holding this year's messages, e.g. `2019.zip`
    pub fn archive_file_name(&self) -> String {
        format!("{self}.zip")
    }
}

impl From<i32> for Year {
    fn from(year: i32) -> Self {
        Self(year)
    }
}

impl From<Year> for i32 {
    fn from(year: Year) -> Self {
        year.0
    }
}

impl std::fmt::Display for Year {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Extract the calendar year from a message file's Date header
///
/// Scans the header block (everything before the first empty line) for the
/// first `Date:` field, case-insensitively, unfolding continuation lines,
/// then parses the value strictly against [`DATE_HEADER_FORMAT`].
///
/// # Returns
///
/// - `Ok(Some(year))` when a Date header parsed
/// - `Ok(None)` when the header is absent or in another format
///
/// # Errors
///
/// Returns [`ArchiveError::ReadMessage`] if the file cannot be read.
pub fn extract_year(path: &Path) -> Result<Option<Year>> {
    let raw = fs::read(path).map_err(|e| ArchiveError::ReadMessage {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(year_from_message(&raw))
}

/// Extract the calendar year from raw message bytes
///
/// Same contract as [`extract_year`] for callers that already hold the
/// message in memory.
pub fn year_from_message(raw: &[u8]) -> Option<Year> {
    date_header_value(raw).as_deref().and_then(year_from_date_value)
}

/// Parse a Date header value into its year
///
/// Strict single-format parse; anything [`DATE_HEADER_FORMAT`] does not match
/// returns `None`.
pub fn year_from_date_value(value: &str) -> Option<Year> {
    DateTime::parse_from_str(value, DATE_HEADER_FORMAT)
        .ok()
        .map(|date| Year(date.year()))
}

/// Find the first Date header value in the header block
///
/// The header block ends at the first empty line. Folded continuation lines
/// (leading space or tab) are joined into the value with a single space.
/// Non-UTF-8 bytes are tolerated via lossy decoding, which at worst makes the
/// strict date parse fail and the message get skipped.
fn date_header_value(raw: &[u8]) -> Option<String> {
    let mut value: Option<String> = None;
    for line in raw.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            break;
        }
        if let Some(found) = &mut value {
            if line[0] == b' ' || line[0] == b'\t' {
                let text = String::from_utf8_lossy(line);
                found.push(' ');
                found.push_str(text.trim());
                continue;
            }
            // next header field starts, first Date wins
            break;
        }
        let text = String::from_utf8_lossy(line);
        if let Some(rest) = date_field_value(&text) {
            value = Some(rest.trim().to_string());
        }
    }
    value
}

/// Split a header line and return its value if the field name is `Date`
fn date_field_value(line: &str) -> Option<&str> {
    let (name, rest) = line.split_once(':')?;
    if name.eq_ignore_ascii_case("date") {
        Some(rest)
    } else {
        None
    }
}

use chrono::{Local, NaiveDate, TimeZone};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use super::types::{DateRange, FileDescriptor};
use crate::remote::RemoteSession;

struct DatePattern {
    regex: Regex,
    format: &'static str,
}

/// Filename date conventions in precedence order
fn date_patterns() -> &'static [DatePattern] {
    static PATTERNS: OnceLock<Vec<DatePattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let build = |pattern: &str, format: &'static str| DatePattern {
            regex: Regex::new(pattern).expect("static date pattern"),
            format,
        };
        vec![
            // CenterDevCtrl_2024-01-05.log
            build(r"(?i)^.*_([0-9]{4}-[0-9]{2}-[0-9]{2})\.(?:log|zip)$", "%Y-%m-%d"),
            build(r"([0-9]{4}-[0-9]{2}-[0-9]{2})", "%Y-%m-%d"),
            build(r"([0-9]{8})", "%Y%m%d"),
            build(r"([0-9]{4}_[0-9]{2}_[0-9]{2})", "%Y_%m_%d"),
        ]
    })
}

/// Date embedded in a file name, trying each convention in turn.
///
/// A substring that matches a pattern but is not a real date falls through to
/// the next pattern.
pub fn date_from_filename(filename: &str) -> Option<NaiveDate> {
    for pattern in date_patterns() {
        let Some(captures) = pattern.regex.captures(filename) else {
            continue;
        };
        match NaiveDate::parse_from_str(&captures[1], pattern.format) {
            Ok(date) => return Some(date),
            Err(e) => debug!("'{}' in {} is not a date: {}", &captures[1], filename, e),
        }
    }
    None
}

/// Local calendar date of a Unix timestamp
pub fn date_from_mtime(mtime: u64) -> Option<NaiveDate> {
    let secs = i64::try_from(mtime).ok()?;
    Local.timestamp_opt(secs, 0).single().map(|dt| dt.date_naive())
}

/// Range check with an injectable modification-date lookup
pub fn is_in_range_with<F>(filename: &str, range: &DateRange, modified_date: F) -> bool
where
    F: FnOnce() -> Option<NaiveDate>,
{
    match date_from_filename(filename).or_else(modified_date) {
        Some(date) => range.contains(date),
        None => false,
    }
}

/// Decide whether a listed file belongs to the range.
///
/// Without a date in its name the file's modification time decides, using the
/// listing's value or a stat round-trip; if neither is available the file is
/// excluded.
pub fn is_in_range(session: &mut RemoteSession, file: &FileDescriptor, range: &DateRange) -> bool {
    is_in_range_with(&file.name, range, || {
        let mtime = match file.mtime {
            Some(mtime) => Some(mtime),
            None => match session.stat(&file.remote_path) {
                Ok(stat) => stat.mtime,
                Err(e) => {
                    debug!("stat of {} failed: {}", file.remote_path, e);
                    None
                }
            },
        };
        mtime.and_then(date_from_mtime)
    })
}

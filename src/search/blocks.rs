//! Log-block reconstruction.
//!
//! A line that starts with a time of day opens a new block; the lines after it
//! up to the next timestamped line are its continuation lines.

use chrono::NaiveTime;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Tag used when a file name has no `prefix_` part
pub const FALLBACK_TAG: &str = "LOG";

/// Continuation lines kept in one block before a new block is forced
pub const DEFAULT_MAX_CONTINUATION: usize = 200;

fn leading_time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\[?(?:\d{4}[-/]\d{2}[-/]\d{2}[ T])?(\d{2}):(\d{2}):(\d{2})(?:[.,](\d{1,9}))?")
            .expect("leading time pattern is valid")
    })
}

/// Time of day at the start of `line`, e.g. `10:00:01`, `10:00:01.234` or
/// `[2024-01-05 10:00:01,234]`. Any date part is ignored.
pub fn parse_leading_time(line: &str) -> Option<NaiveTime> {
    let caps = leading_time_pattern().captures(line)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    let second: u32 = caps[3].parse().ok()?;
    let nanos = match caps.get(4) {
        Some(fraction) => {
            let digits = fraction.as_str();
            let value: u32 = digits.parse().ok()?;
            value * 10u32.pow(9 - digits.len() as u32)
        }
        None => 0,
    };
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

/// Short source tag: the file name up to its first underscore
pub fn source_tag(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    match base.split_once('_') {
        Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
        _ => FALLBACK_TAG.to_string(),
    }
}

/// One multi-line log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBlock {
    pub tag: String,
    /// `None` for text before the first timestamp, or a forced split
    pub timestamp: Option<NaiveTime>,
    pub lines: Vec<String>,
}

impl LogBlock {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Block text with `[tag] ` in front of its first line
    pub fn render(&self) -> String {
        format!("[{}] {}", self.tag, self.text())
    }

    pub fn contains(&self, keyword: &str, ignore_case: bool) -> bool {
        if ignore_case {
            let needle = keyword.to_lowercase();
            self.lines.iter().any(|l| l.to_lowercase().contains(&needle))
        } else {
            self.lines.iter().any(|l| l.contains(keyword))
        }
    }
}

/// Split lines into blocks. A block takes at most `max_continuation` lines
/// after its first one; the next line then opens an untimestamped block.
pub fn split_blocks<S: AsRef<str>>(lines: &[S], tag: &str, max_continuation: usize) -> Vec<LogBlock> {
    let mut blocks: Vec<LogBlock> = Vec::new();
    let mut current: Option<LogBlock> = None;

    for line in lines {
        let line = line.as_ref().trim_end_matches('\r');
        let timestamp = parse_leading_time(line);

        let start_new = match &current {
            None => true,
            Some(block) => timestamp.is_some() || block.lines.len() > max_continuation,
        };
        if start_new {
            if let Some(done) = current.take() {
                blocks.push(done);
            }
            current = Some(LogBlock {
                tag: tag.to_string(),
                timestamp,
                lines: vec![line.to_string()],
            });
        } else if let Some(block) = current.as_mut() {
            block.lines.push(line.to_string());
        }
    }

    blocks.extend(current);
    blocks.retain(|b| b.lines.iter().any(|l| !l.trim().is_empty()));
    for block in &mut blocks {
        while block.lines.last().is_some_and(|l| l.trim().is_empty()) {
            block.lines.pop();
        }
    }
    blocks
}

/// Blocks of one file that contain `keyword`
pub fn search_lines<S: AsRef<str>>(lines: &[S], keyword: &str, tag: &str, ignore_case: bool) -> Vec<LogBlock> {
    split_blocks(lines, tag, DEFAULT_MAX_CONTINUATION)
        .into_iter()
        .filter(|b| b.contains(keyword, ignore_case))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_parse_leading_time_variants() {
        assert_eq!(parse_leading_time("10:00:01 started"), Some(t(10, 0, 1)));
        assert_eq!(
            parse_leading_time("10:00:01.250 started"),
            Some(NaiveTime::from_hms_milli_opt(10, 0, 1, 250).unwrap())
        );
        assert_eq!(
            parse_leading_time("[2024-01-05 23:59:59,1] x"),
            Some(NaiveTime::from_hms_milli_opt(23, 59, 59, 100).unwrap())
        );
        assert_eq!(parse_leading_time("2024/01/05T08:30:00 x"), Some(t(8, 30, 0)));
        assert_eq!(parse_leading_time("  10:00:01 indented"), None);
        assert_eq!(parse_leading_time("at 10:00:01"), None);
        assert_eq!(parse_leading_time("25:00:00 bogus"), None);
    }

    #[test]
    fn test_source_tag() {
        assert_eq!(source_tag("CenterDevCtrl_2024-01-05.log"), "CenterDevCtrl");
        assert_eq!(source_tag("/var/log/lane_cam_2024.log"), "lane");
        assert_eq!(source_tag("server.log"), FALLBACK_TAG);
        assert_eq!(source_tag("_x.log"), FALLBACK_TAG);
    }

    #[test]
    fn test_split_blocks_with_continuations() {
        let lines = [
            "preamble",
            "10:00:01 ERROR failed",
            "  at frame one",
            "  at frame two",
            "10:00:02 INFO ok",
            "",
        ];
        let blocks = split_blocks(&lines, "app", DEFAULT_MAX_CONTINUATION);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].timestamp, None);
        assert_eq!(blocks[1].timestamp, Some(t(10, 0, 1)));
        assert_eq!(blocks[1].lines.len(), 3);
        assert_eq!(blocks[2].render(), "[app] 10:00:02 INFO ok");
    }

    #[test]
    fn test_continuation_is_bounded() {
        let lines = ["10:00:01 start", "a", "b", "c"];
        let blocks = split_blocks(&lines, "app", 2);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].lines, vec!["10:00:01 start", "a", "b"]);
        assert_eq!(blocks[1].timestamp, None);
        assert_eq!(blocks[1].lines, vec!["c"]);
    }

    #[test]
    fn test_match_emits_whole_block() {
        let lines = ["10:00:01 request", "  detail ERROR code=7", "10:00:02 next"];
        let found = search_lines(&lines, "ERROR", "app", false);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text(), "10:00:01 request\n  detail ERROR code=7");

        assert!(search_lines(&lines, "error", "app", false).is_empty());
        assert_eq!(search_lines(&lines, "error", "app", true).len(), 1);
    }
}

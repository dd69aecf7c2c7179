//! Keyword search across several files with time-window expansion.

use chrono::{Duration, NaiveTime};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use super::blocks::{source_tag, split_blocks, LogBlock, DEFAULT_MAX_CONTINUATION};

/// Margin applied on both sides of a single-match window
pub const DEFAULT_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub keyword: String,
    pub ignore_case: bool,
    pub margin: Duration,
    pub max_continuation: usize,
}

impl SearchOptions {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ignore_case: false,
            margin: Duration::minutes(DEFAULT_MARGIN_MINUTES),
            max_continuation: DEFAULT_MAX_CONTINUATION,
        }
    }

    pub fn ignore_case(mut self, ignore_case: bool) -> Self {
        self.ignore_case = ignore_case;
        self
    }
}

/// Decoded content of one searched file
#[derive(Debug, Clone)]
pub struct SourceText {
    /// Display name, also the origin of the tag
    pub name: String,
    pub tag: String,
    pub lines: Vec<String>,
}

impl SourceText {
    pub fn new(name: impl Into<String>, text: &str) -> Self {
        let name = name.into();
        Self {
            tag: source_tag(&name),
            lines: text.lines().map(str::to_string).collect(),
            name,
        }
    }
}

/// Inclusive time-of-day window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Window spanning the match times, widened by `margin` on both sides
    /// when there is only one distinct time. Widening stops at midnight.
    pub fn around(earliest: NaiveTime, latest: NaiveTime, margin: Duration) -> Self {
        if earliest != latest {
            return Self { start: earliest, end: latest };
        }
        let (start, wrapped) = earliest.overflowing_sub_signed(margin);
        let start = if wrapped != 0 { NaiveTime::default() } else { start };
        let (end, wrapped) = latest.overflowing_add_signed(margin);
        let end = if wrapped != 0 {
            NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(latest)
        } else {
            end
        };
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchReport {
    /// Ordered, deduplicated blocks
    pub blocks: Vec<LogBlock>,
    pub window: Option<TimeWindow>,
    /// Blocks that contained the keyword
    pub match_count: usize,
    pub files_searched: usize,
}

impl SearchReport {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn render(&self) -> String {
        self.blocks
            .iter()
            .map(LogBlock::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Search every source for the keyword.
///
/// Matching blocks are kept whole. The earliest and latest match timestamps
/// define a window, and every block of every source whose timestamp falls in
/// it is kept too. Output is sorted by timestamp (untimestamped blocks last,
/// in input order) and identical rendered blocks appear once.
pub fn search_sources(sources: &[SourceText], options: &SearchOptions) -> SearchReport {
    let parsed: Vec<Vec<LogBlock>> = sources
        .iter()
        .map(|s| split_blocks(&s.lines, &s.tag, options.max_continuation))
        .collect();

    let mut match_count = 0;
    let mut match_times: Vec<NaiveTime> = Vec::new();
    for (source, blocks) in sources.iter().zip(&parsed) {
        let mut in_file = 0;
        for block in blocks.iter().filter(|b| b.contains(&options.keyword, options.ignore_case)) {
            in_file += 1;
            match_times.extend(block.timestamp);
        }
        debug!("{} matching blocks in {}", in_file, source.name);
        match_count += in_file;
    }

    let window = match (match_times.iter().min(), match_times.iter().max()) {
        (Some(&earliest), Some(&latest)) => Some(TimeWindow::around(earliest, latest, options.margin)),
        _ => None,
    };
    if let Some(w) = &window {
        info!("Time window {} - {}", w.start, w.end);
    }

    let mut seen = HashSet::new();
    let mut selected: Vec<LogBlock> = Vec::new();
    for block in parsed.into_iter().flatten() {
        let in_window = match (&window, block.timestamp) {
            (Some(w), Some(ts)) => w.contains(ts),
            _ => false,
        };
        if !in_window && !block.contains(&options.keyword, options.ignore_case) {
            continue;
        }
        if seen.insert(block.render()) {
            selected.push(block);
        }
    }

    // stable: equal timestamps keep source order
    selected.sort_by_key(|b| (b.timestamp.is_none(), b.timestamp));

    info!(
        "Search for '{}' matched {} blocks, {} blocks in result",
        options.keyword,
        match_count,
        selected.len()
    );

    SearchReport {
        blocks: selected,
        window,
        match_count,
        files_searched: sources.len(),
    }
}

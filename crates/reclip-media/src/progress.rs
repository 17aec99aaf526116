//! FFmpeg progress parsing.
//!
//! FFmpeg reports the input length once per input (`Duration: HH:MM:SS.ss`)
//! and the encoded position on every stats line (`time=HH:MM:SS.ss`).

use std::sync::LazyLock;

use regex::Regex;
use reclip_models::parse_timestamp;

static DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration:\s*(\d+:\d{2}:\d{2}(?:\.\d+)?)").unwrap());

static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=\s*(\d+:\d{2}:\d{2}(?:\.\d+)?)").unwrap());

/// Highest percentage reported before the process exits.
pub const MAX_RUNNING_PERCENT: u8 = 99;

/// Running progress state for one FFmpeg invocation.
#[derive(Debug, Clone, Default)]
pub struct TranscodeProgress {
    total_secs: Option<f64>,
}

impl TranscodeProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total input length, once a `Duration:` line has been seen.
    pub fn total_secs(&self) -> Option<f64> {
        self.total_secs
    }

    /// Feed one output record. Returns a percentage for `time=` records
    /// once the total is known.
    pub fn observe(&mut self, line: &str) -> Option<u8> {
        if self.total_secs.is_none() {
            if let Some(caps) = DURATION.captures(line) {
                self.total_secs = parse_timestamp(&caps[1]).ok().filter(|t| *t > 0.0);
                return None;
            }
        }

        let total = self.total_secs?;
        let caps = TIME.captures(line)?;
        let current = parse_timestamp(&caps[1]).ok()?;
        Some(percent(current, total))
    }
}

/// `min(99, floor(current / total * 100))`.
pub fn percent(current_secs: f64, total_secs: f64) -> u8 {
    if total_secs <= 0.0 || current_secs <= 0.0 {
        return 0;
    }
    let pct = (current_secs / total_secs * 100.0).floor();
    pct.min(MAX_RUNNING_PERCENT as f64) as u8
}

//! Clock-time parsing shared by trim requests and transcoder output.
//!
//! Accepts `HH:MM:SS[.ff]`, `MM:SS[.ff]` and plain seconds.

use std::fmt;

/// Parse a clock string into seconds.
///
/// # Examples
/// ```
/// use reclip_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("00:01:40.00").unwrap(), 100.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("90").unwrap(), 90.0);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    const UNITS: [&str; 3] = ["seconds", "minutes", "hours"];
    let mut total = 0.0;
    for (idx, part) in parts.iter().rev().enumerate() {
        let value: f64 = part
            .parse()
            .map_err(|_| TimestampError::InvalidValue(UNITS[idx], part.to_string()))?;
        if value < 0.0 || !value.is_finite() {
            return Err(TimestampError::Negative);
        }
        total += value * 60f64.powi(idx as i32);
    }
    Ok(total)
}

/// Whole milliseconds, the precision kept for trim bounds.
fn to_millis(total_secs: f64) -> u64 {
    (total_secs * 1000.0).round() as u64
}

/// Format seconds as `HH:MM:SS`, keeping milliseconds when present.
pub fn format_seconds(total_secs: f64) -> String {
    let ms = to_millis(total_secs);
    let hours = ms / 3_600_000;
    let mins = (ms / 60_000) % 60;
    let secs = (ms / 1000) % 60;
    let frac = ms % 1000;

    if frac > 0 {
        format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, frac)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    }
}

/// Optional trim window, normalized for the transcoder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrimRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl TrimRange {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

/// Validate optional start/end bounds. Blank values count as absent.
pub fn validate_trim(start: Option<&str>, end: Option<&str>) -> Result<TrimRange, TimestampError> {
    let start = start.filter(|s| !s.trim().is_empty()).map(parse_timestamp).transpose()?;
    let end = end.filter(|s| !s.trim().is_empty()).map(parse_timestamp).transpose()?;

    if let (Some(s), Some(e)) = (start, end) {
        if to_millis(s) >= to_millis(e) {
            return Err(TimestampError::StartNotBeforeEnd);
        }
    }

    Ok(TrimRange {
        start: start.map(format_seconds),
        end: end.map(format_seconds),
    })
}

/// Timestamp parsing/validation error.
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampError {
    Empty,
    Negative,
    InvalidValue(&'static str, String),
    InvalidFormat(String),
    StartNotBeforeEnd,
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Timestamp cannot be empty"),
            Self::Negative => write!(f, "Timestamp cannot be negative"),
            Self::InvalidValue(component, value) => {
                write!(f, "Invalid {} value: {}", component, value)
            }
            Self::InvalidFormat(ts) => write!(
                f,
                "Invalid timestamp format '{}'. Use HH:MM:SS, MM:SS or SS",
                ts
            ),
            Self::StartNotBeforeEnd => write!(f, "Start time must be before end time"),
        }
    }
}

impl std::error::Error for TimestampError {}

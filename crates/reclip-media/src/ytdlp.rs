//! yt-dlp output parsing.
//!
//! yt-dlp has no machine-readable progress mode we rely on, so every marker
//! it prints is matched here and nowhere else.

use std::sync::LazyLock;

use regex::Regex;
use reclip_models::VideoFormat;

/// `<id> <ext> <WxH> <fps> ...` rows of a `-F` listing.
static FORMAT_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(\w+)\s+(\d+x\d+)\s+([\d\s]+)").unwrap());

/// `NN.NN%` on `[download]` lines.
static PERCENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)%").unwrap());

const DESTINATION_MARKER: &str = "Destination:";
const ALREADY_DOWNLOADED_MARKER: &str = " has already been downloaded";

/// Extract the output path from a destination or already-downloaded line.
pub fn parse_output_path(line: &str) -> Option<String> {
    if let Some(idx) = line.find(DESTINATION_MARKER) {
        let path = line[idx + DESTINATION_MARKER.len()..].trim();
        return (!path.is_empty()).then(|| path.to_string());
    }

    let end = line.find(ALREADY_DOWNLOADED_MARKER)?;
    let start = line[..end].find("] ").map(|i| i + 2).unwrap_or(0);
    let path = line[start..end].trim();
    (!path.is_empty()).then(|| path.to_string())
}

/// Download percentage, truncated to an integer.
pub fn parse_download_percent(line: &str) -> Option<u8> {
    if !line.contains("[download]") {
        return None;
    }
    let caps = PERCENT.captures(line)?;
    let value: f64 = caps[1].parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u8)
}

/// Parse one `-F` listing row. Only video-only rows are considered.
pub fn parse_format_line(line: &str) -> Option<VideoFormat> {
    if !line.contains("video only") {
        return None;
    }
    let caps = FORMAT_ROW.captures(line.trim())?;
    let fps = caps[4].split_whitespace().next()?;
    Some(VideoFormat::new(&caps[1], &caps[2], &caps[3], fps))
}

/// Codec preference: lower is better.
pub fn codec_rank(line: &str) -> u8 {
    if line.contains("avc1") {
        1
    } else if line.contains("av01") {
        2
    } else if line.contains("vp9") {
        3
    } else {
        4
    }
}

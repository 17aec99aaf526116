//! Job submission payload.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::timestamp::{validate_trim, TimestampError, TrimRange};

/// What the pipeline has to produce for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Best audio stream only
    AudioOnly,
    /// Selected video stream without audio
    VideoOnly,
    /// Video and best audio muxed together
    Merge,
}

impl ProcessingMode {
    /// Container used when the request leaves `format` empty.
    pub fn default_container(&self) -> &'static str {
        match self {
            ProcessingMode::AudioOnly => "mp3",
            ProcessingMode::VideoOnly | ProcessingMode::Merge => "mp4",
        }
    }

    pub fn needs_video(&self) -> bool {
        !matches!(self, ProcessingMode::AudioOnly)
    }

    pub fn needs_audio(&self) -> bool {
        !matches!(self, ProcessingMode::VideoOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingMode::AudioOnly => "audio_only",
            ProcessingMode::VideoOnly => "video_only",
            ProcessingMode::Merge => "merge",
        }
    }
}

/// Request rejected before any work starts.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("audioOnly and videoOnly are mutually exclusive")]
    ConflictingModes,

    #[error("Invalid trim range: {0}")]
    InvalidTrim(#[from] TimestampError),
}

/// Submission payload.
///
/// Accepts the legacy field names (`youtubeUrl`, `videoId`, `isAudioOnly`,
/// `isVideoOnly`) as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Source page URL
    #[serde(alias = "youtubeUrl")]
    #[validate(length(min = 1, max = 1000, message = "url must be between 1 and 1000 characters"))]
    pub url: String,

    /// Downloader format id picked from the formats listing
    #[serde(default, alias = "videoId")]
    pub format_id: Option<String>,

    #[serde(default)]
    pub start_time: Option<String>,

    #[serde(default)]
    pub end_time: Option<String>,

    #[serde(default, alias = "isAudioOnly")]
    pub audio_only: bool,

    #[serde(default, alias = "isVideoOnly")]
    pub video_only: bool,

    /// Target resolution, `WxH`
    #[serde(default)]
    #[validate(custom(function = "validate_resolution"))]
    pub resolution: Option<String>,

    /// Output container extension
    #[serde(default)]
    #[validate(custom(function = "validate_container"))]
    pub format: Option<String>,
}

impl JobRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Derive the processing mode from the two flags.
    pub fn mode(&self) -> Result<ProcessingMode, RequestError> {
        match (self.audio_only, self.video_only) {
            (true, true) => Err(RequestError::ConflictingModes),
            (true, false) => Ok(ProcessingMode::AudioOnly),
            (false, true) => Ok(ProcessingMode::VideoOnly),
            (false, false) => Ok(ProcessingMode::Merge),
        }
    }

    /// Output container for `mode`, falling back to the mode default.
    pub fn output_container(&self, mode: ProcessingMode) -> String {
        self.format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| f.trim_start_matches('.').to_ascii_lowercase())
            .unwrap_or_else(|| mode.default_container().to_string())
    }

    /// Normalized trim window.
    pub fn trim(&self) -> Result<TrimRange, RequestError> {
        Ok(validate_trim(self.start_time.as_deref(), self.end_time.as_deref())?)
    }

    /// Target resolution, ignoring blank values.
    pub fn target_resolution(&self) -> Option<&str> {
        self.resolution.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }

    /// Full validation: field rules, mode flags and trim bounds.
    pub fn check(&self) -> Result<ProcessingMode, RequestError> {
        self.validate()?;
        let mode = self.mode()?;
        self.trim()?;
        Ok(mode)
    }
}

fn validate_resolution(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() || parse_resolution(value).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("resolution").with_message("resolution must be WxH".into()))
    }
}

fn validate_container(value: &str) -> Result<(), ValidationError> {
    let value = value.trim().trim_start_matches('.');
    if value.len() <= 8 && value.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(ValidationError::new("format").with_message("format must be a short file extension".into()))
    }
}

/// Split a `WxH` resolution into width and height.
pub fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

//! Source format listings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A video-only stream offered by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct VideoFormat {
    /// Downloader format id (e.g. `137`)
    pub id: String,
    pub extension: String,
    /// `WxH`
    pub resolution: String,
    pub fps: String,
    /// Display label, `"<res> (<fps>fps)"`
    pub label: String,
}

impl VideoFormat {
    pub fn new(
        id: impl Into<String>,
        extension: impl Into<String>,
        resolution: impl Into<String>,
        fps: impl Into<String>,
    ) -> Self {
        let resolution = resolution.into();
        let fps = fps.into();
        Self {
            id: id.into(),
            extension: extension.into(),
            label: format!("{} ({}fps)", resolution, fps),
            resolution,
            fps,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Height component of the resolution, 0 when unparseable.
    pub fn height(&self) -> u32 {
        self.resolution
            .split_once('x')
            .and_then(|(_, h)| h.parse().ok())
            .unwrap_or(0)
    }

    /// Frame rate as a number, 0 when unparseable.
    pub fn fps_value(&self) -> u32 {
        self.fps.parse().unwrap_or(0)
    }
}

/// Audio stream entry. Discovery does not populate these yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AudioFormat {
    pub id: String,
    pub bit_rate: String,
    pub codec: String,
}

/// Response of the formats listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormatsResponse {
    pub video_formats: Vec<VideoFormat>,
    pub audio_formats: Vec<AudioFormat>,
}

impl FormatsResponse {
    pub fn video(video_formats: Vec<VideoFormat>) -> Self {
        Self {
            video_formats,
            audio_formats: Vec::new(),
        }
    }
}

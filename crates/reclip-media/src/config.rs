//! External tool configuration.

use std::path::PathBuf;

const DEFAULT_REFERER: &str = "https://www.youtube.com/";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Paths and encoder settings for yt-dlp and FFmpeg.
#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// yt-dlp binary (name on PATH or absolute path)
    pub ytdlp_path: PathBuf,
    /// FFmpeg binary (name on PATH or absolute path)
    pub ffmpeg_path: PathBuf,
    /// Referer header sent by the downloader
    pub referer: String,
    /// User-agent override for the downloader
    pub user_agent: String,
    /// Video encoder used for video-only and merge output
    pub video_encoder: String,
    /// Encoder preset
    pub video_preset: String,
    /// Target video bitrate
    pub video_bitrate: String,
    /// AAC bitrate for merged and fallback audio
    pub audio_bitrate: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            referer: DEFAULT_REFERER.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            video_encoder: "h264_nvenc".to_string(),
            video_preset: "p4".to_string(),
            video_bitrate: "5M".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl ToolsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str, fallback: String| std::env::var(key).unwrap_or(fallback);

        Self {
            ytdlp_path: std::env::var("YTDLP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_path),
            ffmpeg_path: std::env::var("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            referer: var("YTDLP_REFERER", defaults.referer),
            user_agent: var("YTDLP_USER_AGENT", defaults.user_agent),
            video_encoder: var("FFMPEG_VIDEO_ENCODER", defaults.video_encoder),
            video_preset: var("FFMPEG_VIDEO_PRESET", defaults.video_preset),
            video_bitrate: var("FFMPEG_VIDEO_BITRATE", defaults.video_bitrate),
            audio_bitrate: var("FFMPEG_AUDIO_BITRATE", defaults.audio_bitrate),
        }
    }

    /// Point both tools at explicit binaries, keeping the other settings.
    pub fn with_binaries(mut self, ytdlp: impl Into<PathBuf>, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ytdlp_path = ytdlp.into();
        self.ffmpeg_path = ffmpeg.into();
        self
    }
}

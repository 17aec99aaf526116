//! yt-dlp and FFmpeg CLI wrappers.
//!
//! This crate provides:
//! - Format discovery over `yt-dlp -F` listings and format selector building
//! - Stream acquisition with progress and degraded-success handling
//! - Type-safe FFmpeg command building for trim, re-encode and mux
//! - Progress parsing from the human-readable output of both tools

pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod formats;
pub mod process;
pub mod progress;
pub mod transcode;
pub mod ytdlp;

pub use command::FfmpegCommand;
pub use config::ToolsConfig;
pub use download::{YtDlp, AUDIO_SELECTOR};
pub use error::{MediaError, MediaResult};
pub use formats::{build_format_selector, select_formats, FormatDiscovery};
pub use process::{check_tool, OutputRecordReader};
pub use progress::TranscodeProgress;
pub use transcode::{audio_codec_args, TranscodeSpec, Transcoder};

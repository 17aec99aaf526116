//! Trim, re-encode and mux with FFmpeg.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use reclip_models::{ProcessingMode, TrimRange};
use tracing::{debug, info, warn};

use crate::command::FfmpegCommand;
use crate::config::ToolsConfig;
use crate::error::{MediaError, MediaResult};
use crate::process::{spawn_merged, MergedChild};
use crate::progress::TranscodeProgress;

/// Output lines kept for failure reports.
const TAIL_LINES: usize = 20;

/// What to transcode and where.
#[derive(Debug, Clone)]
pub struct TranscodeSpec {
    pub mode: ProcessingMode,
    pub video: Option<PathBuf>,
    pub audio: Option<PathBuf>,
    pub output: PathBuf,
    pub trim: TrimRange,
    pub resolution: Option<String>,
}

impl TranscodeSpec {
    pub fn audio_only(audio: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            mode: ProcessingMode::AudioOnly,
            video: None,
            audio: Some(audio.into()),
            output: output.into(),
            trim: TrimRange::default(),
            resolution: None,
        }
    }

    pub fn video_only(video: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            mode: ProcessingMode::VideoOnly,
            video: Some(video.into()),
            audio: None,
            output: output.into(),
            trim: TrimRange::default(),
            resolution: None,
        }
    }

    pub fn merge(
        video: impl Into<PathBuf>,
        audio: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mode: ProcessingMode::Merge,
            video: Some(video.into()),
            audio: Some(audio.into()),
            output: output.into(),
            trim: TrimRange::default(),
            resolution: None,
        }
    }

    pub fn with_trim(mut self, trim: TrimRange) -> Self {
        self.trim = trim;
        self
    }

    pub fn with_resolution(mut self, resolution: Option<String>) -> Self {
        self.resolution = resolution.filter(|r| !r.trim().is_empty());
        self
    }

    /// Build the FFmpeg invocation for this spec.
    pub fn to_command(&self, tools: &ToolsConfig) -> MediaResult<FfmpegCommand> {
        let inputs: Vec<&Path> = match self.mode {
            ProcessingMode::AudioOnly => vec![self.require(&self.audio, "audio")?],
            ProcessingMode::VideoOnly => vec![self.require(&self.video, "video")?],
            ProcessingMode::Merge => vec![
                self.require(&self.video, "video")?,
                self.require(&self.audio, "audio")?,
            ],
        };

        let mut cmd = FfmpegCommand::new(&self.output);
        for input in inputs {
            if let Some(start) = &self.trim.start {
                cmd = cmd.seek(start.clone());
            }
            cmd = cmd.input(input);
        }

        if let Some(end) = &self.trim.end {
            cmd = cmd.end_at(end.clone());
        }

        if self.mode.needs_video() {
            if let Some(resolution) = &self.resolution {
                cmd = cmd.video_filter(format!("scale={}", resolution));
            }
        }

        let cmd = match self.mode {
            ProcessingMode::AudioOnly => {
                cmd.output_args(audio_codec_args(&self.output, &tools.audio_bitrate))
            }
            ProcessingMode::VideoOnly => video_settings(cmd, tools),
            ProcessingMode::Merge => video_settings(cmd, tools)
                .audio_codec("aac")
                .audio_bitrate(tools.audio_bitrate.clone()),
        };

        Ok(cmd)
    }

    fn require<'a>(&self, path: &'a Option<PathBuf>, stream: &str) -> MediaResult<&'a Path> {
        path.as_deref().ok_or_else(|| {
            MediaError::internal(format!("{} input missing for {} transcode", stream, self.mode.as_str()))
        })
    }
}

fn video_settings(cmd: FfmpegCommand, tools: &ToolsConfig) -> FfmpegCommand {
    cmd.video_codec(tools.video_encoder.clone())
        .preset(tools.video_preset.clone())
        .video_bitrate(tools.video_bitrate.clone())
}

/// Audio codec arguments chosen from the output container.
pub fn audio_codec_args(output: &Path, aac_bitrate: &str) -> Vec<String> {
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let args: Vec<&str> = match ext.as_str() {
        "mp3" => vec!["-c:a", "libmp3lame", "-q:a", "2"],
        "wav" => vec!["-c:a", "pcm_s16le"],
        _ => vec!["-c:a", "aac", "-b:a", aac_bitrate],
    };
    args.into_iter().map(String::from).collect()
}

/// FFmpeg runner with progress reporting.
#[derive(Debug, Clone)]
pub struct Transcoder {
    tools: ToolsConfig,
}

impl Transcoder {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }

    /// Run the transcode, reporting each distinct percentage.
    pub async fn run<F>(&self, spec: &TranscodeSpec, on_progress: F) -> MediaResult<()>
    where
        F: Fn(u8) + Send,
    {
        let cmd = spec.to_command(&self.tools)?;
        let ffmpeg = &self.tools.ffmpeg_path;
        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", ffmpeg.display(), args.join(" "));

        let MergedChild { mut child, mut records } =
            spawn_merged(ffmpeg, &args).map_err(|e| match e.kind() {
                ErrorKind::NotFound => MediaError::FfmpegNotFound(ffmpeg.clone()),
                _ => MediaError::Io(e),
            })?;

        let mut progress = TranscodeProgress::new();
        let mut last_percent = None;
        let mut tail = VecDeque::with_capacity(TAIL_LINES);

        while let Some(line) = records.recv().await {
            debug!(target: "reclip_media::ffmpeg", "{}", line);

            if let Some(pct) = progress.observe(&line) {
                if last_percent != Some(pct) {
                    last_percent = Some(pct);
                    on_progress(pct);
                }
            }

            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        let status = child.wait().await?;
        if status.success() {
            info!(output = %spec.output.display(), "FFmpeg finished");
            return Ok(());
        }

        let tail: Vec<String> = tail.into();
        let tail = tail.join("\n");
        warn!(
            exit_code = ?status.code(),
            output = %spec.output.display(),
            "FFmpeg failed, last output:\n{}",
            tail
        );
        Err(MediaError::ffmpeg_failed(
            "FFmpeg exited with non-zero status",
            Some(tail),
            status.code(),
        ))
    }
}

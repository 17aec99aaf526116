//! Stream acquisition using yt-dlp.
//!
//! One invocation per stream. The downloader is started with its own retry
//! and stall-detection flags; this module only interprets what it prints.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ToolsConfig;
use crate::error::{MediaError, MediaResult};
use crate::process::{spawn_merged, MergedChild};
use crate::ytdlp::{parse_download_percent, parse_output_path};

/// Selector used for every audio stream.
pub const AUDIO_SELECTOR: &str = "bestaudio";

/// yt-dlp runner.
#[derive(Debug, Clone)]
pub struct YtDlp {
    tools: ToolsConfig,
}

impl YtDlp {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }

    pub fn binary(&self) -> &Path {
        &self.tools.ytdlp_path
    }

    /// Arguments for one acquisition. The URL always follows `--` so a
    /// value starting with `-` cannot be read as an option.
    pub fn acquire_args(&self, selector: &str, output_template: &str, url: &str) -> Vec<String> {
        vec![
            "--add-header".to_string(),
            format!("Referer:{}", self.tools.referer),
            "--retries".to_string(),
            "15".to_string(),
            "--fragment-retries".to_string(),
            "15".to_string(),
            "--retry-sleep".to_string(),
            "5".to_string(),
            "--user-agent".to_string(),
            self.tools.user_agent.clone(),
            "--force-ipv4".to_string(),
            "--throttled-rate".to_string(),
            "50K".to_string(),
            "-f".to_string(),
            selector.to_string(),
            "-o".to_string(),
            output_template.to_string(),
            "--".to_string(),
            url.to_string(),
        ]
    }

    /// Download one stream.
    ///
    /// Returns the local path on success, or on a failing exit when the
    /// reported file is already on disk. `Ok(None)` means nothing usable was
    /// produced.
    pub async fn acquire<F>(
        &self,
        selector: &str,
        output_template: &str,
        url: &str,
        on_progress: F,
    ) -> MediaResult<Option<PathBuf>>
    where
        F: Fn(u8) + Send,
    {
        let args = self.acquire_args(selector, output_template, url);
        info!(selector, url, "Downloading stream");
        let MergedChild { mut child, mut records } = self.spawn(&args)?;

        let mut path: Option<String> = None;
        let mut last_percent = None;

        while let Some(line) = records.recv().await {
            debug!(target: "reclip_media::ytdlp", "{}", line);

            if let Some(found) = parse_output_path(&line) {
                path = Some(found);
            } else if let Some(pct) = parse_download_percent(&line) {
                if last_percent != Some(pct) {
                    last_percent = Some(pct);
                    on_progress(pct);
                }
            }
        }

        let status = child.wait().await?;
        let path = path.map(PathBuf::from);

        if status.success() {
            if path.is_none() {
                warn!(selector, "yt-dlp exited cleanly without reporting a destination");
            }
            return Ok(path);
        }

        match path {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => {
                warn!(
                    exit_code = ?status.code(),
                    path = %path.display(),
                    "yt-dlp failed after writing the file, using it anyway"
                );
                Ok(Some(path))
            }
            _ => {
                warn!(exit_code = ?status.code(), selector, "yt-dlp failed");
                Ok(None)
            }
        }
    }

    /// Run `<yt-dlp> -F <url>` and collect every output record.
    pub async fn list_format_lines(&self, url: &str) -> MediaResult<Vec<String>> {
        let args = list_formats_args(url);
        let MergedChild { mut child, mut records } = self.spawn(&args)?;

        let mut lines = Vec::new();
        while let Some(line) = records.recv().await {
            lines.push(line);
        }

        let status = child.wait().await?;
        if !status.success() {
            return Err(MediaError::download_failed(format!(
                "yt-dlp -F exited with {:?}",
                status.code()
            )));
        }
        Ok(lines)
    }

    /// `yt-dlp --version`.
    pub async fn version(&self) -> MediaResult<String> {
        let output = tokio::process::Command::new(self.binary())
            .arg("--version")
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        if !output.status.success() {
            return Err(MediaError::download_failed("yt-dlp --version failed"));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn spawn(&self, args: &[String]) -> MediaResult<MergedChild> {
        debug!("Running yt-dlp: {} {}", self.binary().display(), args.join(" "));
        spawn_merged(self.binary(), args).map_err(|e| self.spawn_error(e))
    }

    fn spawn_error(&self, e: std::io::Error) -> MediaError {
        match e.kind() {
            ErrorKind::NotFound => MediaError::YtDlpNotFound(self.tools.ytdlp_path.clone()),
            _ => MediaError::Io(e),
        }
    }
}

/// Arguments for a `-F` listing of `url`.
pub fn list_formats_args(url: &str) -> Vec<String> {
    vec!["-F".to_string(), "--".to_string(), url.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_args() {
        let ytdlp = YtDlp::new(ToolsConfig {
            referer: "https://ref.example/".to_string(),
            user_agent: "UA/1.0".to_string(),
            ..ToolsConfig::default()
        });
        let args = ytdlp.acquire_args("137/bv*", "/tmp/x_video.%(ext)s", "https://example.com/v");

        assert_eq!(
            args.join(" "),
            "--add-header Referer:https://ref.example/ --retries 15 --fragment-retries 15 \
             --retry-sleep 5 --user-agent UA/1.0 --force-ipv4 --throttled-rate 50K \
             -f 137/bv* -o /tmp/x_video.%(ext)s -- https://example.com/v"
        );
    }

    #[test]
    fn test_option_like_url_stays_positional() {
        let ytdlp = YtDlp::new(ToolsConfig::default());
        let url = "--exec=touch /tmp/owned";

        let args = ytdlp.acquire_args("bv*", "/tmp/x.%(ext)s", url);
        let (last, rest) = args.split_last().unwrap();
        assert_eq!(last, url);
        assert_eq!(rest.last().map(String::as_str), Some("--"));
        assert_eq!(args.iter().filter(|a| a.as_str() == url).count(), 1);

        assert_eq!(list_formats_args(url), vec!["-F", "--", url]);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let ytdlp = YtDlp::new(ToolsConfig::default().with_binaries("/nonexistent/yt-dlp", "ffmpeg"));
        let result = ytdlp.acquire(AUDIO_SELECTOR, "/tmp/x.%(ext)s", "https://e/v", |_| {}).await;
        assert!(matches!(result, Err(MediaError::YtDlpNotFound(_))));
    }
}

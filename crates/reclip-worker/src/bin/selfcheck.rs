use std::path::{Path, PathBuf};

use anyhow::Context;
use reclip_media::{check_tool, YtDlp};
use reclip_worker::WorkerConfig;
use tokio::process::Command;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "reclip-selfcheck: starting with temp_dir={} output_dir={}",
        config.temp_dir.display(),
        config.output_dir.display()
    );
    ensure_writable(&config.temp_dir).await?;
    ensure_writable(&config.output_dir).await?;

    let ffmpeg = resolve("ffmpeg", &config.tools.ffmpeg_path)?;
    ensure_ffmpeg(&ffmpeg).await?;

    resolve("yt-dlp", &config.tools.ytdlp_path)?;
    let version = YtDlp::new(config.tools.clone())
        .version()
        .await
        .context("yt-dlp not available")?;
    println!("reclip-selfcheck: yt-dlp {}", version);

    println!("reclip-selfcheck: ok");
    Ok(())
}

fn resolve(name: &str, configured: &Path) -> anyhow::Result<PathBuf> {
    let path = check_tool(configured)
        .with_context(|| format!("{} not found at {}", name, configured.display()))?;
    println!("reclip-selfcheck: {} at {}", name, path.display());
    Ok(path)
}

async fn ensure_writable(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .with_context(|| format!("cannot create {}", path.display()))?;
    tempfile::NamedTempFile::new_in(path)
        .with_context(|| format!("{} is not writable", path.display()))?;
    Ok(())
}

async fn ensure_ffmpeg(ffmpeg: &Path) -> anyhow::Result<()> {
    let output = Command::new(ffmpeg)
        .arg("-version")
        .output()
        .await
        .map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg -version failed: {:?}",
            output.status
        ));
    }
    Ok(())
}

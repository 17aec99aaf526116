//! Child process plumbing shared by the yt-dlp and FFmpeg wrappers.
//!
//! Both tools rewrite their progress line in place with carriage returns, so
//! output is split into records on either `\r` or `\n`. Stdout and stderr are
//! merged into a single record channel.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::debug;

/// Reads an async stream and yields text records delimited by `\n` or `\r`.
pub struct OutputRecordReader<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    scratch: [u8; 4096],
}

impl<R> OutputRecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            scratch: [0u8; 4096],
        }
    }

    /// Next non-empty record, trimmed. `None` at end of stream.
    pub async fn next_record(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(idx) = self.pending.iter().position(|&b| matches!(b, b'\n' | b'\r')) {
                let record_bytes: Vec<u8> = self.pending.drain(..idx).collect();
                let delimiters = self
                    .pending
                    .iter()
                    .take_while(|&&b| matches!(b, b'\n' | b'\r'))
                    .count();
                self.pending.drain(..delimiters);

                let record = String::from_utf8_lossy(&record_bytes).trim().to_string();
                if record.is_empty() {
                    continue;
                }
                return Ok(Some(record));
            }

            let n = self.reader.read(&mut self.scratch).await?;
            if n == 0 {
                let record = String::from_utf8_lossy(&self.pending).trim().to_string();
                self.pending.clear();
                return Ok((!record.is_empty()).then_some(record));
            }

            self.pending.extend_from_slice(&self.scratch[..n]);
        }
    }
}

/// A running tool with its merged output.
pub struct MergedChild {
    pub child: Child,
    pub records: mpsc::Receiver<String>,
}

/// Spawn `program` with stdout and stderr merged into one record channel.
///
/// The channel closes once both streams reach end of file.
pub fn spawn_merged(program: &Path, args: &[String]) -> io::Result<MergedChild> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let (tx, records) = mpsc::channel(256);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_records(stdout, tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_records(stderr, tx));
    }

    Ok(MergedChild { child, records })
}

async fn forward_records<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = OutputRecordReader::new(stream);
    loop {
        match reader.next_record().await {
            Ok(Some(record)) => {
                if tx.send(record).await.is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }
}

/// Resolve a tool given as a bare name on PATH or as an explicit path.
pub fn check_tool(program: &Path) -> Option<PathBuf> {
    which::which(program).ok()
}

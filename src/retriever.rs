//! # Retriever Module
//!
//! Fetches remote media into a local file through `yt-dlp`.
//!
//! ## Flusso:
//! 1. Probe dei metadati con `--dump-single-json` (titolo, durata, diretta)
//! 2. Le dirette vengono rifiutate prima di qualsiasi download
//! 3. Download con `--print after_move:filepath` per conoscere il path finale
//!
//! ## Esempio:
//! ```rust,no_run
//! # async fn demo() -> clip_transformer::error::Result<()> {
//! use clip_transformer::retriever::{FetchOptions, Retriever, YtDlpRetriever};
//!
//! let retriever = YtDlpRetriever::new("yt-dlp");
//! let media = retriever.fetch("https://example.com/watch?v=abc", &FetchOptions::default()).await?;
//! println!("{} -> {}", media.title, media.local_path.display());
//! # Ok(())
//! # }
//! ```

use crate::error::{Result, TransformError};
use crate::file_manager::FileManager;
use serde::Deserialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Default yt-dlp format selector: best video and audio merged, or best single file
pub const DEFAULT_FORMAT: &str = "bestvideo+bestaudio/best";
/// Output template relative to the download directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

const PROBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Options for a single fetch
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub download_dir: PathBuf,
    pub format: String,
    pub no_playlist: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            format: DEFAULT_FORMAT.to_string(),
            no_playlist: true,
        }
    }
}

/// Local copy of a remote video
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedMedia {
    pub local_path: PathBuf,
    pub title: String,
    pub is_live: bool,
    pub duration_seconds: Option<f64>,
}

/// Source of local media files
pub trait Retriever {
    fn fetch(&self, url: &str, options: &FetchOptions) -> impl Future<Output = Result<RetrievedMedia>> + Send;
}

/// Subset of yt-dlp's info JSON we care about
#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    is_live: Option<bool>,
    #[serde(default)]
    live_status: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

impl VideoInfo {
    fn is_live(&self) -> bool {
        self.is_live.unwrap_or(false)
            || matches!(self.live_status.as_deref(), Some("is_live") | Some("is_upcoming"))
    }
}

/// Retriever backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlpRetriever {
    program: PathBuf,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlpRetriever {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ffmpeg_location: None,
        }
    }

    /// ffmpeg used by yt-dlp to merge separate video and audio streams
    pub fn with_ffmpeg_location(mut self, ffmpeg: impl Into<PathBuf>) -> Self {
        self.ffmpeg_location = Some(ffmpeg.into());
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
        cmd
    }

    async fn output(&self, mut cmd: Command, timeout: Option<Duration>) -> Result<std::process::Output> {
        let program = self.program.display().to_string();
        let run = cmd.output();
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| TransformError::Retrieval(format!("{} timed out after {}s", program, limit.as_secs())))?,
            None => run.await,
        }
        .map_err(|source| TransformError::ExecutionError { program, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TransformError::Retrieval(stderr.trim().to_string()));
        }
        Ok(output)
    }

    async fn probe(&self, url: &str, options: &FetchOptions) -> Result<VideoInfo> {
        let mut cmd = self.command();
        cmd.args(["--dump-single-json", "--no-warnings", "--skip-download"]);
        if options.no_playlist {
            cmd.arg("--no-playlist");
        }
        cmd.arg(url);

        let output = self.output(cmd, Some(PROBE_TIMEOUT)).await?;
        parse_info(&output.stdout)
    }

    fn download_command(&self, url: &str, options: &FetchOptions) -> Command {
        let template = options.download_dir.join(OUTPUT_TEMPLATE);

        let mut cmd = self.command();
        cmd.args(["--format", &options.format, "--quiet", "--no-warnings", "--no-simulate"])
            .args(["--print", "after_move:filepath", "--output"])
            .arg(&template);
        if let Some(ref ffmpeg) = self.ffmpeg_location {
            cmd.arg("--ffmpeg-location").arg(ffmpeg);
        }
        if options.no_playlist {
            cmd.arg("--no-playlist");
        }
        cmd.arg(url);
        cmd
    }

    async fn download(&self, url: &str, options: &FetchOptions) -> Result<PathBuf> {
        FileManager::ensure_dir(&options.download_dir).await?;
        let cmd = self.download_command(url, options);

        // downloads can legitimately take a long time
        let output = self.output(cmd, None).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_printed_path(&stdout)
            .ok_or_else(|| TransformError::Retrieval(format!("yt-dlp did not report a file for {}", url)))
    }
}

impl Retriever for YtDlpRetriever {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<RetrievedMedia> {
        debug!("Probing {}", url);
        let info = self.probe(url, options).await?;
        let title = info.title.clone().unwrap_or_else(|| "untitled".to_string());
        if info.is_live() {
            return Err(TransformError::LiveStream(title));
        }

        info!("⬇️  Downloading \"{}\"", title);
        let local_path = self.download(url, options).await?;
        Ok(RetrievedMedia {
            local_path,
            title,
            is_live: false,
            duration_seconds: info.duration,
        })
    }
}

fn parse_info(stdout: &[u8]) -> Result<VideoInfo> {
    Ok(serde_json::from_slice(stdout)?)
}

/// Last non-empty line printed by yt-dlp
fn parse_printed_path(stdout: &str) -> Option<PathBuf> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(PathBuf::from)
}

/// True for http(s) links
pub fn is_remote(source: &str) -> bool {
    let lower = source.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Either a link to fetch or a file already on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Url(String),
    LocalFile(PathBuf),
}

impl MediaSource {
    pub fn parse(source: &str) -> Self {
        if is_remote(source) {
            MediaSource::Url(source.trim().to_string())
        } else {
            MediaSource::LocalFile(Path::new(source).to_path_buf())
        }
    }
}

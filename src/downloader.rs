use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, BufReader},
    process::Command,
};
use tracing::debug;

use crate::{
    error::{AppError, Result},
    model::MediaMode,
    progress::{parse_progress_line, ProgressEvent, PROGRESS_TEMPLATE},
};

/// Everything yt-dlp needs to fetch one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub mode: MediaMode,
    /// Output path with yt-dlp placeholders, e.g. `/music/%(title)s.%(ext)s`
    pub output_template: String,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, mode: MediaMode, destination: &Path) -> Self {
        Self {
            url: url.into(),
            mode,
            output_template: destination
                .join("%(title)s.%(ext)s")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedMedia {
    /// Title as resolved by the extractor, or the URL if none was reported
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub title: String,
    /// One watch URL per entry, in playlist order
    pub entries: Vec<String>,
}

/// Media extraction backend.
///
/// Calls are not interrupted on cancel; callers simply ignore the result.
/// Dropping an in-flight call does stop any process it started.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: &mut (dyn FnMut(ProgressEvent) + Send),
    ) -> Result<DownloadedMedia>;

    async fn extract_playlist(&self, url: &str) -> Result<Playlist>;
}

/// Drives an external `yt-dlp` executable
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        // A dropped worker (cancel-and-quit, runtime shutdown) takes the child with it.
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> AppError {
        AppError::Spawn {
            program: self.program.display().to_string(),
            source,
        }
    }
}

/// Builds the yt-dlp argument list for one download.
pub fn download_args(request: &DownloadRequest) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    match request.mode {
        MediaMode::Audio => {
            args.extend(
                ["-f", "bestaudio/best", "-x", "--audio-format", "mp3", "--audio-quality", "192K"]
                    .map(String::from),
            );
        }
        MediaMode::Video => {
            args.extend(
                [
                    "-f",
                    "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
                    "--merge-output-format",
                    "mp4",
                ]
                .map(String::from),
            );
        }
    }

    args.push("--no-playlist".to_owned());
    args.push("--no-colors".to_owned());
    args.push("--newline".to_owned());
    args.push("--progress-template".to_owned());
    args.push(PROGRESS_TEMPLATE.to_owned());

    args.push("-o".to_owned());
    args.push(request.output_template.clone());
    args.push(request.url.clone());
    args
}

#[async_trait]
impl MediaDownloader for YtDlp {
    async fn download(
        &self,
        request: &DownloadRequest,
        on_progress: &mut (dyn FnMut(ProgressEvent) + Send),
    ) -> Result<DownloadedMedia> {
        let mut child = self
            .command()
            .args(download_args(request))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("yt-dlp stderr was not captured"))?;

        // Drain stderr concurrently so a chatty child cannot block on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buf).await;
            buf
        });

        let mut title = None;
        let mut finished = false;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            debug!(target: "tubedeck::ytdlp", "{}", line);
            if let Some(progress) = parse_progress_line(&line) {
                if title.is_none() {
                    title = progress.title;
                }
                if progress.event == ProgressEvent::Finished {
                    finished = true;
                }
                on_progress(progress.event);
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(AppError::Process {
                code: status.to_string(),
                stderr: summarize_stderr(&stderr),
            });
        }
        if !finished {
            on_progress(ProgressEvent::Finished);
        }

        Ok(DownloadedMedia {
            title: title.unwrap_or_else(|| request.url.clone()),
        })
    }

    async fn extract_playlist(&self, url: &str) -> Result<Playlist> {
        let output = self
            .command()
            .args(["--flat-playlist", "-J", "--no-warnings", url])
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(AppError::Process {
                code: output.status.to_string(),
                stderr: summarize_stderr(&String::from_utf8_lossy(&output.stderr)),
            });
        }
        playlist_from_json(&output.stdout)
    }
}

#[derive(Deserialize)]
struct FlatPlaylist {
    title: Option<String>,
    id: Option<String>,
    #[serde(default)]
    entries: Vec<FlatEntry>,
}

#[derive(Deserialize)]
struct FlatEntry {
    id: Option<String>,
    url: Option<String>,
}

/// Parses `yt-dlp --flat-playlist -J` output.
pub fn playlist_from_json(raw: &[u8]) -> Result<Playlist> {
    let parsed: FlatPlaylist = serde_json::from_slice(raw)?;
    let entries: Vec<String> = parsed
        .entries
        .into_iter()
        .filter_map(|entry| match (entry.url, entry.id) {
            (Some(url), _) if url.starts_with("http") => Some(url),
            (_, Some(id)) => Some(format!("https://www.youtube.com/watch?v={}", id)),
            (Some(url), None) => Some(url),
            (None, None) => None,
        })
        .collect();

    if entries.is_empty() {
        return Err(AppError::NoEntries);
    }

    let title = parsed
        .title
        .filter(|t| !t.trim().is_empty())
        .or(parsed.id)
        .unwrap_or_else(|| "playlist".to_string());
    Ok(Playlist { title, entries })
}

// yt-dlp prints warnings and errors to stderr; keep the `ERROR:` lines if any.
fn summarize_stderr(stderr: &str) -> String {
    let errors: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return errors.join("; ");
    }
    stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("no output")
        .to_string()
}

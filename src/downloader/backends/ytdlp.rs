// yt-dlp backend: format listing, download and ffmpeg merge

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::downloader::errors::{DownloadError, FetchError};
use crate::downloader::extractors::{diagnose_error, explain, CliInfoExtractor, ExtractorConfig};
use crate::downloader::models::{ContainerFormat, ResolvedSelection, StreamVariant};
use crate::downloader::route::RouteHandle;
use crate::downloader::tools::YtDlpCommand;
use crate::downloader::traits::MediaAdapter;
use crate::downloader::utils::spawn_error;

/// One recognised line of yt-dlp `--newline` output
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressLine {
    Downloading { percent: f32, status: String },
    Destination(String),
    Merging,
    AlreadyDownloaded,
}

/// Parse yt-dlp progress line like:
/// [download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32 (frag 29/454)
pub fn parse_ytdlp_progress(line: &str) -> Option<ProgressLine> {
    lazy_static::lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\d+\.?\d*\s*\w+)(?:\s+at\s+(\S+/s))?(?:\s+ETA\s+(\S+))?"
        ).expect("progress regex");
        static ref DEST_RE: Regex = Regex::new(r"\[download\]\s+Destination:\s+(.+)").expect("destination regex");
        static ref MERGE_RE: Regex = Regex::new(r"\[Merger?\]\s+Merging").expect("merge regex");
        static ref ALREADY_RE: Regex = Regex::new(r"has already been downloaded").expect("already regex");
    }

    if let Some(caps) = PROGRESS_RE.captures(line) {
        let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
        let size = caps.get(2).map_or("?", |m| m.as_str());
        let speed = caps.get(3).map_or("?", |m| m.as_str());
        let status = match caps.get(4) {
            Some(eta) => format!("{:.1}% of {} @ {} ETA {}", percent, size, speed, eta.as_str()),
            None => format!("{:.1}% of {} @ {}", percent, size, speed),
        };
        return Some(ProgressLine::Downloading { percent, status });
    }

    if let Some(caps) = DEST_RE.captures(line) {
        return caps.get(1).map(|m| ProgressLine::Destination(m.as_str().trim().to_string()));
    }

    if MERGE_RE.is_match(line) {
        return Some(ProgressLine::Merging);
    }

    if ALREADY_RE.is_match(line) {
        return Some(ProgressLine::AlreadyDownloaded);
    }

    None
}

pub struct YtDlpAdapter {
    command: YtDlpCommand,
    extractor: CliInfoExtractor,
    config: ExtractorConfig,
}

impl YtDlpAdapter {
    pub fn new(command: YtDlpCommand, config: ExtractorConfig) -> Self {
        Self {
            extractor: CliInfoExtractor::new(command.clone()),
            command,
            config,
        }
    }

    fn build_download_args(
        &self,
        url: &str,
        selection: &ResolvedSelection,
        route: &RouteHandle,
        output_dir: &Path,
        container: ContainerFormat,
    ) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            selection.format_spec(),
            "--merge-output-format".to_string(),
            container.as_str().to_string(),
            "--no-playlist".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.socket_timeout_secs.to_string(),
            "-P".to_string(),
            output_dir.to_string_lossy().to_string(),
            "-o".to_string(),
            "%(title)s.%(ext)s".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ];

        args.extend(self.config.cookies.args());

        if let Some(proxy) = route.proxy_url() {
            args.push("--proxy".to_string());
            args.push(proxy.to_string());
        }

        args.push(url.to_string());
        self.command.args(args)
    }
}

/// Last stdout line that is not yt-dlp chatter is the `--print` output
fn final_path(lines: &[String]) -> Option<PathBuf> {
    lines
        .iter()
        .rev()
        .map(|l| l.trim())
        .find(|l| !l.is_empty() && !l.starts_with('[') && !l.starts_with("ERROR") && !l.starts_with("WARNING"))
        .map(PathBuf::from)
}

#[async_trait]
impl MediaAdapter for YtDlpAdapter {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn list_variants(
        &self,
        url: &str,
        route: &RouteHandle,
    ) -> Result<Vec<StreamVariant>, FetchError> {
        let info = self.extractor.extract(url, &self.config, route.proxy_url()).await?;
        debug!("'{}' offers {} formats", info.title, info.formats.len());
        Ok(info.catalog())
    }

    async fn fetch_and_mux(
        &self,
        url: &str,
        selection: &ResolvedSelection,
        route: &RouteHandle,
        output_dir: &Path,
        container: ContainerFormat,
    ) -> Result<PathBuf, FetchError> {
        let args = self.build_download_args(url, selection, route, output_dir, container);
        debug!("Running: {} {}", self.command.program, args.join(" "));

        let mut child = Command::new(&self.command.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.command.program, e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let mut reader = BufReader::new(stdout).lines();
        let mut plain_lines = Vec::new();
        let mut last_logged_decile = -1i32;

        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to read yt-dlp output: {}", e)))?
        {
            match parse_ytdlp_progress(&line) {
                Some(ProgressLine::Downloading { percent, status }) => {
                    let decile = (percent / 10.0) as i32;
                    if decile != last_logged_decile {
                        last_logged_decile = decile;
                        debug!("{} {}", url, status);
                    }
                }
                Some(ProgressLine::Destination(file)) => {
                    last_logged_decile = -1;
                    debug!("{} -> {}", url, file);
                }
                Some(ProgressLine::Merging) => info!("Merging video and audio for {}", url),
                Some(ProgressLine::AlreadyDownloaded) => info!("{} already downloaded", url),
                None => plain_lines.push(line),
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::ExecutionError(format!("Process error: {}", e)))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if !status.success() {
            if let Some(reason) = diagnose_error(&stderr_output) {
                warn!("Download failed for {}: {}", url, explain(reason));
            }
            return Err(DownloadError::from(stderr_output).into());
        }

        final_path(&plain_lines)
            .ok_or_else(|| DownloadError::ParseError("yt-dlp did not report the output path".to_string()).into())
    }
}

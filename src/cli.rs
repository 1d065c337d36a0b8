// Command-line flags

use std::path::PathBuf;

use clap::Parser;

use crate::downloader::models::{ContainerFormat, QualityPreset, VideoCodec};

pub const DEFAULT_QUEUE_FILE: &str = "downloadqueue.txt";

#[derive(Debug, Parser)]
#[command(name = "youtube-batch-downloader", version)]
#[command(about = "Download a queue of videos with yt-dlp, merged into one file each")]
pub struct Cli {
    /// Queue file with one URL per line (`#` in the first column starts a comment)
    #[arg(short = 'i', long = "input", value_name = "FILE", default_value = DEFAULT_QUEUE_FILE)]
    pub queue_file: PathBuf,

    /// Quality ceiling
    #[arg(short, long, value_enum)]
    pub quality: Option<QualityPreset>,

    /// Preferred video codec
    #[arg(short, long, value_enum)]
    pub codec: Option<VideoCodec>,

    /// Target audio bitrate in kbps (96, 128, 192, 256, 320)
    #[arg(short = 'a', long, value_name = "KBPS")]
    pub audio_bitrate: Option<u32>,

    /// Videos downloaded at the same time
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Retries for network errors and rate limiting
    #[arg(long)]
    pub retries: Option<u32>,

    /// Base wait between retries in seconds
    #[arg(long, value_name = "SECS")]
    pub retry_wait: Option<u64>,

    /// Proxy URL, e.g. socks5://127.0.0.1:1080
    #[arg(long, conflicts_with = "tor")]
    pub proxy: Option<String>,

    /// Route traffic through the local Tor SOCKS proxy
    #[arg(long)]
    pub tor: bool,

    /// Tor SOCKS endpoint (default socks5://127.0.0.1:9050)
    #[arg(long, value_name = "URL")]
    pub tor_endpoint: Option<String>,

    /// Directory for merged files (default ./downloads)
    #[arg(short, long, visible_alias = "output-dir", value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Output container
    #[arg(long, value_enum)]
    pub container: Option<ContainerFormat>,

    /// Load cookies from a browser (chrome, firefox, safari, ...)
    #[arg(long, value_name = "BROWSER")]
    pub cookies_from_browser: Option<String>,

    /// Netscape cookies.txt file
    #[arg(long, value_name = "FILE")]
    pub cookies: Option<PathBuf>,

    /// Path to the yt-dlp executable
    #[arg(long, value_name = "PATH")]
    pub ytdlp_path: Option<String>,

    /// yt-dlp socket timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub socket_timeout: Option<u32>,

    /// Timeout for the yt-dlp metadata call in seconds
    #[arg(long, value_name = "SECS")]
    pub info_timeout: Option<u64>,

    /// Write a JSON report of the run
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// YAML config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show detected yt-dlp and ffmpeg, then exit
    #[arg(long, default_value_t = false)]
    pub check_tools: bool,

    /// Show the external IP seen through the configured route, then exit
    #[arg(long, default_value_t = false)]
    pub check_route: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Also write a debug log to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "youtube-batch-downloader",
            "-i",
            "queue.txt",
            "-q",
            "4k",
            "-c",
            "vp9",
            "-a",
            "256",
            "-o",
            "videos",
            "-j",
            "3",
            "--tor",
        ])
        .unwrap();

        assert_eq!(cli.queue_file, PathBuf::from("queue.txt"));
        assert_eq!(cli.quality, Some(QualityPreset::K4));
        assert_eq!(cli.codec, Some(VideoCodec::Vp9));
        assert_eq!(cli.audio_bitrate, Some(256));
        assert_eq!(cli.output, Some(PathBuf::from("videos")));
        assert_eq!(cli.concurrency, Some(3));
        assert!(cli.tor);
        assert_eq!(cli.proxy, None);
    }

    #[test]
    fn test_default_queue_file() {
        let cli = Cli::try_parse_from(["youtube-batch-downloader"]).unwrap();
        assert_eq!(cli.queue_file, PathBuf::from(DEFAULT_QUEUE_FILE));
        assert_eq!(cli.config, None);

        let cli = Cli::try_parse_from(["youtube-batch-downloader", "--output-dir", "out"]).unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_proxy_conflicts_with_tor() {
        let res = Cli::try_parse_from([
            "youtube-batch-downloader",
            "--proxy",
            "http://p:8080",
            "--tor",
        ]);
        assert!(res.is_err());
    }
}

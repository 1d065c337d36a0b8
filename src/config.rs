// Run configuration: YAML file merged with command-line flags

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cli::Cli;
use crate::downloader::extractors::CookieSource;
use crate::downloader::models::{
    ContainerFormat, OutputOptions, QualityPreference, QualityPreset, VideoCodec, AUDIO_BITRATES,
};
use crate::downloader::processor::ProcessorSettings;
use crate::downloader::route::{self, RouteError, RouteHandle};

pub const CONFIG_FILE_NAME: &str = "config.yaml";
const APP_DIR: &str = "youtube-batch-downloader";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid yaml at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("unsupported audio bitrate {0} kbps (expected one of 96, 128, 192, 256, 320)")]
    AudioBitrate(u32),
    #[error("validation error: {0}")]
    Validation(String),
}

/// Keys accepted in the YAML config file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub quality: Option<QualityPreset>,
    pub codec: Option<VideoCodec>,
    pub audio_bitrate: Option<u32>,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    /// Seconds
    pub retry_wait: Option<u64>,
    pub proxy: Option<String>,
    pub tor: Option<bool>,
    pub overlay_endpoint: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub container: Option<ContainerFormat>,
    pub cookies_from_browser: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub ytdlp_path: Option<String>,
    pub socket_timeout_secs: Option<u32>,
    pub info_timeout_secs: Option<u64>,
    pub report_path: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `<config dir>/youtube-batch-downloader/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    /// Explicit path must exist; the default location is optional
    pub fn discover(explicit: Option<&Path>) -> Result<Option<(PathBuf, Self)>, ConfigError> {
        if let Some(path) = explicit {
            return Ok(Some((path.to_path_buf(), Self::load(path)?)));
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                let config = Self::load(&path)?;
                Ok(Some((path, config)))
            }
            _ => Ok(None),
        }
    }
}

/// Fully validated settings for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub preference: QualityPreference,
    pub settings: ProcessorSettings,
    pub route: RouteHandle,
    pub output: OutputOptions,
    pub cookies: CookieSource,
    pub ytdlp_path: Option<String>,
    pub socket_timeout_secs: u32,
    pub info_timeout_secs: u64,
    pub report_path: Option<PathBuf>,
}

impl RunConfig {
    /// Flags win over the file, the file wins over defaults
    pub fn resolve(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let defaults = ProcessorSettings::default();

        let quality = cli.quality.or(file.quality).unwrap_or_default();
        let codec = cli.codec.or(file.codec).unwrap_or_default();
        let audio_kbps = cli.audio_bitrate.or(file.audio_bitrate).unwrap_or(192);
        if !AUDIO_BITRATES.contains(&audio_kbps) {
            return Err(ConfigError::AudioBitrate(audio_kbps));
        }

        let settings = ProcessorSettings {
            concurrency_limit: cli
                .concurrency
                .or(file.concurrency)
                .unwrap_or(defaults.concurrency_limit),
            retry_count: cli.retries.or(file.retries).unwrap_or(defaults.retry_count),
            retry_wait: cli
                .retry_wait
                .or(file.retry_wait)
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_wait),
        };
        if settings.concurrency_limit == 0 {
            return Err(ConfigError::Validation("concurrency must be at least 1".to_string()));
        }

        let proxy = cli.proxy.clone().or(file.proxy);
        let use_overlay = cli.tor || file.tor.unwrap_or(false);
        let overlay_endpoint = cli.tor_endpoint.clone().or(file.overlay_endpoint);
        let route = route::select(proxy.as_deref(), use_overlay, overlay_endpoint.as_deref())?;

        let output_defaults = OutputOptions::default();
        let output = OutputOptions {
            output_dir: cli
                .output
                .clone()
                .or(file.output_dir)
                .unwrap_or(output_defaults.output_dir),
            container: cli.container.or(file.container).unwrap_or_default(),
        };

        let cookies = CookieSource::from_options(
            cli.cookies_from_browser.clone().or(file.cookies_from_browser),
            cli.cookies.clone().or(file.cookies_file),
        );
        if let CookieSource::File(path) = &cookies {
            if !path.is_file() {
                return Err(ConfigError::Validation(format!(
                    "cookies file not found: {}",
                    path.display()
                )));
            }
        }

        let socket_timeout_secs = cli.socket_timeout.or(file.socket_timeout_secs).unwrap_or(30);
        if socket_timeout_secs == 0 {
            return Err(ConfigError::Validation("socket timeout must be positive".to_string()));
        }
        let info_timeout_secs = cli.info_timeout.or(file.info_timeout_secs).unwrap_or(90);
        if info_timeout_secs == 0 {
            return Err(ConfigError::Validation("metadata timeout must be positive".to_string()));
        }

        Ok(Self {
            preference: QualityPreference::new(quality, codec, audio_kbps),
            settings,
            route,
            output,
            cookies,
            ytdlp_path: cli.ytdlp_path.clone().or(file.ytdlp_path),
            socket_timeout_secs,
            info_timeout_secs,
            report_path: cli.report.clone().or(file.report_path),
        })
    }
}

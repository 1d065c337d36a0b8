// CLI InfoExtractor - runs `yt-dlp --dump-json` and parses the format list

use tracing::{debug, warn};

use super::diagnostics::{diagnose_error, explain};
use super::types::{ExtendedFormat, ExtendedVideoInfo, ExtractorConfig};
use crate::downloader::errors::DownloadError;
use crate::downloader::tools::YtDlpCommand;
use crate::downloader::utils::run_output_with_timeout;

/// CLI-based info extractor using yt-dlp
pub struct CliInfoExtractor {
    command: YtDlpCommand,
}

impl CliInfoExtractor {
    pub fn new(command: YtDlpCommand) -> Self {
        Self { command }
    }

    /// Build command arguments
    fn build_args(&self, url: &str, config: &ExtractorConfig, proxy: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            config.socket_timeout_secs.to_string(),
        ];

        args.extend(config.cookies.args());

        if let Some(proxy) = proxy {
            args.push("--proxy".to_string());
            args.push(proxy.to_string());
        }

        args.push(url.to_string());
        self.command.args(args)
    }

    pub fn parse_json(stdout: &[u8]) -> Result<ExtendedVideoInfo, DownloadError> {
        let json_str = String::from_utf8_lossy(stdout);
        let json: serde_json::Value = serde_json::from_str(&json_str)
            .map_err(|e| DownloadError::ParseError(format!("Invalid JSON: {}", e)))?;

        let formats = Self::parse_formats(&json)?;

        Ok(ExtendedVideoInfo {
            id: json["id"].as_str().unwrap_or("unknown").to_string(),
            title: json["title"].as_str().unwrap_or("Unknown").to_string(),
            webpage_url: json["webpage_url"].as_str().unwrap_or("").to_string(),
            formats,
        })
    }

    fn parse_formats(json: &serde_json::Value) -> Result<Vec<ExtendedFormat>, DownloadError> {
        let formats_array = json["formats"]
            .as_array()
            .ok_or_else(|| DownloadError::ParseError("No formats array in JSON".to_string()))?;

        let formats = formats_array
            .iter()
            .map(|f| ExtendedFormat {
                format_id: f["format_id"].as_str().unwrap_or("").to_string(),
                ext: f["ext"].as_str().unwrap_or("").to_string(),
                height: f["height"].as_u64().map(|h| h as u32),
                vcodec: f["vcodec"].as_str().map(|s| s.to_string()),
                acodec: f["acodec"].as_str().map(|s| s.to_string()),
                abr: f["abr"].as_f64().map(|a| a as f32),
                tbr: f["tbr"].as_f64().map(|t| t as f32),
            })
            .filter(|f| !f.format_id.is_empty())
            .collect();

        Ok(formats)
    }

    /// Fetch video info with its format list
    pub async fn extract(
        &self,
        url: &str,
        config: &ExtractorConfig,
        proxy: Option<&str>,
    ) -> Result<ExtendedVideoInfo, DownloadError> {
        let args = self.build_args(url, config, proxy);
        debug!("Running: {} {}", self.command.program, args.join(" "));

        let out = run_output_with_timeout(&self.command.program, args, config.info_timeout_secs).await?;

        if out.status.success() {
            return Self::parse_json(&out.stdout);
        }

        let stderr = String::from_utf8_lossy(&out.stderr).to_string();
        if let Some(reason) = diagnose_error(&stderr) {
            warn!("Info extraction failed for {}: {}", url, explain(reason));
        }
        Err(DownloadError::from(stderr))
    }
}

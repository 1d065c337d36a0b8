// Extractor configuration and raw format types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::downloader::models::{CodecFamily, StreamVariant, VariantKind};

/// Where yt-dlp should take cookies from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CookieSource {
    #[default]
    None,
    /// Browser name passed to `--cookies-from-browser` (chrome, firefox, ...)
    Browser(String),
    /// Netscape cookies.txt file
    File(PathBuf),
}

impl CookieSource {
    /// Browser wins over file when both are configured
    pub fn from_options(browser: Option<String>, file: Option<PathBuf>) -> Self {
        match (browser, file) {
            (Some(browser), _) => Self::Browser(browser),
            (None, Some(file)) => Self::File(file),
            (None, None) => Self::None,
        }
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::Browser(browser) => vec!["--cookies-from-browser".to_string(), browser.clone()],
            Self::File(path) => vec!["--cookies".to_string(), path.to_string_lossy().to_string()],
        }
    }
}

/// Configuration shared by every extractor call
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub cookies: CookieSource,
    /// Passed to `--socket-timeout`
    pub socket_timeout_secs: u32,
    /// Hard limit for the metadata (`--dump-json`) call
    pub info_timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            cookies: CookieSource::None,
            socket_timeout_secs: 30,
            info_timeout_secs: 90,
        }
    }
}

impl ExtractorConfig {
    pub fn with_cookies(mut self, cookies: CookieSource) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout_secs = seconds;
        self
    }

    pub fn with_info_timeout(mut self, seconds: u64) -> Self {
        self.info_timeout_secs = seconds;
        self
    }
}

/// Extended format information from yt-dlp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedFormat {
    /// Format ID (e.g., "137", "140")
    pub format_id: String,
    /// File extension (mp4, webm, m4a)
    pub ext: String,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Video codec (avc1, vp9, av01, none)
    pub vcodec: Option<String>,
    /// Audio codec (mp4a, opus, none)
    pub acodec: Option<String>,
    /// Audio bitrate in kbps
    pub abr: Option<f32>,
    /// Total bitrate in kbps
    pub tbr: Option<f32>,
}

impl ExtendedFormat {
    fn has_codec(codec: &Option<String>) -> bool {
        codec.as_ref().map_or(false, |c| c != "none" && !c.is_empty())
    }

    pub fn has_video(&self) -> bool {
        Self::has_codec(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        Self::has_codec(&self.acodec)
    }

    /// Convert to a catalog entry; storyboards and trackless formats yield `None`
    pub fn to_variant(&self) -> Option<StreamVariant> {
        if self.ext == "mhtml" {
            return None;
        }

        let kind = match (self.has_video(), self.has_audio()) {
            (true, true) => VariantKind::Combined,
            (true, false) => VariantKind::VideoOnly,
            (false, true) => VariantKind::AudioOnly,
            (false, false) => return None,
        };

        let audio_bitrate_kbps = if kind == VariantKind::VideoOnly {
            None
        } else {
            self.abr
                .or(if kind == VariantKind::AudioOnly { self.tbr } else { None })
                .map(|b| b.round() as u32)
        };

        Some(StreamVariant {
            container_id: self.format_id.clone(),
            resolution_height: if kind == VariantKind::AudioOnly { None } else { self.height },
            codec_family: CodecFamily::from_vcodec(self.vcodec.as_deref()),
            kind,
            audio_bitrate_kbps,
            ext: Some(self.ext.clone()),
        })
    }
}

/// Extended video info with all formats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedVideoInfo {
    pub id: String,
    pub title: String,
    pub webpage_url: String,
    pub formats: Vec<ExtendedFormat>,
}

impl ExtendedVideoInfo {
    /// Catalog of downloadable variants in extractor order
    pub fn catalog(&self) -> Vec<StreamVariant> {
        self.formats.iter().filter_map(ExtendedFormat::to_variant).collect()
    }
}

// Common data models for the batch downloader

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Audio bitrates a user may target (kbps)
pub const AUDIO_BITRATES: [u32; 5] = [320, 256, 192, 128, 96];

/// Codec family of a stream variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecFamily {
    Av1,
    H264,
    H265,
    Vp9,
    /// Video codec we do not rank (e.g. mp4v, theora)
    Other,
    /// No video track (audio-only variants)
    None,
}

impl CodecFamily {
    /// Classify a raw yt-dlp `vcodec` string (e.g. "avc1.640028", "vp09.00.40.08")
    pub fn from_vcodec(vcodec: Option<&str>) -> Self {
        let Some(raw) = vcodec else {
            return Self::None;
        };
        let lower = raw.trim().to_lowercase();

        if lower.is_empty() || lower == "none" {
            Self::None
        } else if lower.starts_with("av01") || lower == "av1" {
            Self::Av1
        } else if lower.starts_with("avc1") || lower.starts_with("avc3") || lower == "h264" {
            Self::H264
        } else if lower.starts_with("hev1") || lower.starts_with("hvc1") || lower == "h265" || lower == "hevc" {
            Self::H265
        } else if lower.starts_with("vp9") || lower.starts_with("vp09") {
            Self::Vp9
        } else {
            Self::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Av1 => "AV1",
            Self::H264 => "H.264",
            Self::H265 => "H.265",
            Self::Vp9 => "VP9",
            Self::Other => "other",
            Self::None => "none",
        }
    }
}

impl fmt::Display for CodecFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Codecs a user can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    Av1,
    #[default]
    H264,
    H265,
    Vp9,
}

impl From<VideoCodec> for CodecFamily {
    fn from(codec: VideoCodec) -> Self {
        match codec {
            VideoCodec::Av1 => CodecFamily::Av1,
            VideoCodec::H264 => CodecFamily::H264,
            VideoCodec::H265 => CodecFamily::H265,
            VideoCodec::Vp9 => CodecFamily::Vp9,
        }
    }
}

/// Whether a variant carries video, audio or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariantKind {
    VideoOnly,
    AudioOnly,
    Combined,
}

impl VariantKind {
    /// Variants that can serve as the video component of a selection
    pub fn has_video(&self) -> bool {
        matches!(self, Self::VideoOnly | Self::Combined)
    }
}

/// One entry in a video's available-format catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Identifier the adapter uses to request exactly this variant (yt-dlp format_id)
    pub container_id: String,
    /// Height in pixels; `None` for audio-only
    pub resolution_height: Option<u32>,
    pub codec_family: CodecFamily,
    pub kind: VariantKind,
    /// Audio bitrate; `None` for video-only or when unknown
    pub audio_bitrate_kbps: Option<u32>,
    /// File extension reported by the extractor (mp4, webm, m4a)
    pub ext: Option<String>,
}

impl StreamVariant {
    pub fn video_only(id: &str, height: u32, codec: CodecFamily) -> Self {
        Self {
            container_id: id.to_string(),
            resolution_height: Some(height),
            codec_family: codec,
            kind: VariantKind::VideoOnly,
            audio_bitrate_kbps: None,
            ext: None,
        }
    }

    pub fn audio_only(id: &str, kbps: u32) -> Self {
        Self {
            container_id: id.to_string(),
            resolution_height: None,
            codec_family: CodecFamily::None,
            kind: VariantKind::AudioOnly,
            audio_bitrate_kbps: Some(kbps),
            ext: None,
        }
    }

    pub fn combined(id: &str, height: u32, codec: CodecFamily, kbps: Option<u32>) -> Self {
        Self {
            container_id: id.to_string(),
            resolution_height: Some(height),
            codec_family: codec,
            kind: VariantKind::Combined,
            audio_bitrate_kbps: kbps,
            ext: None,
        }
    }

    /// Height used for ranking; unknown heights rank lowest
    pub fn height(&self) -> u32 {
        self.resolution_height.unwrap_or(0)
    }

    /// Short description for logs, e.g. "137 1080p H.264 video-only"
    pub fn describe(&self) -> String {
        match self.kind {
            VariantKind::AudioOnly => format!(
                "{} audio {}kbps",
                self.container_id,
                self.audio_bitrate_kbps.map_or("?".to_string(), |b| b.to_string())
            ),
            VariantKind::VideoOnly => format!(
                "{} {}p {} video-only",
                self.container_id,
                self.height(),
                self.codec_family
            ),
            VariantKind::Combined => format!(
                "{} {}p {} combined",
                self.container_id,
                self.height(),
                self.codec_family
            ),
        }
    }
}

/// Quality ceiling presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum QualityPreset {
    #[value(name = "360p")]
    #[serde(rename = "360p")]
    P360,
    #[value(name = "480p")]
    #[serde(rename = "480p")]
    P480,
    #[value(name = "720p")]
    #[serde(rename = "720p")]
    P720,
    #[default]
    #[value(name = "1080p")]
    #[serde(rename = "1080p")]
    P1080,
    #[value(name = "1440p")]
    #[serde(rename = "1440p")]
    P1440,
    #[value(name = "4k")]
    #[serde(rename = "4k")]
    K4,
    #[value(name = "8k")]
    #[serde(rename = "8k")]
    K8,
}

impl QualityPreset {
    pub fn max_height(&self) -> u32 {
        match self {
            Self::P360 => 360,
            Self::P480 => 480,
            Self::P720 => 720,
            Self::P1080 => 1080,
            Self::P1440 => 1440,
            Self::K4 => 2160,
            Self::K8 => 4320,
        }
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::P360 => "360p",
            Self::P480 => "480p",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P1440 => "1440p",
            Self::K4 => "4k",
            Self::K8 => "8k",
        };
        f.write_str(name)
    }
}

/// Fully-resolved quality request, immutable for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPreference {
    pub max_height: u32,
    pub preferred_codec: CodecFamily,
    pub target_audio_kbps: u32,
}

impl QualityPreference {
    pub fn new(preset: QualityPreset, codec: VideoCodec, audio_kbps: u32) -> Self {
        Self {
            max_height: preset.max_height(),
            preferred_codec: codec.into(),
            target_audio_kbps: audio_kbps,
        }
    }
}

impl Default for QualityPreference {
    fn default() -> Self {
        Self::new(QualityPreset::default(), VideoCodec::default(), 192)
    }
}

/// Result of format resolution for one queue item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSelection {
    /// Video component (video-only or combined)
    pub video: StreamVariant,
    /// Separate audio component, only for video-only selections
    pub audio: Option<StreamVariant>,
    /// Set when the codec or audio bitrate could not be honored exactly
    pub degraded: bool,
}

impl ResolvedSelection {
    /// yt-dlp `-f` argument for this selection
    pub fn format_spec(&self) -> String {
        match &self.audio {
            Some(audio) => format!("{}+{}", self.video.container_id, audio.container_id),
            None => self.video.container_id.clone(),
        }
    }

    /// Audio bitrate that ends up in the output file
    pub fn audio_kbps(&self) -> Option<u32> {
        match &self.audio {
            Some(audio) => audio.audio_bitrate_kbps,
            None if self.video.kind == VariantKind::Combined => self.video.audio_bitrate_kbps,
            None => None,
        }
    }
}

/// Output container for the merged file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
}

impl ContainerFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how merged files are written
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub output_dir: PathBuf,
    pub container: ContainerFormat,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./downloads"),
            container: ContainerFormat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_family_from_vcodec() {
        assert_eq!(CodecFamily::from_vcodec(Some("avc1.640028")), CodecFamily::H264);
        assert_eq!(CodecFamily::from_vcodec(Some("av01.0.08M.08")), CodecFamily::Av1);
        assert_eq!(CodecFamily::from_vcodec(Some("vp09.00.40.08")), CodecFamily::Vp9);
        assert_eq!(CodecFamily::from_vcodec(Some("vp9")), CodecFamily::Vp9);
        assert_eq!(CodecFamily::from_vcodec(Some("hev1.1.6.L93")), CodecFamily::H265);
        assert_eq!(CodecFamily::from_vcodec(Some("none")), CodecFamily::None);
        assert_eq!(CodecFamily::from_vcodec(None), CodecFamily::None);
        assert_eq!(CodecFamily::from_vcodec(Some("mp4v.20.3")), CodecFamily::Other);
    }

    #[test]
    fn test_preset_heights() {
        assert_eq!(QualityPreset::K8.max_height(), 4320);
        assert_eq!(QualityPreset::K4.max_height(), 2160);
        assert_eq!(QualityPreset::P360.max_height(), 360);
        assert_eq!(QualityPreset::default().max_height(), 1080);
    }

    #[test]
    fn test_format_spec() {
        let split = ResolvedSelection {
            video: StreamVariant::video_only("137", 1080, CodecFamily::H264),
            audio: Some(StreamVariant::audio_only("140", 128)),
            degraded: false,
        };
        assert_eq!(split.format_spec(), "137+140");
        assert_eq!(split.audio_kbps(), Some(128));

        let combined = ResolvedSelection {
            video: StreamVariant::combined("22", 720, CodecFamily::H264, Some(192)),
            audio: None,
            degraded: false,
        };
        assert_eq!(combined.format_spec(), "22");
        assert_eq!(combined.audio_kbps(), Some(192));
    }
}

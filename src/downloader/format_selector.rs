// FormatSelector - maps a quality preference onto a concrete variant catalog
//
// Resolution order:
// 1. Resolution ceiling: highest video at or under max_height, else the
//    lowest video available (never fail because the ceiling is too high)
// 2. Codec: preferred codec wins ties, then AV1 > H.265 > VP9 > H.264
// 3. Audio (video-only picks): highest bitrate at or under the target, else
//    the lowest bitrate available
// Codec and bitrate mismatches only set `degraded`; they never fail.

use std::cmp::Reverse;
use std::collections::HashSet;

use super::errors::ResolveError;
use super::models::{
    CodecFamily, QualityPreference, ResolvedSelection, StreamVariant, VariantKind,
};

/// Secondary codec ranking after the user's preferred codec
const CODEC_ORDER: [CodecFamily; 4] = [
    CodecFamily::Av1,
    CodecFamily::H265,
    CodecFamily::Vp9,
    CodecFamily::H264,
];

/// Format selector with deterministic fallback
pub struct FormatSelector;

impl FormatSelector {
    /// Pick the video (and, if needed, audio) variant for a preference
    pub fn resolve(
        catalog: &[StreamVariant],
        pref: &QualityPreference,
    ) -> Result<ResolvedSelection, ResolveError> {
        Self::check_unique_ids(catalog)?;

        let videos: Vec<&StreamVariant> = catalog.iter().filter(|v| v.kind.has_video()).collect();
        let video = Self::pick_video(&videos, pref).ok_or(ResolveError::Unsatisfiable)?;

        let audio = if video.kind == VariantKind::VideoOnly {
            let audios: Vec<&StreamVariant> = catalog
                .iter()
                .filter(|v| v.kind == VariantKind::AudioOnly)
                .collect();
            Self::pick_audio(&audios, pref.target_audio_kbps)
        } else {
            None
        };

        let mut selection = ResolvedSelection {
            video: video.clone(),
            audio: audio.cloned(),
            degraded: false,
        };
        selection.degraded = selection.video.codec_family != pref.preferred_codec
            || selection.audio_kbps() != Some(pref.target_audio_kbps);

        Ok(selection)
    }

    fn check_unique_ids(catalog: &[StreamVariant]) -> Result<(), ResolveError> {
        let mut seen = HashSet::with_capacity(catalog.len());
        for variant in catalog {
            if !seen.insert(variant.container_id.as_str()) {
                return Err(ResolveError::DuplicateContainerId(variant.container_id.clone()));
            }
        }
        Ok(())
    }

    /// Lower is better; the preferred codec always ranks first
    fn codec_rank(codec: CodecFamily, preferred: CodecFamily) -> usize {
        if codec == preferred {
            return 0;
        }
        CODEC_ORDER
            .iter()
            .position(|c| *c == codec)
            .map_or(CODEC_ORDER.len() + 1, |p| p + 1)
    }

    fn pick_video<'a>(
        videos: &[&'a StreamVariant],
        pref: &QualityPreference,
    ) -> Option<&'a StreamVariant> {
        let rank = |v: &StreamVariant| Self::codec_rank(v.codec_family, pref.preferred_codec);

        let under_ceiling: Vec<&'a StreamVariant> = videos
            .iter()
            .copied()
            .filter(|v| v.height() <= pref.max_height)
            .collect();

        if !under_ceiling.is_empty() {
            // max_by_key keeps the last maximum; reversing keeps catalog order on full ties
            return under_ceiling
                .iter()
                .rev()
                .copied()
                .max_by_key(|v| (v.height(), Reverse(rank(v))));
        }

        // Every video exceeds the ceiling: take the smallest one
        videos.iter().copied().min_by_key(|v| (v.height(), rank(v)))
    }

    fn pick_audio<'a>(audios: &[&'a StreamVariant], target_kbps: u32) -> Option<&'a StreamVariant> {
        let kbps = |v: &StreamVariant| v.audio_bitrate_kbps.unwrap_or(0);

        let best_under = audios
            .iter()
            .rev()
            .copied()
            .filter(|a| kbps(a) <= target_kbps)
            .max_by_key(|a| kbps(a));

        best_under.or_else(|| audios.iter().copied().min_by_key(|a| kbps(a)))
    }
}

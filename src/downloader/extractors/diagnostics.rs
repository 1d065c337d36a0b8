// Blocking diagnostics - why did yt-dlp refuse a URL
//
// The reason decides whether the queue processor retries the item
// and which hint ends up in the log.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingReason {
    /// HTTP 403 on the media URL
    Http403Forbidden,
    /// Streaming protection that hides the adaptive formats
    SabrStreaming,
    /// Proof of Origin token required
    PoTokenRequired,
    AgeRestricted,
    GeoBlocked,
    /// Network timeout, often a soft IP block
    NetworkTimeout,
    /// HTTP 429 or similar
    RateLimited,
    /// "confirm you're not a bot", captcha
    BotDetection,
    PrivateVideo,
    /// Deleted, removed or otherwise gone
    VideoUnavailable,
    /// DRM or paid content
    DrmProtected,
    /// Requires a channel membership
    MembersOnly,
    Unknown,
}

/// Substring patterns, checked top to bottom on lowercased stderr
const PATTERNS: &[(BlockingReason, &[&str])] = &[
    (
        BlockingReason::DrmProtected,
        &[
            "drm",
            "widevine",
            "playready",
            "fairplay",
            "encrypted media",
            "content is protected",
            "youtube premium",
            "requires purchase",
            "rental",
            "this video requires payment",
        ],
    ),
    (
        BlockingReason::MembersOnly,
        &["members only", "members-only", "join this channel", "available to members"],
    ),
    (BlockingReason::SabrStreaming, &["sabr"]),
    (BlockingReason::PoTokenRequired, &["po token", "proof of origin"]),
    (
        BlockingReason::AgeRestricted,
        &["age-restricted", "sign in to confirm your age", "age_verification"],
    ),
    (
        BlockingReason::PrivateVideo,
        &["private video", "video is private", "sign in if you've been granted access"],
    ),
    (
        BlockingReason::VideoUnavailable,
        &[
            "video unavailable",
            "video has been removed",
            "this video is no longer available",
            "video is unavailable",
        ],
    ),
    (
        BlockingReason::GeoBlocked,
        &[
            "not available in your country",
            "geo-restricted",
            "geo restricted",
            "blocked in your country",
        ],
    ),
    (BlockingReason::RateLimited, &["429", "rate limit", "too many requests"]),
    (
        BlockingReason::BotDetection,
        &["confirm you're not a bot", "confirm you are not a bot", "captcha", "unusual traffic"],
    ),
    (BlockingReason::Http403Forbidden, &["403", "forbidden"]),
    (
        BlockingReason::NetworkTimeout,
        &[
            "timeout",
            "timed out",
            "connection refused",
            "connection reset",
            "network unreachable",
            "temporary failure in name resolution",
        ],
    ),
];

impl BlockingReason {
    /// Same request may work on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkTimeout | Self::RateLimited)
    }

    pub fn cookies_might_help(&self) -> bool {
        matches!(
            self,
            Self::Http403Forbidden
                | Self::SabrStreaming
                | Self::PoTokenRequired
                | Self::AgeRestricted
                | Self::BotDetection
                | Self::PrivateVideo
                | Self::MembersOnly
        )
    }

    pub fn proxy_might_help(&self) -> bool {
        matches!(
            self,
            Self::Http403Forbidden
                | Self::GeoBlocked
                | Self::NetworkTimeout
                | Self::RateLimited
                | Self::BotDetection
        )
    }

    /// No cookie or route change will make this downloadable
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::DrmProtected | Self::VideoUnavailable)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::SabrStreaming => "SABR streaming protection active",
            Self::PoTokenRequired => "Proof of Origin token required",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::NetworkTimeout => "Network timeout (possible IP throttling)",
            Self::RateLimited => "Rate limited by the site",
            Self::BotDetection => "Bot detection triggered",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::MembersOnly => "Members-only content",
            Self::Unknown => "Unknown blocking reason",
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        if self.is_permanent() {
            return None;
        }
        match (self.cookies_might_help(), self.proxy_might_help()) {
            (true, true) => Some("try --cookies-from-browser or a different proxy/--tor"),
            (true, false) => Some("try --cookies-from-browser or --cookies <file>"),
            (false, true) => Some("try a proxy or --tor"),
            (false, false) => None,
        }
    }
}

/// Classify yt-dlp stderr; `None` only for empty output
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    if error.trim().is_empty() {
        return None;
    }

    let lower = error.to_lowercase();
    let reason = PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map_or(BlockingReason::Unknown, |(reason, _)| *reason);
    Some(reason)
}

/// Log-friendly "description (hint)" text
pub fn explain(reason: BlockingReason) -> String {
    match reason.hint() {
        Some(hint) => format!("{}; {}", reason.description(), hint),
        None => reason.description().to_string(),
    }
}

// InfoExtractor module - video info and format catalog extraction
//
// - types: raw yt-dlp formats and their conversion into catalog variants
// - cli: runs `yt-dlp --dump-json` (binary or python module)
// - diagnostics: classifies extractor failures into blocking reasons

mod cli;
mod diagnostics;
mod types;

pub use cli::CliInfoExtractor;
pub use diagnostics::{diagnose_error, explain, BlockingReason};
pub use types::{CookieSource, ExtendedFormat, ExtendedVideoInfo, ExtractorConfig};

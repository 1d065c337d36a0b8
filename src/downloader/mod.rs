// Downloader module - format resolution, queue processing and the yt-dlp adapter

pub mod backends;
pub mod errors;
pub mod extractors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod outcome;
pub mod processor;
pub mod queue;
pub mod route;
pub mod tools;
pub mod traits;
pub mod utils;

pub use backends::YtDlpAdapter;
pub use errors::{DownloadError, FetchError, ResolveError};
pub use format_selector::FormatSelector;
pub use models::{
    CodecFamily, ContainerFormat, OutputOptions, QualityPreference, QualityPreset,
    ResolvedSelection, StreamVariant, VariantKind, VideoCodec,
};
pub use orchestrator::Downloader;
pub use outcome::{ErrorClass, ItemOutcome, RunOutcome};
pub use processor::{ProcessorSettings, QueueProcessor};
pub use queue::{ItemStatus, QueueItem};
pub use route::RouteHandle;
pub use traits::MediaAdapter;

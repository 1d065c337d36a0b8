// Logging setup: console layer plus optional non-blocking file layer

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid log file path: {0}")]
    InvalidPath(PathBuf),
}

#[derive(Clone, Debug, Default)]
pub struct LogOptions {
    pub debug: bool,
    pub use_color: bool,
    /// DEBUG-level log written next to the console output
    pub log_file: Option<PathBuf>,
}

/// Keeps the file writer flushing until dropped
pub struct LogSystem {
    _guard: Option<WorkerGuard>,
}

impl LogSystem {
    pub fn init(options: LogOptions) -> Result<Self, LogError> {
        let console_level = if options.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        // logs go to stderr so the run summary on stdout stays clean
        let console_layer = fmt::layer()
            .with_target(false)
            .with_level(true)
            .with_ansi(options.use_color)
            .with_writer(io::stderr)
            .with_filter(console_level);

        let (file_layer, guard) = match &options.log_file {
            Some(path) => {
                let file_name = path
                    .file_name()
                    .ok_or_else(|| LogError::InvalidPath(path.clone()))?;
                let dir = path
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map_or_else(|| PathBuf::from("."), PathBuf::from);
                fs::create_dir_all(&dir)?;

                let appender = rolling::never(&dir, file_name);
                let (writer, guard) = non_blocking::NonBlockingBuilder::default()
                    .lossy(false)
                    .finish(appender);
                let layer = fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_thread_names(true)
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(LevelFilter::DEBUG);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("global subscriber") || msg.contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        Ok(Self { _guard: guard })
    }
}

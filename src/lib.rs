pub mod cli;
pub mod config;
pub mod downloader;
pub mod logging;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cli::Cli;
use config::{FileConfig, RunConfig};
use downloader::extractors::ExtractorConfig;
use downloader::queue::load_queue_file;
use downloader::route;
use downloader::tools::{ToolManager, ToolType};
use downloader::{Downloader, QueueProcessor, RunOutcome, YtDlpAdapter};

pub const EXIT_OK: u8 = 0;
pub const EXIT_ITEM_FAILED: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;

/// Run the batch described by `cli`; errors are startup or configuration failures
pub async fn run(cli: Cli) -> Result<u8> {
    let tools = ToolManager::new();

    if cli.check_tools {
        print_tools(&tools);
        return Ok(EXIT_OK);
    }

    let file = match FileConfig::discover(cli.config.as_deref()).context("failed to load config file")? {
        Some((path, file)) => {
            info!("Using config {}", path.display());
            file
        }
        None => FileConfig::default(),
    };
    let config = RunConfig::resolve(&cli, file).context("invalid configuration")?;
    info!("Network route: {}", config.route);

    if cli.check_route {
        route::preflight(&config.route).await;
        return Ok(EXIT_OK);
    }

    let queue_path = cli.queue_file.as_path();
    let items = load_queue_file(queue_path)?;
    if items.is_empty() {
        warn!("Queue {} contains no URLs", queue_path.display());
        return Ok(finish(&RunOutcome::default(), &config));
    }
    info!("Loaded {} URL(s) from {}", items.len(), queue_path.display());

    let command = tools
        .resolve_ytdlp(config.ytdlp_path.as_deref())
        .context("yt-dlp is required")?;
    info!("Using {}", command);
    if !tools.get_tool_info(ToolType::Ffmpeg).is_available {
        warn!("ffmpeg not found: separate video and audio streams cannot be merged");
    }

    fs::create_dir_all(&config.output.output_dir).with_context(|| {
        format!(
            "cannot create output directory {}",
            config.output.output_dir.display()
        )
    })?;

    let extractor_config = ExtractorConfig::default()
        .with_cookies(config.cookies.clone())
        .with_socket_timeout(config.socket_timeout_secs)
        .with_info_timeout(config.info_timeout_secs);
    let adapter = Arc::new(YtDlpAdapter::new(command, extractor_config));
    let downloader = Arc::new(Downloader::new(
        adapter,
        config.preference,
        config.route.clone(),
        config.output.clone(),
    ));

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted: letting running downloads finish, skipping the rest");
            on_signal.cancel();
        }
    });

    let outcome = QueueProcessor::new(downloader, config.settings)
        .run(items, cancel)
        .await;

    Ok(finish(&outcome, &config))
}

fn finish(outcome: &RunOutcome, config: &RunConfig) -> u8 {
    println!("{}", outcome.summary(&config.output.output_dir));

    if let Some(path) = &config.report_path {
        match outcome.write_report(path) {
            Ok(()) => info!("Report written to {}", path.display()),
            Err(e) => warn!("Failed to write report {}: {}", path.display(), e),
        }
    }

    if outcome.has_failures() {
        EXIT_ITEM_FAILED
    } else {
        EXIT_OK
    }
}

fn print_tools(tools: &ToolManager) {
    for tool in tools.get_all_tools() {
        match (&tool.path, &tool.version) {
            (Some(path), Some(version)) => println!("{:<8} {} ({})", tool.name, version, path),
            (Some(path), None) => println!("{:<8} found at {} (version unknown)", tool.name, path),
            _ => println!("{:<8} not found", tool.name),
        }
    }
}

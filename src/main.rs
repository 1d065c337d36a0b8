use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use youtube_batch_downloader_lib::cli::Cli;
use youtube_batch_downloader_lib::logging::{LogOptions, LogSystem};
use youtube_batch_downloader_lib::EXIT_CONFIG;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log = match LogSystem::init(LogOptions {
        debug: cli.debug,
        use_color: std::io::stderr().is_terminal(),
        log_file: cli.log_file.clone(),
    }) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("failed to initialize logging: {}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match youtube_batch_downloader_lib::run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

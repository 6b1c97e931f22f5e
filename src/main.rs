//! CLI entry point for urlfetch.

use std::io::{self, IsTerminal, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use urlfetch_core::FetchEngine;

mod cli;

use cli::{Args, Command, DownloadArgs, RequestArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries the body or the downloaded path.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted; cancelling");
            on_interrupt.cancel();
        }
    });

    match args.command {
        Command::Fetch(request) => run_fetch(&request, cancel).await,
        Command::Download(download) => run_download(&download, cancel, args.quiet).await,
    }
}

async fn run_fetch(request: &RequestArgs, cancel: CancellationToken) -> Result<()> {
    let engine = FetchEngine::with_config(request.config())?;
    let options = request.options().cancel_token(cancel);

    let body = engine
        .fetch(&request.url, &options)
        .await
        .with_context(|| format!("failed to fetch {}", request.url))?;

    match body {
        Some(text) => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        None => info!(url = %request.url, "No content delivered"),
    }
    Ok(())
}

async fn run_download(download: &DownloadArgs, cancel: CancellationToken, quiet: bool) -> Result<()> {
    let request = &download.request;
    let engine = FetchEngine::with_config(request.config())?;
    let mut options = request.options().cancel_token(cancel);
    if let Some(output) = &download.output {
        options = options.outfile(output);
    }

    let spinner = (!quiet && io::stderr().is_terminal()).then(new_spinner);
    if let Some(spinner) = &spinner {
        let on_start = spinner.clone();
        let on_progress = spinner.clone();
        options = options
            .on_start(move |status, _headers| on_start.set_message(format!("HTTP {status}")))
            .on_progress(move |progress| {
                on_progress.set_message(format!("{} bytes", progress.bytes_written));
            });
    }

    let result = engine.download(&request.url, &options).await;
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let file = result.with_context(|| format!("failed to download {}", request.url))?;

    info!(
        path = %file.path.display(),
        bytes = file.bytes_written,
        status = file.status,
        "Download complete"
    );
    println!("{}", file.path.display());
    Ok(())
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

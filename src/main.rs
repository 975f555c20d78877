//! CLI entry point for the harvest tool.

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use resource_harvester::download::{event_channel, resolve_unique_path};
use resource_harvester::{
    BatchResult, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadEngine, DownloadOptions,
    EngineError, HttpClient, ParseOptions, ParseResult, PipelineStore, RateLimiter,
    parse_resources,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod progress;

use app_config::FileConfig;
use cli::Args;

/// JSON document printed to stdout.
#[derive(Debug, Serialize)]
struct Report<'a> {
    parse: &'a ParseResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    download: Option<&'a BatchResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    saved: Vec<SavedFile>,
}

#[derive(Debug, Serialize)]
struct SavedFile {
    url: String,
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let file_config = app_config::load_file_config(args.config.as_deref())?.unwrap_or_default();

    init_tracing(&args, &file_config);
    debug!(?args, ?file_config, "configuration loaded");

    let html = read_input(args.input.as_deref())?;
    let parse_options = build_parse_options(&args, &file_config)?;
    let parsed = parse_resources(&html, &parse_options);

    info!(
        resources = parsed.len(),
        diagnostics = parsed.diagnostics.len(),
        duplicates = parsed.summary.duplicates,
        "parsed HTML"
    );

    if !args.download || parsed.is_empty() {
        if args.download {
            info!("no resources to download");
        }
        return print_report(&Report {
            parse: &parsed,
            download: None,
            saved: Vec::new(),
        }, args.pretty);
    }

    let (events_tx, events_rx) = event_channel();
    let options = build_download_options(&args, &file_config).with_events(events_tx);
    let engine = DownloadEngine::new(options)?;
    let client = HttpClient::try_new().context("failed to build HTTP client")?;
    let store = build_store(args.rate_limit.or(file_config.rate_limit).unwrap_or(0));

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling downloads");
            signal_token.cancel();
        }
    });

    let show_progress = !args.quiet && io::stderr().is_terminal();
    let progress = progress::spawn_progress_ui(show_progress, events_rx, parsed.len());

    let outcome = engine
        .download_all(parsed.resources.clone(), &client, &store, &cancel)
        .await;
    // Dropping the engine closes the event channel so the progress task ends.
    drop(engine);
    if let Some(handle) = progress {
        handle.await.ok();
    }

    let (batch, size_error) = match outcome {
        Ok(batch) => (batch, None),
        Err(EngineError::TotalSizeExceeded {
            limit,
            total,
            result,
        }) => (*result, Some((limit, total))),
        Err(e) => return Err(e.into()),
    };

    info!(
        successful = batch.summary.successful,
        failed = batch.summary.failed,
        retried = batch.summary.retried,
        total_bytes = batch.summary.total_bytes,
        "download complete"
    );

    let saved = match (size_error, args.output_dir.as_ref().or(file_config.output_dir.as_ref())) {
        (None, Some(dir)) => save_payloads(&batch, dir).await?,
        _ => Vec::new(),
    };

    print_report(
        &Report {
            parse: &parsed,
            download: Some(&batch),
            saved,
        },
        args.pretty,
    )?;

    if let Some((limit, total)) = size_error {
        bail!("downloaded {total} bytes, over the --max-total-size limit of {limit}");
    }
    Ok(())
}

/// Installs the tracing subscriber on stderr.
///
/// Priority: `RUST_LOG` env var > quiet flag > verbose flag > config verbosity > info.
fn init_tracing(args: &Args, file_config: &FileConfig) {
    let (config_verbose, config_quiet) = file_config
        .verbosity
        .map(app_config::VerbositySetting::as_flags)
        .unwrap_or_default();
    let verbose = if args.verbose > 0 { args.verbose } else { config_verbose };
    let quiet = args.quiet || (args.verbose == 0 && config_quiet);

    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file '{}'", path.display()));
    }

    if io::stdin().is_terminal() {
        bail!("No input provided. Pass an HTML file or pipe HTML via stdin.");
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read HTML from stdin")?;
    Ok(buffer)
}

fn build_parse_options(args: &Args, file_config: &FileConfig) -> Result<ParseOptions> {
    let mut options = ParseOptions::default()
        .with_external_only(!args.include_internal)
        .with_backgrounds(!args.no_backgrounds && file_config.include_backgrounds.unwrap_or(true));

    if let Some(base_url) = args.base_url.as_deref().or(file_config.base_url.as_deref()) {
        options = options
            .with_base_url(base_url)
            .with_context(|| format!("Invalid base URL '{base_url}'"))?;
    }
    if let Some(max_url_length) = args.max_url_length {
        options = options.with_max_url_length(max_url_length);
    }
    if !args.types.is_empty() {
        options = options.with_allowed_types(args.types.clone());
    }
    Ok(options)
}

/// CLI flags override file values, which override library defaults.
fn build_download_options(args: &Args, file_config: &FileConfig) -> DownloadOptions {
    let defaults = DownloadOptions::default();
    DownloadOptions {
        concurrency: args
            .concurrency
            .or(file_config.concurrency)
            .map_or(DEFAULT_CONCURRENCY, usize::from),
        max_retries: args
            .max_retries
            .or(file_config.max_retries)
            .map_or(DEFAULT_MAX_RETRIES, u32::from),
        retry_delay: args
            .retry_delay
            .or(file_config.retry_delay_ms)
            .map_or(defaults.retry_delay, Duration::from_millis),
        timeout: args
            .timeout
            .or(file_config.timeout_ms)
            .map_or(defaults.timeout, Duration::from_millis),
        max_file_size: args
            .max_file_size
            .or(file_config.max_file_size)
            .unwrap_or(defaults.max_file_size),
        calculate_hash: args.hash || file_config.calculate_hash.unwrap_or(false),
        dedupe_by_hash: args.dedupe_by_hash,
        headers: args.headers.clone(),
        max_total_size: args.max_total_size,
        ..defaults
    }
}

fn build_store(rate_limit: u32) -> PipelineStore {
    if rate_limit == 0 {
        debug!("rate limiting disabled");
        return PipelineStore::new();
    }
    debug!(rate_limit, "rate limiting enabled");
    PipelineStore::new().with_rate_limiter(Arc::new(RateLimiter::new(
        rate_limit as usize,
        Duration::from_secs(1),
    )))
}

/// Writes each non-duplicate payload into `dir`, never overwriting existing files.
async fn save_payloads(batch: &BatchResult, dir: &Path) -> Result<Vec<SavedFile>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory '{}'", dir.display()))?;

    let mut saved = Vec::with_capacity(batch.successful.len());
    for success in batch.successful.iter().filter(|s| s.duplicate_of.is_none()) {
        let path = resolve_unique_path(dir, &success.filename);
        tokio::fs::write(&path, &success.bytes)
            .await
            .with_context(|| format!("Failed to write '{}'", path.display()))?;
        debug!(path = %path.display(), size = success.size, "saved payload");
        saved.push(SavedFile {
            url: success.resource.normalized_url.clone(),
            path,
        });
    }
    Ok(saved)
}

fn print_report(report: &Report<'_>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    }
    .context("Failed to serialize report")?;
    println!("{json}");
    Ok(())
}

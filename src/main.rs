// src/main.rs
mod drive;
mod extractors;
mod site;
mod stages;
mod storage;
mod utils;

use clap::{Args, Parser, Subcommand};
use drive::client::{DriveClient, DEFAULT_DOWNLOAD_TIMEOUT};
use extractors::{GeminiClient, GeminiConfig};
use site::page::{ViewerLocator, DEFAULT_VIEWER_SELECTOR};
use site::{HttpPageSource, DEFAULT_NAVIGATION_TIMEOUT};
use stages::discover::{DiscoverOptions, DEFAULT_DOCUMENT_TYPE, DEFAULT_LISTING_URL};
use stages::extract::{ExtractSettings, Extractor, DEFAULT_MIME_TYPE, DEFAULT_OUTPUT_JSONL};
use stages::filter::DEFAULT_TITLE_PATTERN;
use stages::resolve::{ResolveOptions, DEFAULT_CHECKPOINT_EVERY};
use std::path::{Path, PathBuf};
use std::time::Duration;
use storage::jsonl::JsonlLog;
use storage::queue::QueueStore;
use storage::StorageManager;
use utils::poll::PollPolicy;
use utils::AppError;

/// Harvests listed-company annual reports and extracts their financial statements
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk the document listing and write a queue CSV
    Discover(DiscoverArgs),
    /// Keep only annual reports
    Filter(FilterArgs),
    /// Find the direct download URL of every queued document
    Resolve(ResolveArgs),
    /// Save the PDF of every resolved document
    Download(DownloadArgs),
    /// Extract financial statements from every resolved document
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
struct DiscoverArgs {
    /// Listing page to start from
    #[arg(long, env = "LISTING_URL", default_value = DEFAULT_LISTING_URL)]
    listing_url: String,

    /// Document type filter applied to the listing (empty for all)
    #[arg(long, default_value = DEFAULT_DOCUMENT_TYPE)]
    document_type: String,

    /// Stop after this many listing pages
    #[arg(long)]
    max_pages: Option<u32>,

    /// Queue file to write (default: annual_reports_queue_<timestamp>.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page load timeout in seconds
    #[arg(
        long,
        env = "NAVIGATION_TIMEOUT_SECS",
        default_value_t = DEFAULT_NAVIGATION_TIMEOUT.as_secs()
    )]
    timeout_secs: u64,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Queue file to filter
    input: PathBuf,

    /// Filtered file (default: <input stem>_cleaned.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Case-insensitive text a title must contain
    #[arg(long, default_value = DEFAULT_TITLE_PATTERN)]
    pattern: String,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// Queue file to resolve
    input: PathBuf,

    /// Where to write the resolved queue (default: update the input in place)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// CSS selector of the embedded viewer
    #[arg(long, env = "VIEWER_SELECTOR", default_value = DEFAULT_VIEWER_SELECTOR)]
    selector: String,

    /// Save progress after this many attempted records
    #[arg(long, env = "CHECKPOINT_EVERY", default_value_t = DEFAULT_CHECKPOINT_EVERY)]
    checkpoint_every: usize,

    /// Retry records an earlier run marked unresolvable
    #[arg(long)]
    retry_unresolvable: bool,

    /// Page load timeout in seconds
    #[arg(
        long,
        env = "NAVIGATION_TIMEOUT_SECS",
        default_value_t = DEFAULT_NAVIGATION_TIMEOUT.as_secs()
    )]
    timeout_secs: u64,

    /// Debug mode - save annotated HTML of pages without a viewer
    #[arg(short, long)]
    debug: bool,

    /// Directory for debug pages
    #[arg(long, default_value = "./output")]
    debug_dir: PathBuf,
}

#[derive(Args, Debug)]
struct DownloadArgs {
    /// Resolved queue file
    input: PathBuf,

    /// Directory the PDFs are saved to
    #[arg(short, long, default_value = "downloaded_reports")]
    output_dir: PathBuf,

    /// Per-request download timeout in seconds
    #[arg(
        long,
        env = "DOWNLOAD_TIMEOUT_SECS",
        default_value_t = DEFAULT_DOWNLOAD_TIMEOUT.as_secs()
    )]
    timeout_secs: u64,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Resolved queue file
    input: PathBuf,

    /// JSONL file extracted records are appended to
    #[arg(short, long, default_value = DEFAULT_OUTPUT_JSONL)]
    output: PathBuf,

    /// API key for the extraction service
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model used for extraction
    #[arg(long, env = "GEMINI_MODEL", default_value = extractors::gemini::DEFAULT_MODEL)]
    model: String,

    /// Base URL of the extraction API
    #[arg(long, env = "GEMINI_BASE_URL", default_value = extractors::gemini::DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-request API timeout in seconds
    #[arg(long, env = "GEMINI_TIMEOUT_SECS", default_value = "300")]
    request_timeout_secs: u64,

    /// Per-request download timeout in seconds
    #[arg(
        long,
        env = "DOWNLOAD_TIMEOUT_SECS",
        default_value_t = DEFAULT_DOWNLOAD_TIMEOUT.as_secs()
    )]
    download_timeout_secs: u64,

    /// Seconds between processing-state checks
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value = "2")]
    poll_interval_secs: u64,

    /// Longest wait, in seconds, for an uploaded file to become ready
    #[arg(long, env = "POLL_MAX_WAIT_SECS", default_value = "300")]
    poll_max_wait_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Environment first, so clap's `env` fallbacks see .env values
    load_env_file(std::env::args_os())?;

    // 2. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 3. Parse CLI Arguments
    let cli = Cli::parse();
    if let Some(path) = &cli.env_file {
        tracing::debug!("Environment loaded from {}", path.display());
    }

    match cli.command {
        Command::Discover(args) => discover(args).await,
        Command::Filter(args) => filter(args),
        Command::Resolve(args) => resolve(args).await,
        Command::Download(args) => download(args).await,
        Command::Extract(args) => extract(args).await,
    }
}

// `--env-file` has to be honoured before clap runs, so it is looked up by hand.
fn load_env_file(args: impl Iterator<Item = std::ffi::OsString>) -> Result<(), AppError> {
    let args: Vec<String> = args.filter_map(|a| a.into_string().ok()).collect();
    let explicit = args.iter().enumerate().find_map(|(i, arg)| {
        arg.strip_prefix("--env-file=")
            .map(str::to_string)
            .or_else(|| (arg == "--env-file").then(|| args.get(i + 1).cloned()).flatten())
    });

    match explicit {
        Some(path) => {
            dotenvy::from_path(&path)
                .map_err(|e| AppError::Config(format!("Could not load env file {}: {}", path, e)))?;
        }
        None => {
            // A missing .env is fine; everything can come from the real environment
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

async fn discover(args: DiscoverArgs) -> Result<(), AppError> {
    let start_url =
        stages::discover::listing_start_url(&args.listing_url, Some(&args.document_type))?;
    let output = args
        .output
        .unwrap_or_else(|| stages::discover::default_queue_path(Path::new(".")));
    let source = HttpPageSource::new(Duration::from_secs(args.timeout_secs))?;

    let options = DiscoverOptions { start_url, max_pages: args.max_pages };
    let summary = stages::discover::run_discovery(&source, &output, &options).await?;
    tracing::info!("Saved {} records to {}", summary.records, output.display());
    Ok(())
}

fn filter(args: FilterArgs) -> Result<(), AppError> {
    let output = args
        .output
        .unwrap_or_else(|| stages::filter::cleaned_path(&args.input));
    stages::filter::run_filter(&args.input, &output, &args.pattern)?;
    Ok(())
}

async fn resolve(args: ResolveArgs) -> Result<(), AppError> {
    let locator = ViewerLocator::new(&args.selector)?;
    let source = HttpPageSource::new(Duration::from_secs(args.timeout_secs))?;
    let debug_storage = if args.debug {
        Some(StorageManager::new(&args.debug_dir)?)
    } else {
        None
    };
    let options = ResolveOptions {
        checkpoint_every: args.checkpoint_every,
        retry_unresolvable: args.retry_unresolvable,
        debug_storage,
    };

    let output = args.output.unwrap_or_else(|| args.input.clone());
    let summary =
        stages::resolve::resolve_queue_file(&source, &locator, &args.input, &output, &options)
            .await?;
    if summary.unresolvable > 0 {
        tracing::warn!("{} records need manual inspection", summary.unresolvable);
    }
    Ok(())
}

async fn download(args: DownloadArgs) -> Result<(), AppError> {
    let table = QueueStore::load_or_empty(&args.input);
    let storage = StorageManager::new(&args.output_dir)?;
    let client = DriveClient::new(Duration::from_secs(args.timeout_secs))?;

    stages::download::run_download(&client, &storage, &table).await;
    Ok(())
}

async fn extract(args: ExtractArgs) -> Result<(), AppError> {
    // The key is checked before any record is read
    let api_key = args
        .api_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AppError::Config("GEMINI_API_KEY is not set".to_string()))?;

    let config = GeminiConfig {
        model: args.model,
        base_url: args.base_url,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        ..GeminiConfig::new(api_key)
    };
    let settings = ExtractSettings {
        poll: PollPolicy {
            interval: Duration::from_secs(args.poll_interval_secs),
            max_wait: Duration::from_secs(args.poll_max_wait_secs),
        },
        mime_type: DEFAULT_MIME_TYPE.to_string(),
        ..ExtractSettings::default()
    };

    let service = GeminiClient::new(config)?;
    let fetcher = DriveClient::new(Duration::from_secs(args.download_timeout_secs))?;
    let log = JsonlLog::new(&args.output);
    tracing::info!("Appending results to {}", log.path().display());
    let extractor = Extractor::new(&fetcher, &service, log, settings)?;

    // A missing or unreadable queue is reported and leaves nothing to process
    let table = QueueStore::load_or_empty(&args.input);
    tracing::info!("Loaded {} records from {}", table.len(), args.input.display());

    let summary = extractor.run(&table.records).await;
    if summary.failed > 0 {
        let titles = summary.failed_titles.join("; ");
        tracing::warn!("{} documents failed: {}", summary.failed, titles);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;
    use tokio_test::assert_ok;

    fn os_args(args: &[&str]) -> impl Iterator<Item = OsString> {
        args.iter().map(OsString::from).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn explicit_env_file_must_exist() {
        let err = load_env_file(os_args(&[
            "report-extractor",
            "--env-file",
            "/definitely/not/here.env",
            "filter",
            "q.csv",
        ]));
        assert!(matches!(err, Err(AppError::Config(_))));
    }

    #[test]
    fn parses_subcommands_with_defaults() {
        let cli = Cli::try_parse_from([
            "report-extractor",
            "resolve",
            "queue.csv",
            "--checkpoint-every",
            "10",
        ])
        .unwrap();
        match cli.command {
            Command::Resolve(args) => {
                assert_eq!(args.input, PathBuf::from("queue.csv"));
                assert_eq!(args.checkpoint_every, 10);
                assert_eq!(args.selector, DEFAULT_VIEWER_SELECTOR);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn extract_refuses_to_start_without_a_key() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "report-extractor",
            "extract",
            "missing-queue.csv",
            "--api-key",
            "  ",
            "--output",
            dir.path().join("out.jsonl").to_str().unwrap(),
        ])
        .unwrap();
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };

        // A blank key is reported before the missing queue file is noticed
        assert!(matches!(extract(args).await, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn missing_queue_ends_the_run_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let queue = dir.path().join("absent.csv");
        let output = dir.path().join("out.jsonl");
        let cli = Cli::try_parse_from([
            "report-extractor",
            "extract",
            queue.to_str().unwrap(),
            "--api-key",
            "test-key",
            "--output",
            output.to_str().unwrap(),
        ])
        .unwrap();
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };

        assert_ok!(extract(args).await);
        assert!(!output.exists());

        let reports = dir.path().join("reports");
        let cli = Cli::try_parse_from([
            "report-extractor",
            "download",
            queue.to_str().unwrap(),
            "--output-dir",
            reports.to_str().unwrap(),
        ])
        .unwrap();
        let Command::Download(args) = cli.command else {
            panic!("expected download");
        };

        assert_ok!(download(args).await);
        assert_eq!(std::fs::read_dir(&reports).unwrap().count(), 0);
    }
}

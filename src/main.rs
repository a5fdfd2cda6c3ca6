use anyhow::Result;
use clap::Parser;
use foreclosure_fetch::config::{self, FetchConfig, CANONICAL_COLUMNS};
use foreclosure_fetch::coordinator::FetchSummary;
use foreclosure_fetch::{DatasetWriter, FetchCoordinator, QueryClient, WriteOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::time::{Duration, Instant};
use time::macros::format_description;

#[derive(Parser)]
#[command(name = "Louisville Foreclosure Fetcher")]
#[command(about = "Download the Louisville Metro property foreclosure dataset to a single CSV file")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = config::SERVICE_URL, help = "Feature service query endpoint")]
    url: String,

    #[arg(short = 'd', long, default_value = config::OUTPUT_DIR, help = "Directory for the output CSV")]
    output_dir: String,

    #[arg(short, long, default_value = config::OUTPUT_FILE, help = "Output CSV file name")]
    output_file: String,

    #[arg(short, long, default_value_t = config::PAGE_SIZE, help = "Records requested per page")]
    page_size: usize,

    #[arg(short, long, default_value_t = config::WORKERS, help = "Number of concurrent fetch workers")]
    workers: usize,

    #[arg(short, long, default_value_t = config::MAX_BATCHES, help = "Maximum number of pages to request")]
    max_batches: usize,

    #[arg(long, help = "Per-request timeout in seconds (no timeout if omitted)")]
    timeout_secs: Option<u64>,

    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
}

impl Cli {
    fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            page_size: self.page_size,
            workers: self.workers,
            max_batches: self.max_batches,
            request_timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn setup_logging(log_level_str: &str) -> Result<()> {
    let log_level = match log_level_str.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        other => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", other);
            LevelFilter::Info
        }
    };

    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;

    Ok(())
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = elapsed.subsec_millis();

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, millis)
    }
}

fn fetch_progress_bar(pages: usize) -> ProgressBar {
    let progress_bar = ProgressBar::new(pages as u64);
    match ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({eta}) {msg}")
    {
        Ok(style) => progress_bar.set_style(style.progress_chars("=> ")),
        Err(e) => warn!("Progress bar template rejected, using default style: {}", e),
    }
    progress_bar
}

fn print_final_summary(start_time: Instant, summary: &FetchSummary, outcome: &WriteOutcome) {
    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Pages requested: {}", summary.pages_requested);
    info!("Pages fetched: {} ({} empty)", summary.pages_ok, summary.pages_empty);
    if summary.pages_failed > 0 {
        warn!("Pages dropped after errors: {}", summary.pages_failed);
    }
    info!("Fetched {} total records.", summary.records);

    match outcome {
        WriteOutcome::Written { path, rows_written, rows_skipped } => {
            info!("Rows written: {} ({} skipped)", rows_written, rows_skipped);
            info!("Output written to: {}", path.display());
        }
        WriteOutcome::NoData => info!("Output written to: (none)"),
    }
    info!("-------------------------------------------------------");
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    setup_logging(&cli.log_level)?;
    let fetch_config = cli.fetch_config();
    fetch_config.validate()?;

    info!("Starting data fetch from {}", cli.url);
    let client = QueryClient::new(&cli.url, fetch_config.request_timeout)?;

    let progress_bar = fetch_progress_bar(fetch_config.max_batches);
    let coordinator = FetchCoordinator::new(fetch_config).with_progress(progress_bar);
    let fetched = coordinator.run(&client);

    let writer = DatasetWriter::new(&cli.output_dir, cli.output_file.as_str());
    let outcome = writer.write(&fetched.records, &CANONICAL_COLUMNS)?;

    print_final_summary(start_time, &fetched.summary, &outcome);
    Ok(())
}

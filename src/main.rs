//! Furrow main entry point
//!
//! Command-line interface for the Furrow archive crawler.

use anyhow::{bail, Context, Result};
use clap::Parser;
use furrow::config::{load_config_with_hash, Config, SourceConfig};
use furrow::crawler::{run_source, RunOptions};
use furrow::fetch::{HttpFetcher, PoliteFetcher, RetryPolicy};
use furrow::ledger::{open_ledger, scan_archive_urls, SqliteLedger};
use furrow::output::{
    articles_dir, fragments_dir, load_statistics, merge_fragments, print_statistics,
    write_markdown_summary, ArchiveWriter, RunSummary,
};
use furrow::FurrowError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Furrow: an incremental archive crawler
///
/// Furrow walks the paginated article listings of configured news sources,
/// archives each new article as TXT and CSV, and remembers what it already
/// has so that the next run only fetches what was published since.
#[derive(Parser, Debug)]
#[command(name = "furrow")]
#[command(version = "1.0.0")]
#[command(about = "An incremental archive crawler for news listings", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Continue from the existing ledger (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Clear the ledger and run history before crawling
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "merge", "rebuild_ledger"])]
    dry_run: bool,

    /// Show statistics from the ledger database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "merge", "rebuild_ledger"])]
    stats: bool,

    /// Merge all CSV fragments into the merged archive and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "rebuild_ledger"])]
    merge: bool,

    /// Rebuild the ledger from the TXT files in the output directory and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "merge", "fresh"])]
    rebuild_ledger: bool,

    /// Only crawl the named source (repeatable; default: all sources)
    #[arg(long = "source", value_name = "NAME")]
    sources: Vec<String>,

    /// First listing page this worker crawls
    #[arg(long, default_value_t = 1)]
    start_page: u32,

    /// Last listing page this worker crawls (inclusive)
    #[arg(long)]
    end_page: Option<u32>,

    /// Worker number, used in article ids and fragment names
    #[arg(long, default_value_t = 0)]
    worker_id: u32,

    /// Stop each source after this many accepted articles
    #[arg(long)]
    max_items: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if let Some(end) = cli.end_page {
        if end < cli.start_page {
            bail!("--end-page {} is before --start-page {}", end, cli.start_page);
        }
    }

    let sources = select_sources(&config, &cli.sources)?;

    if cli.dry_run {
        handle_dry_run(&config, &sources, &cli);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.merge {
        handle_merge(&config)?;
    } else if cli.rebuild_ledger {
        handle_rebuild_ledger(&config)?;
    } else {
        handle_crawl(&config, &sources, &cli, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("furrow=info,warn"),
            1 => EnvFilter::new("furrow=debug,info"),
            2 => EnvFilter::new("furrow=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves `--source` names, or every configured source if none were given
fn select_sources<'a>(config: &'a Config, names: &[String]) -> Result<Vec<&'a SourceConfig>> {
    if names.is_empty() {
        if config.sources.is_empty() {
            bail!("No [[source]] entries in the configuration");
        }
        return Ok(config.sources.iter().collect());
    }

    names
        .iter()
        .map(|name| {
            config
                .source(name)
                .ok_or_else(|| anyhow::Error::from(FurrowError::UnknownSource(name.clone())))
        })
        .collect()
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config, sources: &[&SourceConfig], cli: &Cli) {
    println!("=== Furrow Dry Run ===\n");

    println!("Fetching:");
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!("  Attempts per URL: {}", config.crawler.max_attempts);
    println!(
        "  Backoff: {}ms doubling up to {}ms (+{}ms jitter)",
        config.crawler.backoff_base_ms,
        config.crawler.backoff_max_ms,
        config.crawler.backoff_jitter_ms
    );
    println!(
        "  Politeness delay: {}ms (+{}ms jitter)",
        config.crawler.politeness_delay_ms, config.crawler.politeness_jitter_ms
    );

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Ledger: {}", config.output.ledger_path);
    println!("  Archive: {}", config.output.output_dir);
    println!("  Summary: {}", config.output.summary_path);
    println!("  Merged CSV: {}", config.output.merged_path);

    println!("\nSources ({}):", sources.len());
    for source in sources {
        println!("  - {} ({})", source.name, source.listing_url);
        println!(
            "    pagination: {:?}, ordering: {:?}, locale: {:?}",
            source.pagination, source.ordering, source.date_locale
        );
        println!(
            "    cutoff: {}, max items: {}",
            source
                .cutoff
                .map(|d| d.to_string())
                .unwrap_or_else(|| "none".to_string()),
            cli.max_items
                .or(source.max_items)
                .map(|n| n.to_string())
                .unwrap_or_else(|| "unlimited".to_string())
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl pages {}..{} as worker {}",
        cli.start_page,
        cli.end_page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "end".to_string()),
        cli.worker_id
    );
}

/// Handles the --stats mode: shows statistics from the ledger database
fn handle_stats(config: &Config) -> Result<()> {
    println!("Ledger: {}\n", config.output.ledger_path);

    let ledger = open_ledger(Path::new(&config.output.ledger_path))
        .context("Failed to open ledger database")?;
    let stats = load_statistics(&ledger)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --merge mode: combines CSV fragments into one file
fn handle_merge(config: &Config) -> Result<()> {
    let fragments = fragments_dir(Path::new(&config.output.output_dir));
    let merged = Path::new(&config.output.merged_path);

    let report = merge_fragments(&fragments, merged)
        .with_context(|| format!("Failed to merge fragments from {}", fragments.display()))?;

    println!("✓ Merged {} fragments", report.fragments);
    println!(
        "✓ {} rows written to {} ({} duplicates dropped)",
        report.rows_written,
        merged.display(),
        report.duplicates
    );

    Ok(())
}

/// Handles --rebuild-ledger: imports URLs from the TXT archive
fn handle_rebuild_ledger(config: &Config) -> Result<()> {
    let articles = articles_dir(Path::new(&config.output.output_dir));
    let urls = scan_archive_urls(&articles)
        .with_context(|| format!("Failed to scan {}", articles.display()))?;
    tracing::info!("Found {} archived URLs in {}", urls.len(), articles.display());

    let mut by_source: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for url in urls {
        by_source
            .entry(source_for_url(config, &url))
            .or_default()
            .push(url);
    }

    let mut ledger = open_ledger(Path::new(&config.output.ledger_path))
        .context("Failed to open ledger database")?;
    for (source, urls) in &by_source {
        let added = ledger.import_urls(urls, source)?;
        println!("  {}: {} URLs, {} new", source, urls.len(), added);
    }

    println!("✓ Ledger rebuilt from {}", articles.display());
    Ok(())
}

/// Name of the source whose listing lives on the same host as `url`
fn source_for_url(config: &Config, url: &str) -> String {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    config
        .sources
        .iter()
        .find(|source| {
            Url::parse(&source.listing_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string))
                == host
        })
        .map(|source| source.name.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    sources: &[&SourceConfig],
    cli: &Cli,
    config_hash: String,
) -> Result<()> {
    let mut ledger = open_ledger(Path::new(&config.output.ledger_path))
        .context("Failed to open ledger database")?;

    if cli.fresh {
        tracing::info!("Starting fresh crawl (clearing the ledger)");
        ledger.clear()?;
    } else {
        for source in sources {
            let stale = ledger.mark_stale_runs_interrupted(&source.name, cli.worker_id)?;
            if stale > 0 {
                tracing::warn!(
                    "Marked {} unfinished {} runs of worker {} as interrupted",
                    stale,
                    source.name,
                    cli.worker_id
                );
            }
        }
    }

    let http = HttpFetcher::new(&config.user_agent, config.crawler.challenge_markers.clone())
        .context("Failed to build HTTP client")?;
    let fetcher = PoliteFetcher::new(http, RetryPolicy::from_config(&config.crawler));

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(Arc::clone(&cancel));

    let options = RunOptions {
        worker_id: cli.worker_id,
        start_page: cli.start_page,
        end_page: cli.end_page,
        max_items: cli.max_items,
        config_hash,
        cancel: Arc::clone(&cancel),
    };

    let mut summaries = Vec::new();
    let mut failures = 0;

    for source in sources {
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        match crawl_source(config, source, &options, &fetcher, &mut ledger).await {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                tracing::error!("Source {} failed: {:#}", source.name, e);
                failures += 1;
                summaries.push(RunSummary {
                    source_name: source.name.clone(),
                    worker_id: cli.worker_id,
                    stop_reason: Some(format!("error: {}", e)),
                    ..RunSummary::default()
                });
            }
        }
    }

    let summary_path = Path::new(&config.output.summary_path);
    write_markdown_summary(&summaries, summary_path)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    tracing::info!("Summary written to {}", summary_path.display());

    if failures > 0 {
        bail!("{} of {} sources failed", failures, sources.len());
    }
    if cancel.load(Ordering::SeqCst) {
        tracing::warn!("Crawl interrupted; run again to resume");
    }

    Ok(())
}

async fn crawl_source(
    config: &Config,
    source: &SourceConfig,
    options: &RunOptions,
    fetcher: &PoliteFetcher<HttpFetcher>,
    ledger: &mut SqliteLedger,
) -> Result<RunSummary> {
    let mut writer = ArchiveWriter::create(
        Path::new(&config.output.output_dir),
        &source.name,
        options.worker_id,
        options.start_page,
        options.end_page,
    )
    .context("Failed to open archive output")?;

    let run = run_source(&config.crawler, source, options, fetcher, ledger, &mut writer).await?;
    tracing::info!(
        "{}: run {} {} ({} archived in total by this worker)",
        source.name,
        run.run_id,
        run.status,
        writer.written()
    );

    Ok(run.summary())
}

/// Stops the crawl between candidates on Ctrl-C
fn spawn_interrupt_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing the current article");
            cancel.store(true, Ordering::SeqCst);
        }
    });
}

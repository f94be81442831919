mod models;
mod output;
mod scrapers;
mod stats;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Args, Parser, Subcommand};
use models::ListingRecord;
use output::ExportKind;
use scrapers::{Collector, Enricher, HttpFetcher, ListingSite, Rightmove, ScrapeConfig, SearchCriteria};
use stats::RunStatistics;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Parser)]
#[command(
    name = "listing-scout",
    version,
    about = "Scrape rental search results into CSV and a statistics report"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Collect every listing for a search URL
    Scrape(ScrapeArgs),
    /// Rebuild the statistics report from an exported CSV
    Report(ReportArgs),
}

#[derive(Debug, Args)]
struct ScrapeArgs {
    /// Search results URL, filters included
    #[arg(value_name = "URL")]
    url: String,

    /// Stop after this many result pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u32>,

    /// Visit at most this many listing pages
    #[arg(long, value_name = "N")]
    max_listings: Option<usize>,

    /// Pause between requests
    #[arg(long, value_name = "MS", env = "SCOUT_DELAY_MS")]
    delay_ms: Option<u64>,

    /// Per-request timeout
    #[arg(long, value_name = "SECS", env = "SCOUT_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Also visit each listing page for size and letting details
    #[arg(long, default_value_t = false)]
    details: bool,

    #[arg(short, long, value_name = "DIR", default_value = "results")]
    output_dir: PathBuf,
}

impl ScrapeArgs {
    fn config(&self) -> ScrapeConfig {
        let defaults = ScrapeConfig::default();
        ScrapeConfig {
            delay: self.delay_ms.map(Duration::from_millis).unwrap_or(defaults.delay),
            timeout: self.timeout_secs.map(Duration::from_secs).unwrap_or(defaults.timeout),
            user_agent: self.user_agent.clone().unwrap_or(defaults.user_agent),
            max_pages: self.max_pages,
            max_listings: self.max_listings,
        }
    }
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// CSV written by a previous scrape
    #[arg(value_name = "CSV")]
    csv: PathBuf,

    /// Write the report here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Scrape(args) => scrape(args).await,
        Command::Report(args) => report(args).await,
    }
}

async fn scrape(args: ScrapeArgs) -> Result<()> {
    let template = Url::parse(&args.url).context("Invalid search URL")?;
    let site = Rightmove::new();
    site.page_url(&template, 0).context("Invalid search URL")?;
    let criteria = SearchCriteria::from_url(&template);
    let config = args.config();
    let kind = if args.details {
        ExportKind::Enriched
    } else {
        ExportKind::Plain
    };

    info!("🏠 Listing Scout - {} Scraper", site.source_name());
    info!("==========================================");
    for (label, value) in criteria.echo() {
        info!("- {}: {}", label, value);
    }
    info!(
        "Max pages: {}",
        config.max_pages.map_or("all available".to_string(), |n| n.to_string())
    );
    info!("Delay between requests: {:?}", config.delay);
    if args.details {
        info!(
            "Max listings: {}",
            config.max_listings.map_or("all available".to_string(), |n| n.to_string())
        );
    }

    let folder = output::create_run_folder(&args.output_dir, kind, Local::now()).await?;
    info!("Output folder created: {}", folder.display());

    let fetcher = HttpFetcher::new(&config)?;
    let collected = Collector::new(&site, &fetcher, config.max_pages)
        .collect(&template, Utc::now())
        .await;
    info!(
        "Pages fetched: {}, failed: {}, stopped: {:?}",
        collected.pages_fetched,
        collected.failed_pages.len(),
        collected.stop_reason
    );
    for failure in &collected.failed_pages {
        warn!("Page {} ({}) failed: {}", failure.page, failure.url, failure.error);
    }
    info!(
        "Site reports {} results, collected {} unique ({} duplicates removed)",
        collected.result_count.map_or("unknown".to_string(), |n| n.to_string()),
        collected.records.len(),
        collected.duplicates_removed
    );
    if collected.records.is_empty() {
        warn!("No properties were scraped.");
    }

    let records = if args.details && !collected.records.is_empty() {
        let enriched = Enricher::new(&site, &fetcher, config.max_listings)
            .enrich(collected.records)
            .await;
        info!(
            "Listing pages: {} attempted, {} succeeded, {} failed",
            enriched.attempted, enriched.succeeded, enriched.failed
        );
        enriched.records
    } else {
        collected.records
    };

    let stats = RunStatistics::compute(&records);
    display_summary(&records, &stats);

    let artifacts = output::write_artifacts(&folder, &records, &stats, &criteria.echo(), kind).await;
    if !artifacts.all_written() {
        anyhow::bail!("Some output files could not be written to {}", folder.display());
    }

    info!("✅ Scraping complete!");
    Ok(())
}

async fn report(args: ReportArgs) -> Result<()> {
    let imported = output::read_csv(&args.csv)?;
    info!("✓ Loaded {} properties from {}", imported.records.len(), args.csv.display());
    if imported.skipped_rows > 0 {
        warn!("Skipped {} unreadable rows", imported.skipped_rows);
    }

    let stats = RunStatistics::compute(&imported.records);
    let criteria = [("Source CSV", args.csv.display().to_string())];
    let text = output::render_report(&stats, "PROPERTY STATISTICS REPORT", Local::now(), &criteria);

    match &args.output {
        Some(path) => {
            output::write_atomic(path, text.as_bytes()).await?;
            info!("💾 Saved report to {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn display_summary(records: &[ListingRecord], stats: &RunStatistics) {
    info!("\n✅ Scraped {} properties\n", records.len());
    if !stats.price.is_empty() {
        info!(
            "Price: average £{:.0}, median £{:.0}, range £{:.0} - £{:.0}",
            stats.price.mean, stats.price.median, stats.price.min, stats.price.max
        );
    }

    for (i, record) in records.iter().take(5).enumerate() {
        println!(
            "{}. {}",
            i + 1,
            record.property_type.as_deref().unwrap_or("Property")
        );
        println!("   Address: {}", record.address.as_deref().unwrap_or("-"));
        if let Some(bedrooms) = record.bedrooms {
            println!("   Bedrooms: {}", bedrooms);
        }
        match (&record.price_display, record.price) {
            (Some(display), _) => println!("   Price: {}", display),
            (None, Some(price)) => println!("   Price: £{:.0}", price),
            (None, None) => println!("   Price: N/A"),
        }
        if let Some(sqm) = record.size_sqm() {
            println!("   Size: {} sq m", sqm);
        }
        if let Some(error) = record.enrichment.error() {
            println!("   Details: failed ({})", error);
        } else if let Some(details) = record.details() {
            println!("   Details: {} letting fields", details.letting_details.len());
        }
        println!("   URL: {}", record.property_url);
        println!();
    }
}

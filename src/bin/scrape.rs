//! Command-line scraper: one page, one output file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use market_scraper::browser::{ChromiumLauncher, LaunchOptions};
use market_scraper::config::{Config, SETTLE_DELAY_MS};
use market_scraper::error::Result;
use market_scraper::extract::markers::Markers;
use market_scraper::pipeline::Scraper;
use market_scraper::store::{write_output, OutputFormat};
use market_scraper::trace::Trace;
use market_scraper::types::ScrapeResult;

#[derive(Parser)]
#[command(name = "scrape")]
#[command(about = "Scrape prediction markets from a rendered web page")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape a page and write the markets to a file
    Scrape(ScrapeArgs),
}

#[derive(Args)]
struct ScrapeArgs {
    /// URL to scrape
    target: Option<String>,

    /// URL to scrape (wins over the positional URL)
    #[arg(short, long)]
    url: Option<String>,

    /// Scraping method
    #[arg(short, long, value_enum, default_value_t = Method::Kalshi)]
    method: Method,

    /// CSS selector for market questions
    #[arg(short, long)]
    selector: Option<String>,

    /// Output file path
    #[arg(short, long, default_value = "scraped-data.json")]
    output: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Settle delay after navigation, in milliseconds
    #[arg(short, long, default_value_t = SETTLE_DELAY_MS)]
    delay: u64,

    /// Run the browser without a window
    #[arg(
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true"
    )]
    headless: bool,

    /// Save a full-page screenshot next to the output file
    #[arg(long)]
    screenshot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    Kalshi,
}

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    let Commands::Scrape(args) = Cli::parse().command;

    let Some(target) = args.url.clone().or_else(|| args.target.clone()) else {
        eprintln!("Error: a URL is required. Usage: scrape scrape <URL> or scrape scrape --url <URL>");
        std::process::exit(1);
    };

    println!("Target URL: {target}");
    println!("Method: {:?}", args.method);

    match run(&cfg, &args, &target).await {
        Ok(result) => {
            println!("Data saved to: {}", args.output.display());
            println!(
                "Scraped {} markets ({} options)",
                result.total_markets_found,
                result.total_options()
            );
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run(cfg: &Config, args: &ScrapeArgs, target: &str) -> Result<ScrapeResult> {
    let launcher = ChromiumLauncher::new(LaunchOptions {
        headless: args.headless,
        ..LaunchOptions::from_config(cfg)
    });

    let mut timings = cfg.timings();
    timings.settle_delay_ms = args.delay;

    let markers = match &args.selector {
        Some(css) => Markers::with_question_selector(css)?,
        None => Markers::default(),
    };

    let mut scraper = Scraper::new(Arc::new(launcher), timings).with_markers(markers);
    if args.screenshot {
        scraper = scraper.with_screenshot(screenshot_path(&args.output));
    }

    let mut trace = Trace::new();
    let result = scraper.scrape(target, &mut trace).await;
    for line in trace.lines() {
        println!("{line}");
    }
    let result = result?;

    write_output(&args.output, &result, args.format).await?;
    Ok(result)
}

/// `out/data.json` → `out/data.png`.
fn screenshot_path(output: &Path) -> PathBuf {
    output.with_extension("png")
}

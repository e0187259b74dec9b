use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use market_scraper::api::{router, ApiState};
use market_scraper::browser::{ChromiumLauncher, LaunchOptions};
use market_scraper::config::Config;
use market_scraper::error::Result;

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
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let launcher = Arc::new(ChromiumLauncher::new(LaunchOptions::from_config(&cfg)));
    let state = ApiState::new(&cfg, launcher);
    info!(
        "Market data at {} (fallback {})",
        cfg.markets_file.display(),
        cfg.sample_file.display()
    );

    let app = router(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Server running on http://localhost:{}", cfg.api_port);
    info!("  GET  /                   dashboard");
    info!("  GET  /api/markets        persisted markets (?q=&filter=&sort=)");
    info!("  POST /api/markets        add a market");
    info!("  POST /api/scrape         scrape {} ({}s budget)", cfg.scrape_url, cfg.scrape_timeout_secs);
    info!("  GET  /api/stats/latency  scrape durations");
    info!("  GET  /health             scrape counters");
    axum::serve(listener, app).await?;

    Ok(())
}

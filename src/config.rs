use std::path::PathBuf;

use crate::error::{AppError, Result};

pub const SCRAPE_URL: &str = "https://kalshi.com/";
pub const MARKETS_FILE: &str = "kalshi-scraped-data.json";
pub const SAMPLE_FILE: &str = "kalshi-sample-output.json";

/// Budget for the initial navigation (milliseconds).
pub const NAV_TIMEOUT_MS: u64 = 30_000;

/// Fixed wait after navigation so client-side rendering can finish mutating the DOM.
pub const SETTLE_DELAY_MS: u64 = 5_000;

/// Budget for the first question marker to show up after the settle delay.
pub const CONTENT_TIMEOUT_MS: u64 = 10_000;

/// How often the content-ready wait re-checks the page.
pub const CONTENT_POLL_MS: u64 = 250;

/// Wall-clock budget for a scrape triggered over HTTP.
pub const SCRAPE_TIMEOUT_SECS: u64 = 45;

/// Maximum ancestor levels walked by the nearest-image search.
pub const IMAGE_SEARCH_DEPTH: usize = 5;

pub const VIEWPORT_WIDTH: u32 = 1280;
pub const VIEWPORT_HEIGHT: u32 = 720;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// CSS markers the extraction engine keys on. See `extract::markers`.
pub mod selectors {
    pub const MARKET_LINK: &str = r#"a[href*="/markets/"]"#;
    pub const QUESTION: &str = "span.line-clamp-2";
    pub const OPTION_LABEL: &str = "span.transition-colors";
    pub const STYLED_PERCENTAGE: &str = r#"span[style*="font-size: 18px"]"#;
    pub const ANY_SPAN: &str = "span";
    pub const IMAGE: &str = "img";
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub api_port: u16,
    /// Primary persisted result (MARKETS_FILE)
    pub markets_file: PathBuf,
    /// Bundled fallback served when the primary file is absent (SAMPLE_FILE)
    pub sample_file: PathBuf,
    /// Target page for HTTP-triggered scrapes (SCRAPE_URL)
    pub scrape_url: String,
    pub nav_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub content_timeout_ms: u64,
    pub scrape_timeout_secs: u64,
    /// Explicit Chromium executable; auto-detected when unset (CHROME_PATH)
    pub chrome_path: Option<PathBuf>,
    pub headless: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            markets_file: std::env::var("MARKETS_FILE")
                .unwrap_or_else(|_| MARKETS_FILE.to_string())
                .into(),
            sample_file: std::env::var("SAMPLE_FILE")
                .unwrap_or_else(|_| SAMPLE_FILE.to_string())
                .into(),
            scrape_url: std::env::var("SCRAPE_URL").unwrap_or_else(|_| SCRAPE_URL.to_string()),
            nav_timeout_ms: env_u64("NAV_TIMEOUT_MS", NAV_TIMEOUT_MS),
            settle_delay_ms: env_u64("SETTLE_DELAY_MS", SETTLE_DELAY_MS),
            content_timeout_ms: env_u64("CONTENT_TIMEOUT_MS", CONTENT_TIMEOUT_MS),
            scrape_timeout_secs: env_u64("SCRAPE_TIMEOUT_SECS", SCRAPE_TIMEOUT_SECS),
            chrome_path: std::env::var("CHROME_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            headless: std::env::var("HEADLESS")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(true),
        })
    }

    /// Acquisition timings derived from this config.
    pub fn timings(&self) -> crate::acquisition::Timings {
        crate::acquisition::Timings {
            nav_timeout_ms: self.nav_timeout_ms,
            settle_delay_ms: self.settle_delay_ms,
            content_timeout_ms: self.content_timeout_ms,
            poll_ms: CONTENT_POLL_MS,
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

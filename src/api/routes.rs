use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::acquisition::Timings;
use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::{LatencySummary, ScrapeLatency};
use crate::browser::Launcher;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::pipeline::Scraper;
use crate::query::MarketQuery;
use crate::store::MarketFile;
use crate::trace::Trace;
use crate::types::{leading_int, MarketRecord, OptionRecord, ScrapeResult};

#[derive(Clone)]
pub struct ApiState {
    pub files: MarketFile,
    pub launcher: Arc<dyn Launcher>,
    pub scrape_url: String,
    pub timings: Timings,
    pub scrape_timeout: Duration,
    pub health: Arc<HealthState>,
    pub latency: Arc<ScrapeLatency>,
    /// Serialises every write to the primary market file.
    pub write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl ApiState {
    pub fn new(cfg: &Config, launcher: Arc<dyn Launcher>) -> Self {
        Self {
            files: MarketFile::new(&cfg.markets_file, &cfg.sample_file),
            launcher,
            scrape_url: cfg.scrape_url.clone(),
            timings: cfg.timings(),
            scrape_timeout: Duration::from_secs(cfg.scrape_timeout_secs),
            health: Arc::new(HealthState::new()),
            latency: Arc::new(ScrapeLatency::new()),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(get_health))
        .route("/api/markets", get(get_markets).post(add_market))
        .route("/api/scrape", post(run_scrape))
        .route("/api/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ScrapeResponse {
    pub success: bool,
    pub message: String,
    /// Diagnostic lines captured during the scrape.
    pub output: String,
}

/// A manually entered market. Only `question` is required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMarket {
    #[serde(default)]
    pub question: String,
    pub text: Option<String>,
    pub href: Option<String>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub options: Vec<NewOption>,
    pub percentage: Option<PercentInput>,
}

#[derive(Debug, Deserialize)]
pub struct NewOption {
    #[serde(default)]
    pub label: String,
    pub percentage: PercentInput,
}

/// The dashboard sends `"42%"`; scripts tend to send `42`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PercentInput {
    Number(f64),
    Text(String),
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn dashboard() -> Html<&'static str> {
    Html(include_str!("dashboard.html"))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySummary> {
    Json(state.latency.summary())
}

async fn get_markets(
    State(state): State<ApiState>,
    Query(query): Query<MarketQuery>,
) -> Response {
    match state.files.load().await {
        Ok(result) if query.is_noop() => Json(result).into_response(),
        Ok(result) => Json(query.apply(result)).into_response(),
        Err(e) => {
            error!("Error reading market data: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Failed to load market data" })),
            )
                .into_response()
        }
    }
}

async fn run_scrape(State(state): State<ApiState>) -> (StatusCode, Json<ScrapeResponse>) {
    let scraper = Scraper::new(Arc::clone(&state.launcher), state.timings);
    let ticket = state.health.begin_scrape();
    let mut trace = Trace::new();
    let started = Instant::now();

    info!(url = %state.scrape_url, "Scrape requested");
    let outcome = tokio::time::timeout(
        state.scrape_timeout,
        scraper.scrape(&state.scrape_url, &mut trace),
    )
    .await;
    let elapsed = started.elapsed();
    state.latency.record(elapsed);

    let outcome = match outcome {
        Ok(Ok(result)) => persist(&state, &result).await.map(|()| result),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(AppError::Timeout(state.scrape_timeout.as_secs())),
    };

    match outcome {
        Ok(result) => {
            ticket.succeeded(chrono::Utc::now().timestamp_millis().max(0) as u64);
            info!(
                markets = result.total_markets_found,
                duration_ms = elapsed.as_millis() as u64,
                "Scrape persisted to {}",
                state.files.primary().display()
            );
            (
                StatusCode::OK,
                Json(ScrapeResponse {
                    success: true,
                    message: "Scraping completed successfully".to_string(),
                    output: trace.to_output(),
                }),
            )
        }
        Err(AppError::Timeout(secs)) => {
            ticket.failed();
            warn!("Scrape timed out after {secs}s");
            (
                StatusCode::REQUEST_TIMEOUT,
                Json(ScrapeResponse {
                    success: false,
                    message: format!("Scraping timeout ({secs} seconds)"),
                    output: trace.to_output(),
                }),
            )
        }
        Err(e) => {
            ticket.failed();
            error!("Scrape failed: {e}");
            trace.note(format!("Error: {e}"));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ScrapeResponse {
                    success: false,
                    message: "Scraping failed".to_string(),
                    output: trace.to_output(),
                }),
            )
        }
    }
}

async fn persist(state: &ApiState, result: &ScrapeResult) -> Result<()> {
    let _guard = state.write_lock.lock().await;
    state.files.save(result).await
}

async fn add_market(
    State(state): State<ApiState>,
    Json(body): Json<NewMarket>,
) -> std::result::Result<(StatusCode, Json<MarketRecord>), AppError> {
    let market = body.into_record()?;

    let _guard = state.write_lock.lock().await;
    state.files.append(market.clone(), &state.scrape_url).await?;
    info!(question = %market.question, options = market.options.len(), "Market added");

    Ok((StatusCode::CREATED, Json(market)))
}

// ---------------------------------------------------------------------------
// Manual market normalisation
// ---------------------------------------------------------------------------

impl NewMarket {
    /// Validates and normalises into the same shape extraction produces.
    pub fn into_record(self) -> Result<MarketRecord> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(AppError::InvalidInput("question is required".to_string()));
        }

        let mut seen = HashSet::new();
        let mut options = Vec::new();
        for opt in self.options {
            let label = opt.label.trim().to_string();
            if label.is_empty() {
                continue;
            }
            let percentage = opt.percentage.normalise()?;
            if seen.insert((label.clone(), percentage.clone())) {
                options.push(OptionRecord { label, percentage });
            }
        }

        let percentage = if options.is_empty() {
            self.percentage.map(PercentInput::normalise).transpose()?
        } else {
            None
        };

        Ok(MarketRecord {
            text: self
                .text
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| question.clone()),
            question,
            href: self.href.unwrap_or_default().trim().to_string(),
            image_url: self.image_url.unwrap_or_default().trim().to_string(),
            options,
            percentage,
        })
    }
}

impl PercentInput {
    /// Whole-number `NN%` in 0..=100.
    fn normalise(self) -> Result<String> {
        let value = match self {
            PercentInput::Number(n) if n.is_finite() => n.round(),
            PercentInput::Number(n) => {
                return Err(AppError::InvalidInput(format!("invalid percentage `{n}`")))
            }
            PercentInput::Text(raw) => {
                let digits = raw.trim().trim_end_matches('%').trim();
                match digits.parse::<f64>() {
                    Ok(n) if n.is_finite() => n.round(),
                    _ => leading_int(digits).map(f64::from).ok_or_else(|| {
                        AppError::InvalidInput(format!("invalid percentage `{raw}`"))
                    })?,
                }
            }
        };
        if !(0.0..=100.0).contains(&value) {
            return Err(AppError::InvalidInput(format!(
                "percentage {value} is outside 0-100"
            )));
        }
        Ok(format!("{}%", value as u32))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

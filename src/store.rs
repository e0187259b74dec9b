//! JSON persistence of scrape results plus the CLI export formats.

use std::fmt::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::types::{MarketRecord, ScrapeResult};

/// The persisted result file and the bundled sample served when it is absent.
#[derive(Debug, Clone)]
pub struct MarketFile {
    primary: PathBuf,
    fallback: PathBuf,
}

impl MarketFile {
    pub fn new(primary: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    pub fn primary(&self) -> &Path {
        &self.primary
    }

    /// Latest persisted result, or the sample file if the primary can't be read.
    pub async fn load(&self) -> Result<ScrapeResult> {
        match read_result(&self.primary).await {
            Ok(result) => Ok(result),
            Err(e) => {
                debug!(
                    "Primary market file {} unavailable ({e}), using {}",
                    self.primary.display(),
                    self.fallback.display()
                );
                read_result(&self.fallback).await
            }
        }
    }

    /// Overwrites the primary file with `result`.
    pub async fn save(&self, result: &ScrapeResult) -> Result<()> {
        let body = serde_json::to_string_pretty(result)?;
        write_atomic(&self.primary, body.as_bytes()).await
    }

    /// Appends `market` to whatever [`load`](Self::load) returns (an empty
    /// result for `default_url` when nothing exists yet) and saves it.
    pub async fn append(&self, market: MarketRecord, default_url: &str) -> Result<ScrapeResult> {
        let mut current = match self.load().await {
            Ok(result) => result,
            Err(e) => {
                warn!("No readable market file ({e}); starting a new one");
                ScrapeResult::assemble(default_url, Vec::new())
            }
        };
        current.push(market);
        self.save(&current).await?;
        Ok(current)
    }
}

async fn read_result(path: &Path) -> Result<ScrapeResult> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

/// Writes via a sibling temp file so readers never see a half-written result.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Export formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
    Txt,
}

/// Renders `result` and writes it to `path`, creating parent directories.
pub async fn write_output(path: &Path, result: &ScrapeResult, format: OutputFormat) -> Result<()> {
    let body = render(result, format)?;
    write_atomic(path, body.as_bytes()).await
}

pub fn render(result: &ScrapeResult, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
        OutputFormat::Csv => render_csv(result),
        OutputFormat::Txt => {
            let mut out = String::new();
            write_txt(&mut out, result).map_err(|e| AppError::Io(std::io::Error::other(e)))?;
            out
        }
    })
}

const CSV_HEADER: [&str; 5] = ["question", "option", "percentage", "href", "imageUrl"];

/// One row per option; binary markets get a single row with an empty option.
fn render_csv(result: &ScrapeResult) -> String {
    let mut out = String::new();
    push_csv_row(&mut out, &CSV_HEADER);
    for m in &result.markets {
        if m.options.is_empty() {
            let pct = m.percentage.as_deref().unwrap_or("");
            push_csv_row(&mut out, &[&m.question, "", pct, &m.href, &m.image_url]);
        }
        for o in &m.options {
            push_csv_row(&mut out, &[&m.question, &o.label, &o.percentage, &m.href, &m.image_url]);
        }
    }
    out
}

fn push_csv_row(out: &mut String, cells: &[&str]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

fn write_txt(out: &mut impl Write, result: &ScrapeResult) -> fmt::Result {
    writeln!(out, "Source: {}", result.url)?;
    writeln!(out, "Scraped at: {}", result.scraped_at)?;
    writeln!(out, "Markets: {}", result.total_markets_found)?;
    for (i, m) in result.markets.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{}. {}", i + 1, m.question)?;
        if !m.href.is_empty() {
            writeln!(out, "   {}", m.href)?;
        }
        if m.options.is_empty() {
            writeln!(out, "   Yes: {}", m.percentage.as_deref().unwrap_or("New"))?;
        }
        for o in &m.options {
            writeln!(out, "   - {}: {}", o.label, o.percentage)?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptionRecord;

    fn market(question: &str, options: &[(&str, &str)], pct: Option<&str>) -> MarketRecord {
        MarketRecord {
            question: question.to_string(),
            text: question.to_string(),
            href: format!("https://kalshi.com/markets/{}", question.len()),
            image_url: String::new(),
            options: options
                .iter()
                .map(|(l, p)| OptionRecord { label: l.to_string(), percentage: p.to_string() })
                .collect(),
            percentage: pct.map(str::to_string),
        }
    }

    fn sample() -> ScrapeResult {
        ScrapeResult::assemble(
            "https://kalshi.com/",
            vec![
                market("Who wins, A or B?", &[("A", "60%"), ("B \"the best\"", "40%")], None),
                market("Rain?", &[], Some("63%")),
            ],
        )
    }

    #[tokio::test]
    async fn save_then_load_prefers_primary() {
        let dir = tempfile::tempdir().unwrap();
        let file = MarketFile::new(dir.path().join("out/data.json"), dir.path().join("sample.json"));

        file.save(&sample()).await.unwrap();
        let loaded = file.load().await.unwrap();
        assert_eq!(loaded, sample_with_time(&loaded));
        assert!(!dir.path().join("out/data.json.tmp").exists());
    }

    fn sample_with_time(loaded: &ScrapeResult) -> ScrapeResult {
        ScrapeResult {
            scraped_at: loaded.scraped_at.clone(),
            ..sample()
        }
    }

    #[tokio::test]
    async fn load_falls_back_to_sample_file() {
        let dir = tempfile::tempdir().unwrap();
        let sample_path = dir.path().join("sample.json");
        std::fs::write(&sample_path, serde_json::to_string(&sample()).unwrap()).unwrap();

        let file = MarketFile::new(dir.path().join("missing.json"), &sample_path);
        let loaded = file.load().await.unwrap();
        assert_eq!(loaded.total_markets_found, 2);
    }

    #[tokio::test]
    async fn load_fails_when_neither_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let file = MarketFile::new(dir.path().join("a.json"), dir.path().join("b.json"));
        assert!(file.load().await.is_err());
    }

    #[tokio::test]
    async fn append_starts_from_sample_and_writes_primary() {
        let dir = tempfile::tempdir().unwrap();
        let sample_path = dir.path().join("sample.json");
        std::fs::write(&sample_path, serde_json::to_string(&sample()).unwrap()).unwrap();
        let primary = dir.path().join("data.json");
        let file = MarketFile::new(&primary, &sample_path);

        let updated = file
            .append(market("Manual?", &[], Some("10%")), "https://kalshi.com/")
            .await
            .unwrap();
        assert_eq!(updated.total_markets_found, 3);

        let reread: ScrapeResult =
            serde_json::from_str(&std::fs::read_to_string(&primary).unwrap()).unwrap();
        assert_eq!(reread.markets[2].question, "Manual?");
        assert_eq!(reread.total_markets_found, 3);
    }

    #[tokio::test]
    async fn append_creates_new_result_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let file = MarketFile::new(dir.path().join("a.json"), dir.path().join("b.json"));
        let updated = file
            .append(market("First?", &[], None), "https://kalshi.com/")
            .await
            .unwrap();
        assert_eq!(updated.url, "https://kalshi.com/");
        assert_eq!(updated.total_markets_found, 1);
    }

    #[test]
    fn csv_has_row_per_option_and_escapes() {
        let csv = render(&sample(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "question,option,percentage,href,imageUrl");
        assert_eq!(lines.len(), 4);
        assert!(lines[1].starts_with("\"Who wins, A or B?\",A,60%,"));
        assert!(lines[2].contains("\"B \"\"the best\"\"\",40%"));
        assert!(lines[3].starts_with("Rain?,,63%,"));
    }

    #[test]
    fn txt_lists_markets() {
        let txt = render(&sample(), OutputFormat::Txt).unwrap();
        assert!(txt.contains("Markets: 2"));
        assert!(txt.contains("1. Who wins, A or B?"));
        assert!(txt.contains("   - A: 60%"));
        assert!(txt.contains("2. Rain?\n"));
        assert!(txt.contains("   Yes: 63%"));
        assert!(txt.ends_with("   Yes: 63%\n"));
    }

    #[test]
    fn txt_marks_binary_market_without_percentage_as_new() {
        let result = ScrapeResult::assemble("https://kalshi.com/", vec![market("Fresh?", &[], None)]);
        let txt = render(&result, OutputFormat::Txt).unwrap();
        assert!(txt.contains("1. Fresh?\n   https://kalshi.com/markets/6\n   Yes: New\n"));
    }

    #[tokio::test]
    async fn write_output_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.json");
        write_output(&path, &sample(), OutputFormat::Json).await.unwrap();
        let parsed: ScrapeResult = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.total_markets_found, 2);
    }
}

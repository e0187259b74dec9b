use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market records
// ---------------------------------------------------------------------------

/// One outcome of a multi-choice market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionRecord {
    pub label: String,
    /// Always `NN%`-shaped for extracted options.
    pub percentage: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    pub question: String,
    /// Raw text of the market link; often a superset of the question.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub image_url: String,
    /// Empty for binary (yes/no) markets.
    #[serde(default)]
    pub options: Vec<OptionRecord>,
    /// Only set when `options` is empty. `None` means the market is still "New".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<String>,
}

impl MarketRecord {
    pub fn is_binary(&self) -> bool {
        self.options.is_empty()
    }

    /// Highest integer percentage shown for this market, 0 when there is none.
    pub fn max_percentage(&self) -> u32 {
        if let Some(p) = self.percentage.as_deref().and_then(leading_int) {
            return p;
        }
        self.options
            .iter()
            .filter_map(|o| leading_int(&o.percentage))
            .max()
            .unwrap_or(0)
    }
}

/// Parses the leading run of digits, ignoring leading whitespace (`"63%"` → 63).
pub fn leading_int(s: &str) -> Option<u32> {
    let digits: String = s
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Scrape result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub url: String,
    /// ISO-8601 UTC timestamp of when the scrape completed.
    pub scraped_at: String,
    pub total_markets_found: usize,
    pub markets: Vec<MarketRecord>,
}

impl ScrapeResult {
    /// Wraps extracted markets with the source URL and a completion timestamp.
    pub fn assemble(url: impl Into<String>, markets: Vec<MarketRecord>) -> Self {
        Self {
            url: url.into(),
            scraped_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            total_markets_found: markets.len(),
            markets,
        }
    }

    pub fn total_options(&self) -> usize {
        self.markets.iter().map(|m| m.options.len()).sum()
    }

    /// Appends a market and keeps the summary count in sync.
    pub fn push(&mut self, market: MarketRecord) {
        self.markets.push(market);
        self.total_markets_found = self.markets.len();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(pct: Option<&str>) -> MarketRecord {
        MarketRecord {
            question: "Will it rain?".to_string(),
            text: "Will it rain?".to_string(),
            href: "https://example.com/markets/rain".to_string(),
            image_url: String::new(),
            options: Vec::new(),
            percentage: pct.map(str::to_string),
        }
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let result = ScrapeResult::assemble("https://example.com/", vec![binary(Some("63%"))]);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["url"], "https://example.com/");
        assert_eq!(json["totalMarketsFound"], 1);
        assert!(json["scrapedAt"].as_str().unwrap().ends_with('Z'));
        let market = &json["markets"][0];
        assert_eq!(market["imageUrl"], "");
        assert_eq!(market["percentage"], "63%");
        assert_eq!(market["options"], serde_json::json!([]));
    }

    #[test]
    fn new_market_omits_percentage() {
        let json = serde_json::to_value(binary(None)).unwrap();
        assert!(json.get("percentage").is_none());
    }

    #[test]
    fn tolerates_sparse_persisted_records() {
        let raw = r#"{"url":"u","scrapedAt":"t","totalMarketsFound":1,"markets":[{"question":"Q"}]}"#;
        let parsed: ScrapeResult = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.markets[0].question, "Q");
        assert!(parsed.markets[0].options.is_empty());
        assert!(parsed.markets[0].percentage.is_none());
    }

    #[test]
    fn max_percentage_prefers_top_level_then_options() {
        assert_eq!(binary(Some("63%")).max_percentage(), 63);
        assert_eq!(binary(None).max_percentage(), 0);

        let mut multi = binary(None);
        multi.options = vec![
            OptionRecord { label: "A".into(), percentage: "12%".into() },
            OptionRecord { label: "B".into(), percentage: "71%".into() },
        ];
        assert_eq!(multi.max_percentage(), 71);
    }

    #[test]
    fn push_keeps_count_in_sync() {
        let mut result = ScrapeResult::assemble("u", Vec::new());
        assert_eq!(result.total_markets_found, 0);
        result.push(binary(None));
        assert_eq!(result.total_markets_found, 1);
    }
}

//! Search, filter and sort over a persisted result, as the dashboard offers them.

use serde::Deserialize;

use crate::types::{MarketRecord, ScrapeResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketFilter {
    #[default]
    All,
    Options,
    Binary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSort {
    /// Page order.
    #[default]
    Default,
    Name,
    Options,
    Percentage,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketQuery {
    pub q: Option<String>,
    #[serde(default)]
    pub filter: MarketFilter,
    #[serde(default)]
    pub sort: MarketSort,
}

impl MarketQuery {
    pub fn is_noop(&self) -> bool {
        self.search_term().is_none()
            && self.filter == MarketFilter::All
            && self.sort == MarketSort::Default
    }

    fn search_term(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, market: &MarketRecord) -> bool {
        let type_ok = match self.filter {
            MarketFilter::All => true,
            MarketFilter::Options => !market.is_binary(),
            MarketFilter::Binary => market.is_binary(),
        };
        if !type_ok {
            return false;
        }
        let Some(term) = self.search_term() else {
            return true;
        };
        std::iter::once(market.question.as_str())
            .chain(std::iter::once(market.text.as_str()))
            .chain(market.options.iter().map(|o| o.label.as_str()))
            .any(|field| field.to_lowercase().contains(&term))
    }

    /// Narrows and reorders `result.markets`; the summary count follows.
    pub fn apply(&self, mut result: ScrapeResult) -> ScrapeResult {
        result.markets.retain(|m| self.matches(m));
        match self.sort {
            MarketSort::Default => {}
            MarketSort::Name => result.markets.sort_by_cached_key(display_name),
            MarketSort::Options => result.markets.sort_by(|a, b| b.options.len().cmp(&a.options.len())),
            MarketSort::Percentage => {
                result.markets.sort_by(|a, b| b.max_percentage().cmp(&a.max_percentage()))
            }
        }
        result.total_markets_found = result.markets.len();
        result
    }
}

/// Dashboard sort key: link text, falling back to the question.
fn display_name(market: &MarketRecord) -> String {
    if market.text.is_empty() {
        market.question.to_lowercase()
    } else {
        market.text.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptionRecord;

    fn market(text: &str, options: &[(&str, &str)], pct: Option<&str>) -> MarketRecord {
        MarketRecord {
            question: format!("{text}?"),
            text: text.to_string(),
            href: String::new(),
            image_url: String::new(),
            options: options
                .iter()
                .map(|(l, p)| OptionRecord { label: l.to_string(), percentage: p.to_string() })
                .collect(),
            percentage: pct.map(str::to_string),
        }
    }

    fn result() -> ScrapeResult {
        ScrapeResult::assemble(
            "https://kalshi.com/",
            vec![
                market("bitcoin above 100k", &[], Some("35%")),
                market("Election winner", &[("Smith", "52%"), ("Jones", "47%")], None),
                market("new listing", &[], None),
                market("Champion", &[("Lions", "81%"), ("Bears", "10%"), ("Hawks", "9%")], None),
            ],
        )
    }

    fn texts(r: &ScrapeResult) -> Vec<&str> {
        r.markets.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn empty_query_is_noop() {
        let q = MarketQuery::default();
        assert!(q.is_noop());
        assert_eq!(texts(&q.apply(result())), texts(&result()));
    }

    #[test]
    fn search_covers_question_text_and_labels() {
        let q = MarketQuery { q: Some("  JONES ".into()), ..Default::default() };
        let out = q.apply(result());
        assert_eq!(texts(&out), vec!["Election winner"]);
        assert_eq!(out.total_markets_found, 1);
    }

    #[test]
    fn filters_by_market_type() {
        let opts = MarketQuery { filter: MarketFilter::Options, ..Default::default() };
        assert_eq!(texts(&opts.apply(result())), vec!["Election winner", "Champion"]);

        let binary = MarketQuery { filter: MarketFilter::Binary, ..Default::default() };
        assert_eq!(texts(&binary.apply(result())), vec!["bitcoin above 100k", "new listing"]);
    }

    #[test]
    fn sorts() {
        let by_name = MarketQuery { sort: MarketSort::Name, ..Default::default() };
        assert_eq!(
            texts(&by_name.apply(result())),
            vec!["bitcoin above 100k", "Champion", "Election winner", "new listing"]
        );

        let by_options = MarketQuery { sort: MarketSort::Options, ..Default::default() };
        assert_eq!(
            texts(&by_options.apply(result())),
            vec!["Champion", "Election winner", "bitcoin above 100k", "new listing"]
        );

        let by_pct = MarketQuery { sort: MarketSort::Percentage, ..Default::default() };
        assert_eq!(
            texts(&by_pct.apply(result())),
            vec!["Champion", "Election winner", "bitcoin above 100k", "new listing"]
        );
    }

    #[test]
    fn deserializes_from_query_string_values() {
        let q: MarketQuery =
            serde_json::from_value(serde_json::json!({"filter": "binary", "sort": "percentage"})).unwrap();
        assert_eq!(q.filter, MarketFilter::Binary);
        assert_eq!(q.sort, MarketSort::Percentage);
        assert!(q.q.is_none());
    }
}

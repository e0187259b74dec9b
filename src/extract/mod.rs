//! Structural extraction of market cards from a rendered page.
//!
//! The walk starts from every market link, scopes to the link's card, and
//! pulls question, image and options out of that card with the predicates in
//! [`markers`]. Missing optional fields never fail the walk; cards without a
//! question are skipped. The same market rendered twice yields two records.

pub mod image;
pub mod markers;
pub mod options;

use scraper::Html;
use url::Url;

use crate::extract::markers::{closest, query, text_content, Markers};
use crate::trace::{Trace, TraceTag};
use crate::types::MarketRecord;

/// Extracts every market card from `html`, in document order of their links.
///
/// `page_url` is the URL the document was loaded from; relative links and
/// images are resolved against it.
pub fn extract_markets(
    html: &str,
    page_url: &Url,
    markers: &Markers,
    trace: &mut Trace,
) -> Vec<MarketRecord> {
    let document = Html::parse_document(html);
    trace.record(TraceTag::Debug, "Starting page evaluation...");

    let mut markets = Vec::new();
    for link in markers.market_links(&document) {
        let Some(card) = closest(link, |e| markers.is_card_boundary(e)) else {
            continue;
        };

        let Some(question_el) = query(card, |e| markers.is_question_marker(e)) else {
            continue;
        };
        let question = text_content(question_el).trim().to_string();
        if question.is_empty() {
            continue;
        }

        let image_url = image::nearest_image_url(question_el, markers, page_url);
        let option_list = options::extract_options(card, markers, &question, trace);
        let percentage = if option_list.is_empty() {
            options::market_percentage(card, markers, &question, trace)
        } else {
            None
        };

        let href = link
            .value()
            .attr("href")
            .map(|raw| absolute_href(raw, page_url))
            .unwrap_or_default();

        markets.push(MarketRecord {
            question,
            text: text_content(link).trim().to_string(),
            href,
            image_url,
            options: option_list,
            percentage,
        });
    }

    markets
}

fn absolute_href(raw: &str, page_url: &Url) -> String {
    page_url
        .join(raw.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| raw.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

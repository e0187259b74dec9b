//! Option/percentage pairing and percentage detection.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;

use crate::extract::markers::{query_all, text_content, Markers};
use crate::trace::{Trace, TraceTag};
use crate::types::OptionRecord;

/// One to three digits followed by `%`, not preceded by another digit.
static PERCENTAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|[^0-9])([0-9]{1,3}%)").unwrap());

/// First percentage-shaped token in `text` (`"Yes 42% chance"` → `"42%"`).
pub fn find_percentage(text: &str) -> Option<&str> {
    PERCENTAGE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Pairs consecutive marker texts as `(label, percentage)`.
///
/// The page renders each option as a label immediately followed by its
/// percentage under the same marker; nothing ties the two together beyond
/// tree order. A trailing unpaired label is dropped. Pairs are kept only when
/// the label is non-empty and the second text holds a percentage, and repeated
/// `(label, percentage)` combinations are suppressed in first-seen order.
pub fn pair_options(texts: &[String], trace: &mut Trace) -> Vec<OptionRecord> {
    let mut options = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (i, pair) in texts.chunks_exact(2).enumerate() {
        let label = pair[0].trim();
        let pct_text = pair[1].trim();
        let pct = find_percentage(pct_text);
        trace.record(
            TraceTag::Debug,
            format!(
                "Processing pair {}: label=\"{label}\", pctText=\"{pct_text}\", pctMatch={}",
                i * 2,
                pct.unwrap_or("null")
            ),
        );

        let Some(percentage) = pct else { continue };
        if label.is_empty() {
            continue;
        }
        if seen.insert((label.to_string(), percentage.to_string())) {
            trace.record(TraceTag::Option, format!("{label} -> {percentage}"));
            options.push(OptionRecord {
                label: label.to_string(),
                percentage: percentage.to_string(),
            });
        }
    }
    options
}

/// Options for one card, read from its option-label markers in document order.
pub fn extract_options(
    card: ElementRef<'_>,
    markers: &Markers,
    question: &str,
    trace: &mut Trace,
) -> Vec<OptionRecord> {
    let texts: Vec<String> = query_all(card, |e| markers.is_option_label_marker(e))
        .into_iter()
        .map(text_content)
        .collect();

    trace.record(
        TraceTag::Debug,
        format!("Card \"{question}\" - Found {} option marker spans", texts.len()),
    );

    let options = pair_options(&texts, trace);
    if !options.is_empty() {
        trace.record(
            TraceTag::Option,
            format!("Card: \"{question}\" options found: {}", options.len()),
        );
    }
    options
}

/// Single percentage for a market without options.
///
/// Tries, in order: the styled readout spans, any span in the card, then the
/// card's full text. The first match wins; `None` means the market is "New".
pub fn market_percentage(
    card: ElementRef<'_>,
    markers: &Markers,
    question: &str,
    trace: &mut Trace,
) -> Option<String> {
    let styled = query_all(card, |e| markers.is_styled_percentage(e));
    if let Some(pct) = first_percentage_in(&styled) {
        trace.record(TraceTag::QuestionPct, format!("\"{question}\" -> {pct} (styled span)"));
        return Some(pct);
    }

    let spans = query_all(card, |e| markers.is_span(e));
    if let Some(pct) = first_percentage_in(&spans) {
        trace.record(TraceTag::QuestionPct, format!("\"{question}\" -> {pct} (any span)"));
        return Some(pct);
    }

    let card_text = text_content(card);
    let pct = find_percentage(&card_text).map(str::to_string)?;
    trace.record(TraceTag::QuestionPct, format!("\"{question}\" -> {pct} (card text)"));
    Some(pct)
}

fn first_percentage_in(elements: &[ElementRef<'_>]) -> Option<String> {
    elements.iter().find_map(|el| {
        let text = text_content(*el);
        find_percentage(text.trim()).map(str::to_string)
    })
}

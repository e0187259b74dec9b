//! Diagnostic trace lines emitted while scraping.
//!
//! Every line carries a fixed tag so external log consumers can pick them out.
//! Lines are kept in memory (the HTTP scrape route returns them as `output`)
//! and mirrored to `tracing` under the `market_trace` target.

use tracing::debug;

pub const TRACE_TARGET: &str = "market_trace";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceTag {
    Debug,
    Option,
    QuestionPct,
}

impl TraceTag {
    pub fn marker(self) -> &'static str {
        match self {
            TraceTag::Debug => "[MARKET_DEBUG]",
            TraceTag::Option => "[MARKET_OPTION]",
            TraceTag::QuestionPct => "[MARKET_QUESTION_PCT]",
        }
    }
}

#[derive(Debug, Default)]
pub struct Trace {
    lines: Vec<String>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tag: TraceTag, message: impl AsRef<str>) {
        let line = format!("{} {}", tag.marker(), message.as_ref());
        debug!(target: TRACE_TARGET, "{line}");
        self.lines.push(line);
    }

    /// Untagged progress line (navigation, waits, summaries).
    pub fn note(&mut self, message: impl Into<String>) {
        let line = message.into();
        debug!(target: TRACE_TARGET, "{line}");
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn to_output(&self) -> String {
        self.lines.join("\n")
    }
}

//! Match rules for the page's unstable markup.
//!
//! The page ships minified utility classes and inline styles instead of a
//! stable schema. Every rule the traversal depends on lives here as a named
//! predicate, so a layout change only touches this file.

use scraper::{ElementRef, Html, Selector};

use crate::config::selectors;
use crate::error::{AppError, Result};

pub struct Markers {
    market_link: Selector,
    question: Selector,
    question_css: String,
    option_label: Selector,
    styled_percentage: Selector,
    any_span: Selector,
    image: Selector,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            market_link: builtin(selectors::MARKET_LINK),
            question: builtin(selectors::QUESTION),
            question_css: selectors::QUESTION.to_string(),
            option_label: builtin(selectors::OPTION_LABEL),
            styled_percentage: builtin(selectors::STYLED_PERCENTAGE),
            any_span: builtin(selectors::ANY_SPAN),
            image: builtin(selectors::IMAGE),
        }
    }
}

impl Markers {
    /// Replaces the question marker, e.g. from the CLI's `--selector`.
    pub fn with_question_selector(css: &str) -> Result<Self> {
        let question = Selector::parse(css)
            .map_err(|e| AppError::InvalidInput(format!("invalid selector `{css}`: {e}")))?;
        Ok(Self {
            question,
            question_css: css.to_string(),
            ..Self::default()
        })
    }

    /// CSS the content-ready wait polls for.
    pub fn question_css(&self) -> &str {
        &self.question_css
    }

    /// Anchors pointing at a market detail page, in document order.
    pub fn market_links<'a>(&'a self, document: &'a Html) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        document.select(&self.market_link)
    }

    /// A card is the closest `div` around a market link.
    pub fn is_card_boundary(&self, el: &ElementRef<'_>) -> bool {
        el.value().name() == "div"
    }

    pub fn is_question_marker(&self, el: &ElementRef<'_>) -> bool {
        self.question.matches(el)
    }

    /// Option labels and their percentages share this marker and alternate in tree order.
    pub fn is_option_label_marker(&self, el: &ElementRef<'_>) -> bool {
        self.option_label.matches(el)
    }

    /// The big single-number readout of a binary market.
    pub fn is_styled_percentage(&self, el: &ElementRef<'_>) -> bool {
        self.styled_percentage.matches(el)
    }

    pub fn is_span(&self, el: &ElementRef<'_>) -> bool {
        self.any_span.matches(el)
    }

    pub fn is_image(&self, el: &ElementRef<'_>) -> bool {
        self.image.matches(el)
    }
}

fn builtin(css: &str) -> Selector {
    Selector::parse(css).expect("built-in selector must parse")
}

// ---------------------------------------------------------------------------
// Traversal helpers
// ---------------------------------------------------------------------------

/// Element descendants of `scope` (excluding `scope` itself) in document order.
pub fn descendants<'a>(scope: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    scope.descendants().skip(1).filter_map(ElementRef::wrap)
}

/// First descendant of `scope` accepted by `pred`.
pub fn query<'a>(
    scope: ElementRef<'a>,
    pred: impl Fn(&ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    descendants(scope).find(|el| pred(el))
}

/// All descendants of `scope` accepted by `pred`.
pub fn query_all<'a>(
    scope: ElementRef<'a>,
    pred: impl Fn(&ElementRef<'a>) -> bool,
) -> Vec<ElementRef<'a>> {
    descendants(scope).filter(|el| pred(el)).collect()
}

/// `el` itself or its nearest element ancestor accepted by `pred`.
pub fn closest<'a>(
    el: ElementRef<'a>,
    pred: impl Fn(&ElementRef<'a>) -> bool,
) -> Option<ElementRef<'a>> {
    if pred(&el) {
        return Some(el);
    }
    el.ancestors().filter_map(ElementRef::wrap).find(|a| pred(a))
}

pub fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

/// Concatenated text of the subtree, like the DOM's `textContent`.
pub fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect()
}

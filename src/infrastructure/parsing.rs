//! HTML extraction infrastructure
//!
//! Trait-based extractors over a rendered page snapshot, plus the shared
//! selector and text helpers they are built from.

pub mod config;
pub mod faq_extractors;
pub mod market_extractors;
pub mod vehicle_extractors;

pub use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult};
pub use config::{FaqStrategy, InteractionMode, MarketSelectors, PageTotalSource, VehicleSelectors};
pub use faq_extractors::FaqExtractor;

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Parser over a rendered snapshot with per-call context
pub trait ContextualParser {
    type Output;
    type Context;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ExtractionResult<Self::Output>;
}

/// Compile multiple selector strings, keeping the ones that parse.
/// Fails only when none of them compile.
pub fn compile_selectors(selector_strings: &[String]) -> Result<Vec<Selector>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                warn!("Failed to compile selector '{}': {}", selector_str, e);
                errors.push(format!("'{selector_str}': {e}"));
            }
        }
    }

    if selectors.is_empty() {
        return Err(anyhow::anyhow!(
            "No valid selectors compiled. Errors: {}",
            errors.join(", ")
        ));
    }

    if !errors.is_empty() {
        debug!("Some selectors failed to compile: {}", errors.join(", "));
    }

    Ok(selectors)
}

/// Compile a single selector or report it as invalid
pub fn parse_selector(selector: &str) -> ExtractionResult<Selector> {
    Selector::parse(selector).map_err(|e| ExtractionError::invalid_selector(selector, e))
}

/// Stripped text nodes joined with nothing in between
pub fn text_compact(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<String>()
}

/// Stripped text nodes joined by newlines
pub fn text_lines(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compact text of the first descendant matching `selector`
pub fn select_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(text_compact)
        .filter(|s| !s.is_empty())
}

pub fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

type Strategy<'a, I, O> = Box<dyn Fn(&I) -> Option<O> + 'a>;

/// Ordered extraction strategies; the first one producing a value wins.
pub struct ExtractionChain<'a, I: ?Sized, O> {
    label: &'static str,
    strategies: Vec<(&'static str, Strategy<'a, I, O>)>,
}

impl<'a, I: ?Sized, O> ExtractionChain<'a, I, O> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            strategies: Vec::new(),
        }
    }

    #[must_use]
    pub fn then<F>(mut self, name: &'static str, strategy: F) -> Self
    where
        F: Fn(&I) -> Option<O> + 'a,
    {
        self.strategies.push((name, Box::new(strategy)));
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Value and the name of the strategy that produced it
    pub fn run_named(&self, input: &I) -> Option<(&'static str, O)> {
        for (name, strategy) in &self.strategies {
            if let Some(value) = strategy(input) {
                debug!("{}: resolved by '{}'", self.label, name);
                return Some((name, value));
            }
        }
        debug!("{}: no strategy matched ({} tried)", self.label, self.strategies.len());
        None
    }

    pub fn run(&self, input: &I) -> Option<O> {
        self.run_named(input).map(|(_, value)| value)
    }
}

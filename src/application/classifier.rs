//! Keyword classifiers for FAQ text
//!
//! Category and fuel-type tagging are first-match-wins over an ordered keyword
//! table. Groups are checked in declaration order; the first group with any
//! keyword contained in the text decides the label.

use crate::domain::faq::{CanonicalFaq, FaqCategory, FuelTag, RawRecord};
use crate::infrastructure::config::{ClassifierConfig, KeywordGroup};
use tracing::warn;

/// Compiled keyword group: label plus lower-cased keywords
#[derive(Debug, Clone)]
struct Rule<L> {
    label: L,
    keywords: Vec<String>,
}

impl<L: Copy> Rule<L> {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

fn compile<L>(groups: &[KeywordGroup], parse: impl Fn(&str) -> Option<L>) -> Vec<Rule<L>> {
    groups
        .iter()
        .filter_map(|group| match parse(&group.label) {
            Some(label) => Some(Rule {
                label,
                keywords: group
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            }),
            None => {
                warn!("Unknown classifier label '{}' ignored", group.label);
                None
            }
        })
        .collect()
}

fn first_match<L: Copy>(rules: &[Rule<L>], text: &str) -> Option<L> {
    let lowered = text.to_lowercase();
    rules.iter().find(|rule| rule.matches(&lowered)).map(|rule| rule.label)
}

/// Immutable classifier built once per run
#[derive(Debug, Clone)]
pub struct Classifier {
    categories: Vec<Rule<FaqCategory>>,
    fuel_types: Vec<Rule<FuelTag>>,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            categories: compile(&config.categories, FaqCategory::parse),
            fuel_types: compile(&config.fuel_types, FuelTag::parse),
        }
    }

    /// Keyword match, else `default`, else [`FaqCategory::Other`]
    pub fn classify_category(&self, text: &str, default: Option<FaqCategory>) -> FaqCategory {
        first_match(&self.categories, text)
            .or(default)
            .unwrap_or(FaqCategory::Other)
    }

    /// Keyword match, else `default`, else [`FuelTag::Other`]
    pub fn classify_fuel(&self, text: &str, default: Option<FuelTag>) -> FuelTag {
        first_match(&self.fuel_types, text).or(default).unwrap_or(FuelTag::Other)
    }

    /// Resolve both labels. Explicit tags on the record take precedence over keywords.
    pub fn canonicalize(
        &self,
        record: RawRecord,
        default_category: Option<FaqCategory>,
        default_fuel: Option<FuelTag>,
    ) -> CanonicalFaq {
        let text = record.combined_text();
        let category = record
            .explicit_category
            .unwrap_or_else(|| self.classify_category(&text, default_category));
        let fuel_type = record
            .explicit_fuel_type
            .unwrap_or_else(|| self.classify_fuel(&text, default_fuel));

        CanonicalFaq {
            category,
            fuel_type,
            question: record.question,
            answer: record.answer,
            source_url: record.source_url,
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

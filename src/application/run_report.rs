//! End-of-run reporting
//!
//! Every site ends in exactly one outcome. "Nothing matched" and "crashed" are
//! reported separately, and totals are broken down by label.

use crate::domain::faq::CanonicalFaq;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SiteOutcome {
    Collected { count: usize },
    Empty { reason: String },
    Failed { error: String },
}

impl SiteOutcome {
    pub fn collected(count: usize) -> Self {
        Self::Collected { count }
    }

    pub fn empty(reason: impl ToString) -> Self {
        Self::Empty {
            reason: reason.to_string(),
        }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    /// Zero collected records counts as empty
    pub fn from_count(count: usize, empty_reason: &str) -> Self {
        if count == 0 {
            Self::empty(empty_reason)
        } else {
            Self::collected(count)
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Self::Collected { count } => *count,
            Self::Empty { .. } | Self::Failed { .. } => 0,
        }
    }
}

impl fmt::Display for SiteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collected { count } => write!(f, "collected {count}"),
            Self::Empty { reason } => write!(f, "zero records ({reason})"),
            Self::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    /// Correlates the summary lines of one run
    pub run_id: String,
    pub sites: Vec<(String, SiteOutcome)>,
    /// Records kept after filtering and dedup
    pub kept: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_fuel_type: BTreeMap<String, usize>,
}

impl RunReport {
    pub fn new(pipeline: &str) -> Self {
        Self {
            pipeline: pipeline.to_string(),
            run_id: Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    pub fn record(&mut self, site: &str, outcome: SiteOutcome) {
        self.sites.push((site.to_string(), outcome));
    }

    pub fn set_kept(&mut self, kept: usize) {
        self.kept = kept;
    }

    /// Count canonical FAQs per category and fuel type
    pub fn tally_faqs(&mut self, faqs: &[CanonicalFaq]) {
        self.kept = faqs.len();
        self.by_category.clear();
        self.by_fuel_type.clear();
        for faq in faqs {
            *self.by_category.entry(faq.category.to_string()).or_insert(0) += 1;
            *self.by_fuel_type.entry(faq.fuel_type.to_string()).or_insert(0) += 1;
        }
    }

    pub fn extracted(&self) -> usize {
        self.sites.iter().map(|(_, o)| o.count()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SiteOutcome)> {
        self.sites
            .iter()
            .filter(|(_, o)| matches!(o, SiteOutcome::Failed { .. }))
            .map(|(s, o)| (s.as_str(), o))
    }

    /// Structured summary lines
    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            "📊 {} run finished: {} sites, {} extracted, {} kept",
            self.pipeline,
            self.sites.len(),
            self.extracted(),
            self.kept
        );
        for (site, outcome) in &self.sites {
            match outcome {
                SiteOutcome::Collected { count } => info!(site = %site, count, "✅ {}", outcome),
                SiteOutcome::Empty { .. } => warn!(site = %site, "⚠️ {}", outcome),
                SiteOutcome::Failed { .. } => warn!(site = %site, "❌ {}", outcome),
            }
        }
        for (category, count) in &self.by_category {
            info!(category = %category, count, "📁 by category");
        }
        for (fuel, count) in &self.by_fuel_type {
            info!(fuel_type = %fuel, count, "⛽ by fuel type");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::faq::{FaqCategory, FuelTag};

    #[test]
    fn test_each_run_gets_its_own_id() {
        let first = RunReport::new("fuel");
        let second = RunReport::new("fuel");
        assert!(!first.run_id.is_empty());
        assert_ne!(first.run_id, second.run_id);
    }

    #[test]
    fn test_empty_and_failed_are_distinct() {
        let mut report = RunReport::new("faq");
        report.record("kia", SiteOutcome::from_count(0, "no accordion items"));
        report.record("kgta", SiteOutcome::failed("navigation timed out"));
        report.record("dabori", SiteOutcome::from_count(7, "unused"));

        assert_eq!(report.extracted(), 7);
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.sites[0].1.to_string(), "zero records (no accordion items)");
    }

    #[test]
    fn test_tally_by_label() {
        let faq = |category, fuel_type| CanonicalFaq {
            category,
            fuel_type,
            question: "q".into(),
            answer: "a".into(),
            source_url: "u".into(),
        };
        let mut report = RunReport::new("faq");
        report.tally_faqs(&[
            faq(FaqCategory::Cost, FuelTag::Electric),
            faq(FaqCategory::Cost, FuelTag::Other),
            faq(FaqCategory::Infrastructure, FuelTag::Electric),
        ]);
        assert_eq!(report.kept, 3);
        assert_eq!(report.by_category.get("cost"), Some(&2));
        assert_eq!(report.by_fuel_type.get("electric"), Some(&2));
    }
}

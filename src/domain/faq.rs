//! FAQ domain entities
//!
//! Raw question/answer pairs as they come off a page, and the classified
//! canonical form that is persisted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// FAQ category (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaqCategory {
    Cost,
    Registration,
    Infrastructure,
    Maintenance,
    #[serde(alias = "기타")]
    Other,
}

impl FaqCategory {
    pub const ALL: [FaqCategory; 5] = [
        Self::Cost,
        Self::Registration,
        Self::Infrastructure,
        Self::Maintenance,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cost => "cost",
            Self::Registration => "registration",
            Self::Infrastructure => "infrastructure",
            Self::Maintenance => "maintenance",
            Self::Other => "other",
        }
    }

    /// Category name stored in `faq_category_tbl`
    pub fn db_name(&self) -> &'static str {
        match self {
            Self::Cost => "비용",
            Self::Registration => "등록",
            Self::Infrastructure => "충전",
            Self::Maintenance => "정비",
            Self::Other => "기타",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "cost" => Some(Self::Cost),
            "registration" => Some(Self::Registration),
            "infrastructure" => Some(Self::Infrastructure),
            "maintenance" => Some(Self::Maintenance),
            "other" | "기타" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for FaqCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fuel-type tag attached to a FAQ (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelTag {
    Electric,
    Hybrid,
    Diesel,
    Gasoline,
    Lpg,
    Hydrogen,
    Cng,
    Other,
}

impl FuelTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Electric => "electric",
            Self::Hybrid => "hybrid",
            Self::Diesel => "diesel",
            Self::Gasoline => "gasoline",
            Self::Lpg => "lpg",
            Self::Hydrogen => "hydrogen",
            Self::Cng => "cng",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "electric" | "ev" => Some(Self::Electric),
            "hybrid" => Some(Self::Hybrid),
            "diesel" => Some(Self::Diesel),
            "gasoline" => Some(Self::Gasoline),
            "lpg" => Some(Self::Lpg),
            "hydrogen" => Some(Self::Hydrogen),
            "cng" => Some(Self::Cng),
            "other" | "기타" => Some(Self::Other),
            _ => None,
        }
    }

    /// `related_fuel_type` column value: 전기 / 내연 / 전체
    pub fn related_fuel_type(&self) -> &'static str {
        match self {
            Self::Electric => "전기",
            Self::Diesel | Self::Gasoline | Self::Lpg | Self::Cng | Self::Hybrid | Self::Hydrogen => "내연",
            Self::Other => "전체",
        }
    }
}

impl fmt::Display for FuelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extractor output before classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source_url: String,
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_category: Option<FaqCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_fuel_type: Option<FuelTag>,
}

impl RawRecord {
    pub fn new(source_url: impl Into<String>, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            question: question.into(),
            answer: answer.into(),
            explicit_category: None,
            explicit_fuel_type: None,
        }
    }

    /// Text fed to the classifiers
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.question, self.answer)
    }
}

/// Classified FAQ. Category and fuel type are always resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFaq {
    #[serde(rename = "category_name")]
    pub category: FaqCategory,
    pub fuel_type: FuelTag,
    pub question: String,
    pub answer: String,
    pub source_url: String,
}

/// `faq_tbl` row joined with its category name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFaq {
    pub faq_id: i64,
    pub category_name: String,
    pub question: String,
    pub answer: String,
    pub source_url: String,
    pub related_fuel_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqCategoryRow {
    pub category_code: i64,
    pub category_name: String,
}

/// Keeps the first record for each question text, preserving encounter order.
pub fn dedup_by_question<T, F>(records: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(key(record).to_string()))
        .collect()
}

/// Metadata block of the persisted FAQ artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqMetadata {
    pub total_count: usize,
    pub collection_date: String,
    pub categories: BTreeMap<String, usize>,
    pub fuel_types: BTreeMap<String, usize>,
}

/// `all_faqs.json` document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqDocument {
    pub metadata: FaqMetadata,
    pub faqs: Vec<CanonicalFaq>,
}

impl FaqDocument {
    pub fn new(faqs: Vec<CanonicalFaq>, collection_date: String) -> Self {
        let mut categories = BTreeMap::new();
        let mut fuel_types = BTreeMap::new();
        for faq in &faqs {
            *categories.entry(faq.category.to_string()).or_insert(0) += 1;
            *fuel_types.entry(faq.fuel_type.to_string()).or_insert(0) += 1;
        }
        Self {
            metadata: FaqMetadata {
                total_count: faqs.len(),
                collection_date,
                categories,
                fuel_types,
            },
            faqs,
        }
    }

    /// FAQs of one category, in document order
    pub fn by_category(&self, category: FaqCategory) -> Vec<&CanonicalFaq> {
        self.faqs.iter().filter(|f| f.category == category).collect()
    }
}

//! Selector configuration for HTML extraction
//!
//! Every site-specific DOM shape is described here as data. Extractors and
//! pagers are built from these descriptions, so adding a source means adding
//! a configuration entry rather than new control flow.

use serde::{Deserialize, Serialize};

/// How question/answer pairs are located on a FAQ page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaqStrategy {
    /// Headings inside a content area are questions; siblings up to the next heading are the answer
    HeadingBody {
        container: String,
        headings: Vec<String>,
    },
    /// Question element followed by an answer block
    DefinitionList {
        question: String,
        /// Following-sibling selector for the answer. `None` takes the immediate next sibling.
        #[serde(default)]
        answer: Option<String>,
        #[serde(default)]
        strip_prefix: Option<String>,
    },
    /// Item containers holding a question node and an answer node
    Accordion {
        item: String,
        question: String,
        answer: String,
        #[serde(default)]
        strip_prefix: Option<String>,
    },
}

impl FaqStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HeadingBody { .. } => "heading_body",
            Self::DefinitionList { .. } => "definition_list",
            Self::Accordion { .. } => "accordion",
        }
    }
}

/// Where a page-jump source publishes its total page count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageTotalSource {
    /// Largest integer `id` attribute among the matched page links
    MaxNumericId { selector: String },
    /// Capture group 2 of `pattern` applied to the compact text of `selector`
    RegexText { selector: String, pattern: String },
}

/// How a FAQ source moves between pages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionMode {
    /// Single rendered page
    #[default]
    Static,
    /// "Next" control; a `disabled` class or attribute ends pagination
    NextButton {
        next: String,
        content: String,
        settle_ms: u64,
    },
    /// Numbered index driven by a page-set script
    PageJump {
        total: PageTotalSource,
        /// JavaScript with a `{page}` placeholder
        jump_script: String,
        /// Active-page indicator whose text must equal the target page
        #[serde(default)]
        current_page: Option<String>,
        content: String,
        /// Titles to click open on every page before extraction
        #[serde(default)]
        expand: Option<String>,
        settle_ms: u64,
    },
}

/// danawa model page selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSelectors {
    pub lineup_radio: String,
    pub lineup_selectbox: String,
    pub lineup_info_text: String,
    pub header_trim: String,
    pub header_price: String,
    pub compare_left_prefix: String,
    pub compare_right_prefix: String,
    pub maintenance_sum: String,
    pub price_table_row: String,
    pub price_trim: String,
    pub price_values: Vec<String>,
    pub search_image: String,
}

impl Default for VehicleSelectors {
    fn default() -> Self {
        Self {
            lineup_radio: "input[type='radio'][name='lineup_']".to_string(),
            lineup_selectbox: ".selectbox a.btn".to_string(),
            lineup_info_text: ".choice__cell.choice__info .txt".to_string(),
            header_trim: "th span.trim".to_string(),
            header_price: "th span.price".to_string(),
            compare_left_prefix: "compareLeft_".to_string(),
            compare_right_prefix: "compareRight_".to_string(),
            maintenance_sum: "table.compare__table.compare__price span.price_sum".to_string(),
            price_table_row: "table.specTable tbody tr".to_string(),
            price_trim: "td.tdTitle".to_string(),
            price_values: vec![".priceInfo .num.base".to_string(), ".priceInfo".to_string()],
            search_image: "ul#salesNewcarList a.image[href*='Model={id}'] img".to_string(),
        }
    }
}

/// Fuel price and charger statistics selectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSelectors {
    pub opinet_rows: String,
    pub diesel_cell: usize,
    pub lpg_cell: usize,
    pub ev_page_size_select: String,
    pub ev_page_size_option: usize,
    pub ev_rows: String,
    pub ev_kind_cell: usize,
    pub ev_price_cell: usize,
    pub ev_fast_label: String,
    pub charger_header: String,
    pub charger_first_row: String,
}

impl Default for MarketSelectors {
    fn default() -> Self {
        Self {
            opinet_rows: "tbody#numbox>tr".to_string(),
            diesel_cell: 3,
            lpg_cell: 2,
            ev_page_size_select: "#selExcelCnt".to_string(),
            ev_page_size_option: 4,
            ev_rows: "table.table01>tbody>tr".to_string(),
            ev_kind_cell: 1,
            ev_price_cell: 2,
            ev_fast_label: "급속".to_string(),
            charger_header: "table.datatable>thead>tr>th".to_string(),
            charger_first_row: "tbody#tBodyList>tr".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_serializes_with_kind_tag() -> anyhow::Result<()> {
        let strategy = FaqStrategy::DefinitionList {
            question: ".faq_list".into(),
            answer: Some("div.faq_answer".into()),
            strip_prefix: Some(r"^Q\s*".into()),
        };
        let json = serde_json::to_value(&strategy)?;
        assert_eq!(json["kind"], "definition_list");

        let back: FaqStrategy = serde_json::from_value(json)?;
        assert_eq!(back, strategy);
        Ok(())
    }

    #[test]
    fn test_interaction_defaults_to_static() -> anyhow::Result<()> {
        let mode: InteractionMode = serde_json::from_str(r#"{"kind":"static"}"#)?;
        assert_eq!(mode, InteractionMode::default());
        Ok(())
    }
}

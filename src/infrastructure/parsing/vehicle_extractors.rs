//! danawa model page extractors
//!
//! - lineup list (radio inputs with a name resolved through a fallback chain)
//! - spec tab: header trim/price and the compareLeft_N / compareRight_N row pairs
//! - price tab: first trim row, used when the spec tab header is empty
//! - search results: model image lookup

use super::config::VehicleSelectors;
use super::{non_empty, parse_selector, text_compact, text_lines, ContextualParser, ExtractionChain, ExtractionResult};
use crate::domain::vehicle::TrimInfo;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

static PRICE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d,]+").expect("price regex is valid"));
static TRAILING_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)\s*$").expect("paren regex is valid"));
static FEATURE_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"•\s*([^:：]+)\s*[:：]\s*([^•]+)").expect("feature regex is valid"));

/// First comma-grouped digit run with the commas removed
pub fn price_digits(text: &str) -> Option<String> {
    PRICE_DIGITS
        .find(text)
        .map(|m| m.as_str().replace(',', ""))
        .filter(|s| !s.is_empty())
}

/// `• 카테고리 : 내용` items of a feature cell
pub fn parse_features(text: &str) -> BTreeMap<String, String> {
    FEATURE_ITEM
        .captures_iter(text)
        .map(|c| (c[1].trim().to_string(), c[2].trim().to_string()))
        .collect()
}

/// Text nodes joined by single spaces
fn text_spaced(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineupEntry {
    pub id: String,
    pub name: String,
}

/// Lineup radios of a model page
pub struct LineupListParser {
    radio: Selector,
    selectbox: Selector,
    info_text: Selector,
}

impl LineupListParser {
    pub fn new(selectors: &VehicleSelectors) -> ExtractionResult<Self> {
        Ok(Self {
            radio: parse_selector(&selectors.lineup_radio)?,
            selectbox: parse_selector(&selectors.lineup_selectbox)?,
            info_text: parse_selector(&selectors.lineup_info_text)?,
        })
    }

    fn label_selector(id: &str) -> Option<Selector> {
        Selector::parse(&format!("label[for='lineup_{id}']")).ok()
    }

    fn choice_ancestor(radio: ElementRef<'_>) -> Option<ElementRef<'_>> {
        radio
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "div" && el.value().attr("class").is_some_and(|c| c.contains("choice")))
    }

    fn lineup_name(&self, html: &Html, radio: ElementRef<'_>, id: &str) -> Option<String> {
        let choice = Self::choice_ancestor(radio);
        let label = Self::label_selector(id);

        let chain = ExtractionChain::<Option<ElementRef<'_>>, String>::new("lineup name")
            .then("selectbox", |choice| {
                let el = choice.as_ref()?.select(&self.selectbox).next()?;
                non_empty(TRAILING_PAREN.replace(&text_spaced(el), "").into_owned())
            })
            .then("label", |choice| {
                let el = choice.as_ref()?.select(label.as_ref()?).next()?;
                non_empty(text_spaced(el))
            })
            .then("info text", |choice| {
                let el = choice.as_ref()?.select(&self.info_text).next()?;
                non_empty(text_spaced(el))
            })
            .then("document label", |_| {
                let el = html.select(label.as_ref()?).next()?;
                non_empty(text_spaced(el))
            });

        chain.run(&choice)
    }
}

impl ContextualParser for LineupListParser {
    type Output = Vec<LineupEntry>;
    type Context = ();

    fn parse_with_context(&self, html: &Html, _context: &()) -> ExtractionResult<Self::Output> {
        let mut lineups = Vec::new();
        for radio in html.select(&self.radio) {
            let Some(id) = radio.value().attr("data-lineup").filter(|s| !s.is_empty()) else {
                debug!("라인업 ID가 없는 라디오 버튼 건너뜀");
                continue;
            };
            match self.lineup_name(html, radio, id) {
                Some(name) => lineups.push(LineupEntry {
                    id: id.to_string(),
                    name,
                }),
                None => debug!("라인업 {} 이름을 찾을 수 없어 건너뜀", id),
            }
        }
        Ok(lineups)
    }
}

/// Spec tab extraction result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecTabData {
    pub trims: TrimInfo,
    pub specs: BTreeMap<String, String>,
}

pub struct SpecTabParser {
    header_trim: Selector,
    header_price: Selector,
    left_rows: Selector,
    right_rows: Selector,
    left_prefix: String,
    right_prefix: String,
    maintenance_sum: Selector,
    td: Selector,
    link: Selector,
    span: Selector,
}

impl SpecTabParser {
    pub fn new(selectors: &VehicleSelectors) -> ExtractionResult<Self> {
        Ok(Self {
            header_trim: parse_selector(&selectors.header_trim)?,
            header_price: parse_selector(&selectors.header_price)?,
            left_rows: parse_selector(&format!("tr[id^='{}']", selectors.compare_left_prefix))?,
            right_rows: parse_selector(&format!("tr[id^='{}']", selectors.compare_right_prefix))?,
            left_prefix: selectors.compare_left_prefix.clone(),
            right_prefix: selectors.compare_right_prefix.clone(),
            maintenance_sum: parse_selector(&selectors.maintenance_sum)?,
            td: parse_selector("td")?,
            link: parse_selector("a")?,
            span: parse_selector("span")?,
        })
    }

    /// First trim column only: link text, else span text, else the cell
    fn cell_value(&self, cell: ElementRef<'_>) -> Option<String> {
        ExtractionChain::<ElementRef<'_>, String>::new("spec value")
            .then("link", |c| c.select(&self.link).next().map(text_spaced).and_then(non_empty))
            .then("span", |c| c.select(&self.span).next().map(text_spaced).and_then(non_empty))
            .then("cell", |c| non_empty(text_spaced(*c)))
            .run(&cell)
    }

    fn row_index(id: &str, prefix: &str) -> Option<u32> {
        id.strip_prefix(prefix)?.parse().ok()
    }

    fn header_trim(&self, html: &Html) -> TrimInfo {
        let name = html
            .select(&self.header_trim)
            .map(text_spaced)
            .find(|s| !s.is_empty())
            .unwrap_or_default();
        let price = html
            .select(&self.header_price)
            .find_map(|el| price_digits(&text_compact(el)))
            .unwrap_or_default();
        TrimInfo { name, price }
    }

    fn spec_pairs(&self, html: &Html) -> BTreeMap<String, String> {
        let right: HashMap<u32, ElementRef<'_>> = html
            .select(&self.right_rows)
            .filter_map(|row| {
                let idx = Self::row_index(row.value().attr("id")?, &self.right_prefix)?;
                Some((idx, row))
            })
            .collect();

        let mut specs = BTreeMap::new();
        for left in html.select(&self.left_rows) {
            let Some(idx) = left.value().attr("id").and_then(|id| Self::row_index(id, &self.left_prefix)) else {
                continue;
            };
            let Some(key) = left.select(&self.td).next().map(text_compact).filter(|k| !k.is_empty()) else {
                continue;
            };
            // 한쪽에만 있는 인덱스는 조용히 건너뛴다
            let Some(value) = right
                .get(&idx)
                .and_then(|row| row.select(&self.td).next())
                .and_then(|cell| self.cell_value(cell))
            else {
                continue;
            };
            specs.insert(key, value);
        }
        specs
    }

    fn maintenance_cost(&self, html: &Html) -> Option<String> {
        html.select(&self.maintenance_sum)
            .map(text_compact)
            .filter(|t| !t.is_empty() && t != "합계")
            .find_map(|t| price_digits(&t))
    }
}

impl ContextualParser for SpecTabParser {
    type Output = SpecTabData;
    type Context = ();

    fn parse_with_context(&self, html: &Html, _context: &()) -> ExtractionResult<Self::Output> {
        let mut specs = self.spec_pairs(html);
        if let Some(cost) = self.maintenance_cost(html) {
            specs.insert("유지비".to_string(), format!("{cost}원"));
        }
        Ok(SpecTabData {
            trims: self.header_trim(html),
            specs,
        })
    }
}

/// Price tab extraction result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTabData {
    pub trims: TrimInfo,
    pub features: BTreeMap<String, String>,
}

pub struct PriceTabParser {
    row: Selector,
    trim: Selector,
    price: Vec<Selector>,
    td: Selector,
}

impl PriceTabParser {
    pub fn new(selectors: &VehicleSelectors) -> ExtractionResult<Self> {
        Ok(Self {
            row: parse_selector(&selectors.price_table_row)?,
            trim: parse_selector(&selectors.price_trim)?,
            price: selectors
                .price_values
                .iter()
                .map(|s| parse_selector(s))
                .collect::<ExtractionResult<Vec<_>>>()?,
            td: parse_selector("td")?,
        })
    }
}

impl ContextualParser for PriceTabParser {
    type Output = PriceTabData;
    type Context = ();

    fn parse_with_context(&self, html: &Html, _context: &()) -> ExtractionResult<Self::Output> {
        let Some(row) = html.select(&self.row).next() else {
            return Ok(PriceTabData::default());
        };

        let name = row
            .select(&self.trim)
            .next()
            .map(|el| text_lines(el).replace('\n', " ").trim().to_string())
            .unwrap_or_default();
        let price = self
            .price
            .iter()
            .find_map(|sel| row.select(sel).next())
            .and_then(|el| price_digits(&text_compact(el)))
            .unwrap_or_default();
        let features = row
            .select(&self.td)
            .last()
            .map(|cell| parse_features(&text_lines(cell)))
            .unwrap_or_default();

        Ok(PriceTabData {
            trims: TrimInfo { name, price },
            features,
        })
    }
}

/// Search-result image of one model
pub struct SearchImageParser {
    template: String,
}

impl SearchImageParser {
    pub fn new(selectors: &VehicleSelectors) -> Self {
        Self {
            template: selectors.search_image.clone(),
        }
    }
}

impl ContextualParser for SearchImageParser {
    type Output = Option<String>;
    /// danawa model id
    type Context = String;

    fn parse_with_context(&self, html: &Html, model_id: &String) -> ExtractionResult<Self::Output> {
        let selector = parse_selector(&self.template.replace("{id}", model_id))?;
        Ok(html
            .select(&selector)
            .find_map(|img| img.value().attr("src").map(str::to_string))
            .filter(|src| !src.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC_PAGE: &str = r#"
        <table class="compare__table compare__header"><thead><tr>
          <th>항목</th><th><span class="trim">2WD 초장축 슈퍼캡 프리미엄</span><span class="price">43,950,000원</span></th>
        </tr></thead></table>
        <table><tbody>
          <tr id="compareLeft_0"><td>연료</td></tr>
          <tr id="compareLeft_1"><td>배터리 용량</td></tr>
          <tr id="compareLeft_2"><td>좌측에만 있는 항목</td></tr>
        </tbody></table>
        <table><tbody>
          <tr id="compareRight_0"><td><a>전기</a></td><td>두 번째 트림</td></tr>
          <tr id="compareRight_1"><td><span>58.8 kWh</span></td></tr>
          <tr id="compareRight_9"><td>우측에만</td></tr>
        </tbody></table>
        <table class="compare__table compare__price"><tbody>
          <tr><td><span class="price_sum">합계</span><span class="price_sum">6,490,740</span></td></tr>
        </tbody></table>"#;

    #[test]
    fn test_spec_tab_joins_rows_by_index() -> anyhow::Result<()> {
        let parser = SpecTabParser::new(&VehicleSelectors::default())?;
        let data = parser.parse_with_context(&Html::parse_document(SPEC_PAGE), &())?;

        assert_eq!(data.trims.name, "2WD 초장축 슈퍼캡 프리미엄");
        assert_eq!(data.trims.price, "43950000");
        assert_eq!(data.specs.get("연료").map(String::as_str), Some("전기"));
        assert_eq!(data.specs.get("배터리 용량").map(String::as_str), Some("58.8 kWh"));
        assert!(!data.specs.contains_key("좌측에만 있는 항목"));
        assert_eq!(data.specs.get("유지비").map(String::as_str), Some("6490740원"));
        Ok(())
    }

    #[test]
    fn test_lineup_name_falls_back_through_strategies() -> anyhow::Result<()> {
        let html = Html::parse_document(
            r#"
            <div class="choice">
              <input type="radio" name="lineup_" data-lineup="53592">
              <div class="selectbox"><a class="btn">2026년형 전기 <span>(2026.01.06.)</span></a></div>
            </div>
            <div class="choice">
              <input type="radio" name="lineup_" data-lineup="53588">
              <label for="lineup_53588">2025년형 LPG</label>
            </div>
            <input type="radio" name="lineup_" data-lineup="1">
            <input type="radio" name="lineup_">"#,
        );
        let parser = LineupListParser::new(&VehicleSelectors::default())?;
        let lineups = parser.parse_with_context(&html, &())?;
        assert_eq!(
            lineups,
            vec![
                LineupEntry { id: "53592".into(), name: "2026년형 전기".into() },
                LineupEntry { id: "53588".into(), name: "2025년형 LPG".into() },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_price_tab_reads_first_row_and_features() -> anyhow::Result<()> {
        let html = Html::parse_document(
            r#"<table class="specTable"><tbody><tr>
                 <td class="tdTitle">스마트<br>스페셜</td>
                 <td><div class="priceInfo"><span class="num base">21,350,000</span>원</div></td>
                 <td>• 안전 : 차선이탈경고 • 편의 : 후방카메라</td>
               </tr></tbody></table>"#,
        );
        let parser = PriceTabParser::new(&VehicleSelectors::default())?;
        let data = parser.parse_with_context(&html, &())?;
        assert_eq!(data.trims.name, "스마트 스페셜");
        assert_eq!(data.trims.price, "21350000");
        assert_eq!(data.features.get("편의").map(String::as_str), Some("후방카메라"));
        Ok(())
    }

    #[test]
    fn test_search_image_matches_model_link() -> anyhow::Result<()> {
        let html = Html::parse_document(
            r#"<ul id="salesNewcarList">
                 <li><a class="image" href="/auto/?Work=model&Model=9999"><img src="other.png"></a></li>
                 <li><a class="image" href="/auto/?Work=model&Model=4399"><img src="https://img/4399.png"></a></li>
               </ul>"#,
        );
        let parser = SearchImageParser::new(&VehicleSelectors::default());
        assert_eq!(
            parser.parse_with_context(&html, &"4399".to_string())?,
            Some("https://img/4399.png".to_string())
        );
        assert_eq!(parser.parse_with_context(&html, &"1901".to_string())?, None);
        Ok(())
    }
}

//! Fuel price and charger statistics extractors

use super::config::MarketSelectors;
use super::{parse_selector, text_compact, text_lines, ContextualParser, ExtractionError, ExtractionResult};
use crate::domain::market::RegionChargerRecord;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Locale-formatted price cell ("1,632.45") as a number
fn parse_price_cell(text: &str) -> Option<f64> {
    text.trim().replace(',', "").parse::<f64>().ok()
}

fn nth_cell<'a>(row: ElementRef<'a>, td: &Selector, index: usize) -> Option<ElementRef<'a>> {
    row.select(td).nth(index)
}

/// One numeric column of the opinet regional price table
pub struct OpinetPriceParser {
    rows_src: String,
    rows: Selector,
    td: Selector,
    cell: usize,
}

impl OpinetPriceParser {
    pub fn diesel(selectors: &MarketSelectors) -> ExtractionResult<Self> {
        Self::with_cell(selectors, selectors.diesel_cell)
    }

    pub fn lpg(selectors: &MarketSelectors) -> ExtractionResult<Self> {
        Self::with_cell(selectors, selectors.lpg_cell)
    }

    fn with_cell(selectors: &MarketSelectors, cell: usize) -> ExtractionResult<Self> {
        Ok(Self {
            rows_src: selectors.opinet_rows.clone(),
            rows: parse_selector(&selectors.opinet_rows)?,
            td: parse_selector("td")?,
            cell,
        })
    }
}

impl ContextualParser for OpinetPriceParser {
    type Output = Vec<f64>;
    /// site label used in error reports
    type Context = String;

    fn parse_with_context(&self, html: &Html, site: &String) -> ExtractionResult<Self::Output> {
        let rows: Vec<ElementRef<'_>> = html.select(&self.rows).collect();
        if rows.is_empty() {
            return Err(ExtractionError::container_missing(site, &[self.rows_src.clone()]));
        }

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let text = text_compact(nth_cell(row, &self.td, self.cell)?);
                let value = parse_price_cell(&text);
                if value.is_none() {
                    debug!("{}: skipping unparsable price '{}'", site, text);
                }
                value
            })
            .collect())
    }
}

/// Fast-charger unit prices from the ev.or.kr charge-price table
pub struct EvChargePriceParser {
    rows_src: String,
    rows: Selector,
    td: Selector,
    kind_cell: usize,
    price_cell: usize,
    fast_label: String,
}

impl EvChargePriceParser {
    pub fn new(selectors: &MarketSelectors) -> ExtractionResult<Self> {
        Ok(Self {
            rows_src: selectors.ev_rows.clone(),
            rows: parse_selector(&selectors.ev_rows)?,
            td: parse_selector("td")?,
            kind_cell: selectors.ev_kind_cell,
            price_cell: selectors.ev_price_cell,
            fast_label: selectors.ev_fast_label.clone(),
        })
    }
}

impl ContextualParser for EvChargePriceParser {
    type Output = Vec<f64>;
    type Context = String;

    fn parse_with_context(&self, html: &Html, site: &String) -> ExtractionResult<Self::Output> {
        let rows: Vec<ElementRef<'_>> = html.select(&self.rows).collect();
        if rows.is_empty() {
            return Err(ExtractionError::container_missing(site, &[self.rows_src.clone()]));
        }

        Ok(rows
            .into_iter()
            .filter(|row| {
                nth_cell(*row, &self.td, self.kind_cell).is_some_and(|c| text_compact(c) == self.fast_label)
            })
            .filter_map(|row| parse_price_cell(&text_compact(nth_cell(row, &self.td, self.price_cell)?)))
            .collect())
    }
}

/// Regional charger counts: header row gives regions, the first body row gives counts
pub struct ChargerStatsParser {
    header_src: String,
    header: Selector,
    first_row: Selector,
    td: Selector,
}

impl ChargerStatsParser {
    pub fn new(selectors: &MarketSelectors) -> ExtractionResult<Self> {
        Ok(Self {
            header_src: selectors.charger_header.clone(),
            header: parse_selector(&selectors.charger_header)?,
            first_row: parse_selector(&selectors.charger_first_row)?,
            td: parse_selector("td")?,
        })
    }
}

impl ContextualParser for ChargerStatsParser {
    type Output = Vec<RegionChargerRecord>;
    type Context = String;

    fn parse_with_context(&self, html: &Html, site: &String) -> ExtractionResult<Self::Output> {
        let mut regions: Vec<String> = html.select(&self.header).skip(1).map(text_compact).collect();
        if regions.is_empty() {
            return Err(ExtractionError::container_missing(site, &[self.header_src.clone()]));
        }
        // 마지막 열은 합계
        if let Some(last) = regions.last_mut() {
            *last = crate::infrastructure::config::defaults::NATIONWIDE_REGION.to_string();
        }

        let Some(row) = html.select(&self.first_row).next() else {
            return Err(ExtractionError::no_records(site, 1));
        };
        let counts = row.select(&self.td).skip(1).map(|cell| {
            let text = text_lines(cell);
            let first_line = text.lines().next().unwrap_or_default().replace(',', "");
            first_line.trim().parse::<i64>().unwrap_or(0)
        });

        Ok(regions
            .into_iter()
            .zip(counts)
            .map(|(region, charger_count)| RegionChargerRecord { region, charger_count })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opinet_lpg_column() -> anyhow::Result<()> {
        let html = Html::parse_document(
            r#"<table><tbody id="numbox">
                 <tr><td>서울</td><td>1,700.1</td><td>1,050.5</td><td>1,620.0</td></tr>
                 <tr><td>부산</td><td>1,690.0</td><td>-</td><td>1,600.0</td></tr>
               </tbody></table>"#,
        );
        let selectors = MarketSelectors::default();
        let lpg = OpinetPriceParser::lpg(&selectors)?.parse_with_context(&html, &"opinet".to_string())?;
        assert_eq!(lpg, vec![1050.5]);
        let diesel = OpinetPriceParser::diesel(&selectors)?.parse_with_context(&html, &"opinet".to_string())?;
        assert_eq!(diesel, vec![1620.0, 1600.0]);
        Ok(())
    }

    #[test]
    fn test_ev_rows_keep_fast_chargers_only() -> anyhow::Result<()> {
        let html = Html::parse_document(
            r#"<table class="table01"><tbody>
                 <tr><td>환경부</td><td>급속</td><td>347.2</td></tr>
                 <tr><td>환경부</td><td>완속</td><td>295.0</td></tr>
                 <tr><td>민간</td><td>급속</td><td>385.0</td></tr>
               </tbody></table>"#,
        );
        let prices = EvChargePriceParser::new(&MarketSelectors::default())?
            .parse_with_context(&html, &"ev".to_string())?;
        assert_eq!(prices, vec![347.2, 385.0]);
        Ok(())
    }

    #[test]
    fn test_charger_stats_rename_last_region() -> anyhow::Result<()> {
        let html = Html::parse_document(
            r#"<table class="datatable">
                 <thead><tr><th>구분</th><th>서울</th><th>경기</th><th>합계</th></tr></thead>
                 <tbody id="tBodyList"><tr><td>2025</td><td>12,345<br>(+10)</td><td>23,456</td><td>35,801</td></tr></tbody>
               </table>"#,
        );
        let records = ChargerStatsParser::new(&MarketSelectors::default())?
            .parse_with_context(&html, &"ksga".to_string())?;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], RegionChargerRecord { region: "서울".into(), charger_count: 12345 });
        assert_eq!(records[2].region, "전국");
        Ok(())
    }
}

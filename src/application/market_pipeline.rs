//! Fuel cost and charger count pipelines
//!
//! Both are single-page scrapes that go straight to the store without an
//! intermediate artifact.

use crate::application::normalizer::average_fuel_costs;
use crate::application::run_report::{RunReport, SiteOutcome};
use crate::domain::market::{FuelCostRecord, RawFuelPrices, RegionChargerRecord};
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::config::{AppConfig, defaults};
use crate::infrastructure::parsing::ContextualParser;
use crate::infrastructure::parsing::market_extractors::{ChargerStatsParser, EvChargePriceParser, OpinetPriceParser};
use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult};
use crate::infrastructure::pipeline_repository::RecordSink;
use anyhow::{Context, Result};
use scraper::Html;
use std::time::Duration;
use tracing::{info, warn};

const DIESEL: &str = "opinet_diesel";
const LPG: &str = "opinet_lpg";
const EV: &str = "ev_charge_price";
const CHARGERS: &str = "charger_stats";

pub struct MarketPipeline<'a> {
    config: &'a AppConfig,
}

impl<'a> MarketPipeline<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    fn settle_time() -> Duration {
        Duration::from_millis(defaults::MARKET_PAGE_SETTLE_MS)
    }

    async fn open(&self, session: &mut dyn BrowserSession, url: &str) -> ExtractionResult<()> {
        session
            .open(url)
            .await
            .map_err(|e| ExtractionError::navigation(url, e))?;
        session.settle(Self::settle_time()).await;
        Ok(())
    }

    async fn scrape<P>(&self, session: &mut dyn BrowserSession, parser: &P, site: &str) -> ExtractionResult<P::Output>
    where
        P: ContextualParser<Context = String>,
    {
        let html = session
            .snapshot()
            .await
            .map_err(|e| ExtractionError::interaction("snapshot", e))?;
        parser.parse_with_context(&Html::parse_document(&html), &site.to_string())
    }

    async fn opinet_prices(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
        parser: &OpinetPriceParser,
        site: &str,
    ) -> ExtractionResult<Vec<f64>> {
        self.open(session, url).await?;
        self.scrape(session, parser, site).await
    }

    /// Fast-charger unit prices after switching the table to its largest page size
    async fn ev_prices(&self, session: &mut dyn BrowserSession) -> ExtractionResult<Vec<f64>> {
        let selectors = &self.config.market;
        let parser = EvChargePriceParser::new(selectors)?;
        self.open(session, &self.config.sources.ev_charge_price).await?;

        if let Err(e) = session
            .select_option(&selectors.ev_page_size_select, selectors.ev_page_size_option)
            .await
        {
            warn!("⚠️ Page size selector unavailable, reading the default page: {}", e);
        } else {
            session.settle(Self::settle_time()).await;
        }
        self.scrape(session, &parser, EV).await
    }

    /// Raw per-station prices of all three fuels. A failing source leaves its list empty.
    pub async fn fuel_prices(&self, session: &mut dyn BrowserSession) -> Result<(RawFuelPrices, RunReport)> {
        let selectors = &self.config.market;
        let sources = &self.config.sources;
        let mut report = RunReport::new("fuel");
        let mut prices = RawFuelPrices::default();

        let diesel = OpinetPriceParser::diesel(selectors)?;
        let outcome = self.opinet_prices(session, &sources.opinet_diesel, &diesel, DIESEL).await;
        prices.diesel = settle_outcome(&mut report, DIESEL, outcome)?;

        let lpg = OpinetPriceParser::lpg(selectors)?;
        let outcome = self.opinet_prices(session, &sources.opinet_lpg, &lpg, LPG).await;
        prices.lpg = settle_outcome(&mut report, LPG, outcome)?;

        let outcome = self.ev_prices(session).await;
        prices.electric = settle_outcome(&mut report, EV, outcome)?;

        Ok((prices, report))
    }

    /// Scrape, average and upsert into `fuel_tbl`
    pub async fn run_fuel(&self, session: &mut dyn BrowserSession, sink: &dyn RecordSink) -> Result<(Vec<FuelCostRecord>, RunReport)> {
        let (prices, mut report) = self.fuel_prices(session).await?;
        let costs = average_fuel_costs(&prices);
        for cost in &costs {
            info!(fuel_type = %cost.fuel_type, average_cost = cost.average_cost, "⛽ average fuel cost");
        }
        let stored = sink.upsert_fuel_costs(&costs).await?;
        report.set_kept(stored);
        report.log();
        Ok((costs, report))
    }

    pub async fn charger_counts(&self, session: &mut dyn BrowserSession) -> ExtractionResult<Vec<RegionChargerRecord>> {
        let parser = ChargerStatsParser::new(&self.config.market)?;
        self.open(session, &self.config.sources.charger_stats).await?;
        self.scrape(session, &parser, CHARGERS).await
    }

    /// Scrape and upsert into `region_tbl`
    pub async fn run_chargers(
        &self,
        session: &mut dyn BrowserSession,
        sink: &dyn RecordSink,
    ) -> Result<(Vec<RegionChargerRecord>, RunReport)> {
        let mut report = RunReport::new("chargers");
        let outcome = self.charger_counts(session).await;
        let records = settle_outcome(&mut report, CHARGERS, outcome)?;

        let stored = if records.is_empty() {
            0
        } else {
            sink.upsert_charger_counts(&records).await?
        };
        report.set_kept(stored);
        report.log();
        Ok((records, report))
    }
}

/// Record the outcome of one source. Recoverable errors become an empty list.
fn settle_outcome<T>(report: &mut RunReport, site: &str, outcome: ExtractionResult<Vec<T>>) -> Result<Vec<T>> {
    match outcome {
        Ok(values) => {
            report.record(site, SiteOutcome::from_count(values.len(), "no rows matched"));
            Ok(values)
        }
        Err(e) if e.is_fatal() => Err(e).with_context(|| format!("Browser session lost while scraping {site}")),
        Err(e @ ExtractionError::ContainerMissing { .. }) => {
            warn!("⚠️ {}: {}", site, e);
            report.record(site, SiteOutcome::empty(e));
            Ok(Vec::new())
        }
        Err(e) => {
            warn!("❌ {}: {}", site, e);
            report.record(site, SiteOutcome::failed(e));
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vehicle::FuelKind;
    use crate::infrastructure::browser::ScriptedSession;
    use crate::infrastructure::config::sources;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use crate::infrastructure::pipeline_repository::PipelineRepository;

    fn opinet_page(diesel: &[&str], lpg: &[&str]) -> String {
        let rows: String = diesel
            .iter()
            .zip(lpg)
            .map(|(d, l)| format!("<tr><td>지역</td><td>1,700</td><td>{l}</td><td>{d}</td></tr>"))
            .collect();
        format!("<table><tbody id='numbox'>{rows}</tbody></table>")
    }

    const EV_PAGE: &str = r#"<select id="selExcelCnt"><option>10</option></select>
        <table class="table01"><tbody>
          <tr><td>환경부</td><td>급속</td><td>300.0</td></tr>
          <tr><td>민간</td><td>완속</td><td>250.0</td></tr>
          <tr><td>민간</td><td>급속</td><td>400.0</td></tr>
        </tbody></table>"#;

    const CHARGER_PAGE: &str = r#"<table class="datatable">
        <thead><tr><th>구분</th><th>서울</th><th>부산</th><th>합계</th></tr></thead>
        <tbody id="tBodyList"><tr><td>급속</td><td>1,234<br>(10%)</td><td>567</td><td>1,801</td></tr></tbody>
        </table>"#;

    async fn repository() -> Result<PipelineRepository> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(PipelineRepository::new(db.pool().clone()))
    }

    #[tokio::test]
    async fn test_fuel_run_averages_and_upserts() -> Result<()> {
        let config = AppConfig::default();
        let page = opinet_page(&["1,500.0", "1,600.0"], &["1,000.0", "1,000.0"]);
        let mut session = ScriptedSession::new()
            .page(sources::OPINET_DIESEL, page.clone())
            .page(sources::OPINET_LPG, page)
            .page(sources::EV_CHARGE_PRICE, EV_PAGE);
        let repo = repository().await?;

        let (costs, report) = MarketPipeline::new(&config).run_fuel(&mut session, &repo).await?;

        let cost = |fuel| costs.iter().find(|c| c.fuel_type == fuel).map(|c| c.average_cost);
        assert_eq!(cost(FuelKind::Diesel), Some(1550.0));
        assert_eq!(cost(FuelKind::Lpg), Some(584.0));
        assert_eq!(cost(FuelKind::Electric), Some(350.0));
        assert_eq!(cost(FuelKind::Other), Some(0.0));
        assert!(session.journal().iter().any(|e| e == "select #selExcelCnt#4"));
        assert_eq!(report.failures().count(), 0);
        assert_eq!(repo.list_fuel_costs(None).await?.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_source_leaves_fuel_out() -> Result<()> {
        let config = AppConfig::default();
        let mut session = ScriptedSession::new()
            .page(sources::OPINET_DIESEL, opinet_page(&["1,500.0"], &["-"]))
            .page(sources::OPINET_LPG, "<p>점검 중</p>");
        let repo = repository().await?;

        let (costs, report) = MarketPipeline::new(&config).run_fuel(&mut session, &repo).await?;

        assert!(costs.iter().all(|c| c.fuel_type != FuelKind::Lpg && c.fuel_type != FuelKind::Electric));
        assert!(matches!(report.sites[1].1, SiteOutcome::Empty { .. }));
        assert!(matches!(report.sites[2].1, SiteOutcome::Failed { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_charger_counts_are_upserted() -> Result<()> {
        let config = AppConfig::default();
        let mut session = ScriptedSession::new().page(sources::CHARGER_STATS, CHARGER_PAGE);
        let repo = repository().await?;

        let (records, _) = MarketPipeline::new(&config).run_chargers(&mut session, &repo).await?;

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].charger_count, 1234);
        assert_eq!(records[2].region, defaults::NATIONWIDE_REGION);
        let stored = repo.list_charger_counts(Some("서울")).await?;
        assert_eq!(stored[0].charger_count, 1234);
        Ok(())
    }
}

//! danawa vehicle crawl and spec transform
//!
//! For every enabled model: image lookup on the search page, lineup listing,
//! then the spec tab of each lineup with the price tab as fallback when the
//! spec header carries no trim.

use crate::application::normalizer::transform_catalog;
use crate::application::run_report::{RunReport, SiteOutcome};
use crate::domain::vehicle::{LineupSnapshot, ModelSnapshot, VehicleCatalog};
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::config::{AppConfig, VehicleModelConfig, defaults, utils};
use crate::infrastructure::parsing::ContextualParser;
use crate::infrastructure::parsing::vehicle_extractors::{
    LineupEntry, LineupListParser, PriceTabParser, SearchImageParser, SpecTabParser,
};
use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult};
use crate::infrastructure::pipeline_repository::RecordSink;
use crate::infrastructure::simple_http_client::{HttpClient, absolute_image_url};
use anyhow::{Context, Result};
use scraper::Html;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Search keywords tried in order until an image is found
pub fn search_keywords(keyword: &str) -> Vec<String> {
    let fallbacks: &[&str] = if keyword.contains("EV") {
        &["봉고3", "봉고"]
    } else if keyword.contains("봉고3") {
        &["봉고"]
    } else {
        &[]
    };
    let mut keywords = vec![keyword.to_string()];
    for fallback in fallbacks {
        if !keywords.iter().any(|k| k == fallback) {
            keywords.push((*fallback).to_string());
        }
    }
    keywords
}

/// Parse a snapshot without holding the DOM across an await
fn parse<P: ContextualParser>(parser: &P, html: &str, context: &P::Context) -> ExtractionResult<P::Output> {
    parser.parse_with_context(&Html::parse_document(html), context)
}

pub struct VehiclePipeline<'a> {
    config: &'a AppConfig,
    lineups: LineupListParser,
    spec_tab: SpecTabParser,
    price_tab: PriceTabParser,
    search_image: SearchImageParser,
    http: Option<HttpClient>,
}

impl<'a> VehiclePipeline<'a> {
    pub fn new(config: &'a AppConfig) -> Result<Self> {
        let selectors = &config.vehicles.selectors;
        let http = if config.storage.download_images {
            Some(HttpClient::new()?)
        } else {
            None
        };
        Ok(Self {
            config,
            lineups: LineupListParser::new(selectors)?,
            spec_tab: SpecTabParser::new(selectors)?,
            price_tab: PriceTabParser::new(selectors)?,
            search_image: SearchImageParser::new(selectors),
            http,
        })
    }

    async fn render(&self, session: &mut dyn BrowserSession, url: &str, settle_ms: u64) -> ExtractionResult<String> {
        session
            .open(url)
            .await
            .map_err(|e| ExtractionError::navigation(url, e))?;
        session.settle(Duration::from_millis(settle_ms)).await;
        session
            .snapshot()
            .await
            .map_err(|e| ExtractionError::interaction("snapshot", e))
    }

    /// Model image from the search results, trying the fallback keywords
    pub async fn find_image(&self, session: &mut dyn BrowserSession, model: &VehicleModelConfig) -> Option<String> {
        for keyword in search_keywords(&model.search_keyword) {
            let url = utils::danawa_search_url(&self.config.sources.danawa_search, &keyword);
            let html = match self.render(session, &url, defaults::SEARCH_PAGE_SETTLE_MS).await {
                Ok(html) => html,
                Err(e) => {
                    debug!("Search '{}' failed: {}", keyword, e);
                    continue;
                }
            };
            match parse(&self.search_image, &html, &model.model_id) {
                Ok(Some(src)) => {
                    info!("🖼️ {} image found with '{}'", model.key, keyword);
                    return Some(absolute_image_url(&src));
                }
                Ok(None) => debug!("No image for '{}'", keyword),
                Err(e) => warn!("⚠️ Image lookup for {}: {}", model.key, e),
            }
        }
        warn!("⚠️ No image found for {}", model.key);
        None
    }

    /// Lineups to crawl: configured ids (named from the listing when possible) or every listed lineup
    pub async fn lineups(
        &self,
        session: &mut dyn BrowserSession,
        model: &VehicleModelConfig,
    ) -> ExtractionResult<Vec<LineupEntry>> {
        let url = utils::danawa_lineups_url(&model.model_id);
        let html = self.render(session, &url, defaults::VEHICLE_PAGE_SETTLE_MS).await?;
        let listed = parse(&self.lineups, &html, &())?;
        debug!("{}: {} lineups listed", model.key, listed.len());

        if model.lineup_ids.is_empty() {
            return Ok(listed);
        }
        Ok(model
            .lineup_ids
            .iter()
            .map(|id| LineupEntry {
                id: id.clone(),
                name: listed
                    .iter()
                    .find(|entry| &entry.id == id)
                    .map_or_else(|| format!("라인업 {id}"), |entry| entry.name.clone()),
            })
            .collect())
    }

    /// Spec tab of one lineup, price tab when the spec header is empty
    pub async fn lineup_snapshot(
        &self,
        session: &mut dyn BrowserSession,
        model: &VehicleModelConfig,
        entry: &LineupEntry,
    ) -> ExtractionResult<LineupSnapshot> {
        let template = &self.config.sources.danawa_model;
        let spec_url = utils::danawa_model_url(template, &model.model_id, &entry.id, "spec");
        let html = self.render(session, &spec_url, defaults::VEHICLE_PAGE_SETTLE_MS).await?;
        let spec = parse(&self.spec_tab, &html, &())?;

        let mut snapshot = LineupSnapshot {
            id: entry.id.clone(),
            name: entry.name.clone(),
            trims: spec.trims,
            specs: spec.specs,
            ..Default::default()
        };

        if snapshot.trims.is_empty() {
            debug!("Spec header empty for lineup {}, trying the price tab", entry.id);
            let price_url = utils::danawa_model_url(template, &model.model_id, &entry.id, "price");
            let html = self.render(session, &price_url, defaults::VEHICLE_PAGE_SETTLE_MS).await?;
            let price = parse(&self.price_tab, &html, &())?;
            snapshot.trims = price.trims;
            snapshot.features = price.features;
        }

        Ok(snapshot)
    }

    /// One model with every lineup. A failing lineup is kept with whatever was read.
    pub async fn extract_model(
        &self,
        session: &mut dyn BrowserSession,
        model: &VehicleModelConfig,
    ) -> ExtractionResult<ModelSnapshot> {
        let mut snapshot = ModelSnapshot::new(&model.name, &model.model_id, &model.maker);
        snapshot.image_url = self.find_image(session, model).await.unwrap_or_default();

        let entries = self.lineups(session, model).await?;
        info!("📊 {}: {} lineups to crawl", model.key, entries.len());

        for entry in &entries {
            match self.lineup_snapshot(session, model, entry).await {
                Ok(lineup) => {
                    debug!("✅ {} {}: {} spec rows", model.key, entry.name, lineup.specs.len());
                    snapshot.lineup.push(lineup);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("⚠️ {} lineup {} failed: {}", model.key, entry.id, e);
                    snapshot.lineup.push(LineupSnapshot {
                        id: entry.id.clone(),
                        name: entry.name.clone(),
                        ..Default::default()
                    });
                }
            }
            let jitter = fastrand::u64(0..=defaults::LINEUP_PAUSE_JITTER_MS);
            session.settle(Duration::from_millis(defaults::LINEUP_PAUSE_MS + jitter)).await;
        }

        if let Some(http) = self.http.as_ref().filter(|_| !snapshot.image_url.is_empty()) {
            match http
                .download_image(&snapshot.image_url, &self.config.storage.image_dir, &model.key)
                .await
            {
                Ok(path) => snapshot.image_file = path.display().to_string(),
                Err(e) => warn!("⚠️ Image download for {} failed: {:#}", model.key, e),
            }
        }

        Ok(snapshot)
    }

    /// Every enabled model, keyed by model key
    pub async fn collect(&self, session: &mut dyn BrowserSession) -> Result<(VehicleCatalog, RunReport)> {
        let mut report = RunReport::new("vehicles");
        let mut catalog = VehicleCatalog::new();

        for model in &self.config.vehicles.models {
            if !model.enabled {
                debug!("Skipping disabled model {}", model.key);
                continue;
            }
            if model.model_id.trim().is_empty() {
                warn!("⚠️ {} has no danawa model id configured", model.key);
                report.record(&model.key, SiteOutcome::failed("no danawa model id configured"));
                continue;
            }

            info!("🌐 {} ({})", model.name, model.model_id);
            match self.extract_model(session, model).await {
                Ok(snapshot) => {
                    report.record(&model.key, SiteOutcome::from_count(snapshot.lineup.len(), "no lineups listed"));
                    catalog.insert(model.key.clone(), snapshot);
                }
                Err(e) if e.is_fatal() => {
                    return Err(e).with_context(|| format!("Browser session lost while crawling {}", model.key));
                }
                Err(e) => {
                    warn!("❌ {}: {}", model.key, e);
                    report.record(&model.key, SiteOutcome::failed(e));
                }
            }
        }

        report.set_kept(catalog.values().map(|m| m.lineup.len()).sum());
        Ok((catalog, report))
    }

    /// Crawl and save `vehicles.json`
    pub async fn run(&self, session: &mut dyn BrowserSession, store: &ArtifactStore) -> Result<(VehicleCatalog, RunReport)> {
        let (catalog, report) = self.collect(session).await?;
        store.save_vehicle_catalog(&catalog).await?;
        report.log();
        Ok((catalog, report))
    }
}

/// Reload `vehicles.json`, normalize and insert into `car_info_tbl`
pub async fn load_vehicles(store: &ArtifactStore, sink: &dyn RecordSink, models: &[VehicleModelConfig]) -> Result<usize> {
    let catalog = store
        .load_vehicle_catalog()
        .await
        .context("Vehicle artifact missing, run the vehicles command first")?;
    let specs = transform_catalog(&catalog, models);
    info!("🔄 {} models → {} spec rows", catalog.len(), specs.len());
    sink.insert_vehicle_specs(&specs).await
}

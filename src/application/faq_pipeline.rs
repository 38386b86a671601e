//! FAQ extraction pipeline
//!
//! Sites are visited one after another with the same browser session. Each
//! site ends in a [`SiteOutcome`]; only a session failure stops the run.

use crate::application::classifier::Classifier;
use crate::application::normalizer::is_valid_faq;
use crate::application::pager::{PagedRun, collect_pages, pager_for};
use crate::application::run_report::{RunReport, SiteOutcome};
use crate::domain::faq::{CanonicalFaq, FaqDocument, RawRecord, dedup_by_question};
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::config::{AppConfig, FaqSiteConfig};
use crate::infrastructure::parsing::faq_extractors::{FaqExtractor, FaqPageContext};
use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult};
use crate::infrastructure::pipeline_repository::RecordSink;
use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct FaqPipeline<'a> {
    config: &'a AppConfig,
    classifier: Classifier,
}

impl<'a> FaqPipeline<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self {
            config,
            classifier: Classifier::new(&config.classifier),
        }
    }

    /// Raw records of every page one site exposes
    pub async fn extract_site(
        &self,
        session: &mut dyn BrowserSession,
        site: &FaqSiteConfig,
    ) -> ExtractionResult<PagedRun> {
        let extractor = FaqExtractor::from_strategy(&site.strategy)?;

        session
            .open(&site.url)
            .await
            .map_err(|e| ExtractionError::navigation(&site.url, e))?;
        session.settle(Duration::from_secs(site.wait_secs)).await;
        if site.scroll_to_bottom {
            if let Err(e) = session.scroll_to_bottom().await {
                debug!("Scroll failed on {}: {}", site.name, e);
            }
        }

        let mut pager = pager_for(&site.interaction, &self.config.browser);
        debug!("🔄 {} uses {} extraction with {} paging", site.name, site.strategy.kind(), pager.kind());

        let base = FaqPageContext::new(&site.name, &site.url);
        collect_pages(session, pager.as_mut(), |html, page| {
            extractor.extract(html, &base.clone().at_page(page))
        })
        .await
    }

    /// Length filter, then classification with the site defaults
    pub fn canonicalize(&self, site: &FaqSiteConfig, records: Vec<RawRecord>) -> Vec<CanonicalFaq> {
        let total = records.len();
        let kept: Vec<CanonicalFaq> = records
            .into_iter()
            .filter(|record| is_valid_faq(record, &self.config.faq))
            .map(|record| {
                self.classifier
                    .canonicalize(record, Some(site.default_category), Some(site.default_fuel))
            })
            .collect();
        if kept.len() < total {
            debug!("{}: {} of {} records failed the length filter", site.name, total - kept.len(), total);
        }
        kept
    }

    /// Every configured site in order, deduplicated by question text
    pub async fn collect(&self, session: &mut dyn BrowserSession) -> Result<(Vec<CanonicalFaq>, RunReport)> {
        let mut report = RunReport::new("faq");
        let mut faqs = Vec::new();

        for site in &self.config.faq.sites {
            info!("🌐 {} ({})", site.name, site.description);
            match self.extract_site(session, site).await {
                Ok(run) => {
                    info!("📄 {}: {} records over {} pages ({})", site.name, run.records.len(), run.pages, run.reason);
                    let canonical = self.canonicalize(site, run.records);
                    report.record(&site.name, SiteOutcome::from_count(canonical.len(), "no records passed the filter"));
                    faqs.extend(canonical);
                }
                Err(e) if e.is_fatal() => {
                    error!("❌ {}: {}", site.name, e);
                    return Err(e).with_context(|| format!("Browser session lost while scraping {}", site.name));
                }
                Err(e @ (ExtractionError::ContainerMissing { .. } | ExtractionError::NoRecords { .. })) => {
                    warn!("⚠️ {}: {}", site.name, e);
                    report.record(&site.name, SiteOutcome::empty(e));
                }
                Err(e) => {
                    warn!("❌ {}: {}", site.name, e);
                    report.record(&site.name, SiteOutcome::failed(e));
                }
            }
        }

        let faqs = dedup_by_question(faqs, |faq| faq.question.as_str());
        report.tally_faqs(&faqs);
        Ok((faqs, report))
    }

    /// Scrape, save `all_faqs.json` plus the per-category files, report
    pub async fn run(&self, session: &mut dyn BrowserSession, store: &ArtifactStore) -> Result<(FaqDocument, RunReport)> {
        let (faqs, report) = self.collect(session).await?;
        let collected_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let document = FaqDocument::new(faqs, collected_at);
        store.save_faq_document(&document).await?;
        report.log();
        Ok((document, report))
    }
}

/// Reload `all_faqs.json` and hand it to the sink
pub async fn load_faqs(store: &ArtifactStore, sink: &dyn RecordSink) -> Result<usize> {
    let document = store
        .load_faq_document()
        .await
        .context("FAQ artifact missing, run the faq command first")?;
    info!("🔄 Loading {} FAQs collected at {}", document.faqs.len(), document.metadata.collection_date);
    sink.insert_faqs(&document.faqs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::faq::{FaqCategory, FuelTag};
    use crate::infrastructure::browser::ScriptedSession;
    use crate::infrastructure::parsing::config::{FaqStrategy, InteractionMode};

    const ACCORDION_URL: &str = "https://faq.example/accordion";
    const BLOG_URL: &str = "https://blog.example/post";

    fn accordion_site() -> FaqSiteConfig {
        FaqSiteConfig {
            name: "accordion".into(),
            url: ACCORDION_URL.into(),
            description: "accordion faq".into(),
            default_category: FaqCategory::Infrastructure,
            default_fuel: FuelTag::Other,
            wait_secs: 0,
            strategy: FaqStrategy::Accordion {
                item: ".item".into(),
                question: ".q".into(),
                answer: ".a".into(),
                strip_prefix: Some(r"^Q\.\s*".into()),
            },
            interaction: InteractionMode::Static,
            scroll_to_bottom: true,
        }
    }

    fn blog_site() -> FaqSiteConfig {
        FaqSiteConfig {
            name: "blog".into(),
            url: BLOG_URL.into(),
            description: "wordpress post".into(),
            default_category: FaqCategory::Cost,
            default_fuel: FuelTag::Diesel,
            wait_secs: 0,
            strategy: FaqStrategy::HeadingBody {
                container: ".entry-content".into(),
                headings: vec!["h2".into(), "h3".into()],
            },
            interaction: InteractionMode::Static,
            scroll_to_bottom: false,
        }
    }

    fn config(sites: Vec<FaqSiteConfig>) -> AppConfig {
        let mut config = AppConfig::default();
        config.faq.sites = sites;
        config
    }

    const ACCORDION_PAGE: &str = r#"
        <div class="item"><div class="q">Q. 전기 화물차 충전 시간은 얼마나 걸리나요?</div>
          <div class="a">급속 충전 시 30분~1시간 정도 소요됩니다.</div></div>
        <div class="item"><div class="q">Q. 짧은 질문</div><div class="a">짧음</div></div>"#;

    #[tokio::test]
    async fn test_site_is_scrolled_and_filtered() -> Result<()> {
        let config = config(vec![accordion_site()]);
        let pipeline = FaqPipeline::new(&config);
        let mut session = ScriptedSession::new().page(ACCORDION_URL, ACCORDION_PAGE);

        let (faqs, report) = pipeline.collect(&mut session).await?;

        assert!(session.journal().iter().any(|entry| entry == "scroll"));
        assert_eq!(faqs.len(), 1);
        assert_eq!(faqs[0].question, "전기 화물차 충전 시간은 얼마나 걸리나요?");
        assert_eq!(faqs[0].fuel_type, FuelTag::Electric);
        assert_eq!(faqs[0].category, FaqCategory::Infrastructure);
        assert_eq!(report.sites[0].1, SiteOutcome::collected(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_container_is_empty_not_failed() -> Result<()> {
        let config = config(vec![blog_site(), accordion_site()]);
        let pipeline = FaqPipeline::new(&config);
        let mut session = ScriptedSession::new()
            .page(BLOG_URL, "<article><p>본문만 있음</p></article>")
            .page(ACCORDION_URL, ACCORDION_PAGE);

        let (faqs, report) = pipeline.collect(&mut session).await?;

        assert!(matches!(report.sites[0].1, SiteOutcome::Empty { .. }));
        assert_eq!(report.failures().count(), 0);
        assert_eq!(faqs.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_site_fails_and_run_continues() -> Result<()> {
        let mut unreachable = blog_site();
        unreachable.url = "https://down.example/faq".into();
        let config = config(vec![unreachable, accordion_site()]);
        let pipeline = FaqPipeline::new(&config);
        let mut session = ScriptedSession::new().page(ACCORDION_URL, ACCORDION_PAGE);

        let (faqs, report) = pipeline.collect(&mut session).await?;

        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.sites[1].1, SiteOutcome::collected(1));
        assert_eq!(faqs.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_questions_across_sites_keep_first() -> Result<()> {
        let mut mirror = accordion_site();
        mirror.name = "mirror".into();
        mirror.url = "https://mirror.example/faq".into();
        mirror.default_category = FaqCategory::Cost;
        let config = config(vec![accordion_site(), mirror]);
        let pipeline = FaqPipeline::new(&config);
        let mut session = ScriptedSession::new()
            .page(ACCORDION_URL, ACCORDION_PAGE)
            .page("https://mirror.example/faq", ACCORDION_PAGE);

        let (faqs, report) = pipeline.collect(&mut session).await?;

        assert_eq!(faqs.len(), 1);
        assert_eq!(faqs[0].source_url, ACCORDION_URL);
        assert_eq!(report.extracted(), 2);
        assert_eq!(report.kept, 1);
        Ok(())
    }
}

//! FAQ pipeline against scripted pages: pagination, classification, dedup, storage

use anyhow::Result;
use tempfile::tempdir;
use truck_data_pipeline::application::faq_pipeline::load_faqs;
use truck_data_pipeline::application::{Classifier, FaqPipeline, SiteOutcome};
use truck_data_pipeline::domain::faq::{FaqCategory, FuelTag, RawRecord, dedup_by_question};
use truck_data_pipeline::domain::pagination::ExhaustionReason;
use truck_data_pipeline::infrastructure::config::FaqSiteConfig;
use truck_data_pipeline::infrastructure::parsing::{FaqStrategy, InteractionMode};
use truck_data_pipeline::infrastructure::{AppConfig, ArtifactStore, DatabaseConnection, PipelineRepository, ScriptedSession};

const URL: &str = "https://support.example/faq";
const NEXT: &str = "nav.pagination button.navi.next";

fn paged_site() -> FaqSiteConfig {
    FaqSiteConfig {
        name: "support".into(),
        url: URL.into(),
        description: "paged accordion".into(),
        default_category: FaqCategory::Maintenance,
        default_fuel: FuelTag::Other,
        wait_secs: 0,
        strategy: FaqStrategy::Accordion {
            item: "div.result_area div.ui_accordion dl".into(),
            question: "dt .brief".into(),
            answer: "dd .exp".into(),
            strip_prefix: None,
        },
        interaction: InteractionMode::NextButton {
            next: NEXT.into(),
            content: "div.result_area dl".into(),
            settle_ms: 0,
        },
        scroll_to_bottom: false,
    }
}

fn page(n: u32, last: bool) -> String {
    let items: String = (1..=2)
        .map(|i| {
            format!(
                "<dl><dt><span class='brief'>{n}페이지 {i}번째 질문입니다 차량 점검 주기</span></dt>\
                 <dd><div class='exp'>엔진오일은 1만 km마다 교체하는 것이 좋습니다.</div></dd></dl>"
            )
        })
        .collect();
    let disabled = if last { "disabled" } else { "" };
    format!(
        "<div class='result_area'><div class='ui_accordion'>{items}</div></div>\
         <nav class='pagination'><button class='navi next' {disabled}>다음</button></nav>"
    )
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.faq.sites = vec![paged_site()];
    config
}

#[tokio::test]
async fn next_button_source_yields_exactly_three_pages() -> Result<()> {
    let config = config();
    let pipeline = FaqPipeline::new(&config);
    let mut session = ScriptedSession::new()
        .page(URL, page(1, false))
        .page(URL, page(2, false))
        .page(URL, page(3, true))
        .page(URL, page(4, false))
        .advance_on(NEXT);

    let run = pipeline.extract_site(&mut session, &paged_site()).await?;

    assert_eq!(run.pages, 3);
    assert_eq!(run.records.len(), 6);
    assert_eq!(run.reason, ExhaustionReason::ControlUnavailable);
    assert!(run.records.iter().all(|r| !r.question.starts_with('4')));
    let clicks = session.journal().iter().filter(|e| e.starts_with("click")).count();
    assert_eq!(clicks, 2);
    Ok(())
}

#[tokio::test]
async fn collected_faqs_are_saved_and_loaded() -> Result<()> {
    let dir = tempdir()?;
    let mut config = config();
    config.storage.raw_dir = dir.path().join("raw");
    config.storage.processed_dir = dir.path().join("processed");
    let store = ArtifactStore::from_config(&config.storage);
    let mut session = ScriptedSession::new()
        .page(URL, page(1, false))
        .page(URL, page(2, true))
        .advance_on(NEXT);

    let (document, report) = FaqPipeline::new(&config).run(&mut session, &store).await?;

    assert_eq!(document.metadata.total_count, 4);
    assert_eq!(document.metadata.categories.get("maintenance"), Some(&4));
    assert_eq!(report.sites[0].1, SiteOutcome::collected(4));
    assert!(store.faq_path().exists());

    let db = DatabaseConnection::new(&format!("sqlite:{}", dir.path().join("faq.db").display())).await?;
    db.migrate().await?;
    let repo = PipelineRepository::new(db.pool().clone());
    assert_eq!(load_faqs(&store, &repo).await?, 4);

    let stored = repo.list_faqs(Some("정비")).await?;
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0].related_fuel_type.as_deref(), Some("전체"));
    Ok(())
}

#[test]
fn keyword_match_overrides_site_default() {
    let classifier = Classifier::new(&AppConfig::default().classifier);
    let record = RawRecord::new(URL, "전기 화물차 충전 시간은 얼마나 걸리나요?", "급속 충전 시 30분~1시간...");

    let faq = classifier.canonicalize(record, Some(FaqCategory::Registration), None);

    assert_eq!(faq.fuel_type, FuelTag::Electric);
    assert_eq!(faq.category, FaqCategory::Infrastructure);
}

#[test]
fn identical_questions_from_two_sources_collapse_to_first() {
    let records = vec![
        RawRecord::new("https://a.example", "화물차 등록 절차는 어떻게 되나요?", "첫 번째 답변"),
        RawRecord::new("https://b.example", "화물차 등록 절차는 어떻게 되나요?", "두 번째 답변"),
        RawRecord::new("https://b.example", "번호판 교체 비용은?", "세 번째 답변"),
    ];

    let unique = dedup_by_question(records, |r| r.question.as_str());

    assert_eq!(unique.len(), 2);
    assert_eq!(unique[0].source_url, "https://a.example");
}

//! Vehicle registration statistics
//!
//! The statistics portal lists one spreadsheet per month. Download clicks each
//! "자동차 등록" entry newer than the cut-off year; transform reads every
//! workbook from the download directory and produces `cnt_tbl` rows plus the
//! yearly trend.

use crate::application::aggregation::{collapse_fuels, collapse_regions, melt, trend_from_province_counts};
use crate::application::pager::click_with_retry;
use crate::application::run_report::{RunReport, SiteOutcome};
use crate::domain::registration::{ProvinceCount, RegistrationCountRecord, TrendPoint, WideSheet};
use crate::infrastructure::artifact_store::ArtifactStore;
use crate::infrastructure::browser::BrowserSession;
use crate::infrastructure::config::{SourceUrls, defaults};
use crate::infrastructure::pipeline_repository::RecordSink;
use crate::infrastructure::spreadsheet::{list_workbooks, read_registration_workbook};
use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Download links of the monthly files
pub const FILE_LINKS: &str = ".file-sch-list > li > a";

/// (DOM index, text) of the links to click.
///
/// Texts are sorted descending, the walk stops at the first text containing
/// `stop_marker`, and only unseen texts containing `keyword` are kept. Each
/// listing box carries two links with the same text.
pub fn download_targets(texts: &[String], stop_marker: &str, keyword: &str) -> Vec<(usize, String)> {
    let mut ordered: Vec<(usize, &String)> = texts.iter().enumerate().collect();
    ordered.sort_by(|a, b| b.1.cmp(a.1));

    let mut targets: Vec<(usize, String)> = Vec::new();
    for (index, text) in ordered {
        if text.contains(stop_marker) {
            break;
        }
        if text.contains(keyword) && !targets.iter().any(|(_, seen)| seen == text) {
            targets.push((index, text.clone()));
        }
    }
    targets
}

/// Click every monthly file into `download_dir`
pub async fn download_registration_files(
    session: &mut dyn BrowserSession,
    sources: &SourceUrls,
    download_dir: &Path,
) -> Result<RunReport> {
    let mut report = RunReport::new("registration-download");

    tokio::fs::create_dir_all(download_dir)
        .await
        .with_context(|| format!("Failed to create {}", download_dir.display()))?;
    session
        .enable_downloads(download_dir)
        .await
        .context("Failed to enable browser downloads")?;
    session
        .open(&sources.molit_stats)
        .await
        .with_context(|| format!("Failed to open {}", sources.molit_stats))?;
    session.settle(Duration::from_millis(defaults::MARKET_PAGE_SETTLE_MS)).await;

    let texts: Vec<String> = session
        .find_all(FILE_LINKS)
        .await
        .into_iter()
        .map(|link| link.text)
        .collect();
    let targets = download_targets(&texts, &sources.registration_stop_marker, &sources.registration_keyword);
    info!("📊 {} links listed, {} files to download", texts.len(), targets.len());

    for (count, (index, text)) in targets.iter().enumerate() {
        match click_with_retry(session, FILE_LINKS, *index).await {
            Ok(()) => {
                info!("📁 {}: {}", count + 1, text);
                report.record(text, SiteOutcome::collected(1));
            }
            Err(e) => {
                warn!("❌ {}: {}", text, e);
                report.record(text, SiteOutcome::failed(e));
            }
        }
        session.settle(Duration::from_millis(defaults::DOWNLOAD_CLICK_PAUSE_MS)).await;
    }
    session.settle(Duration::from_millis(defaults::DOWNLOAD_FINISH_WAIT_MS)).await;

    if targets.is_empty() {
        report.record(&sources.molit_stats, SiteOutcome::empty("no matching download links"));
    }
    report.set_kept(report.extracted());
    report.log();
    Ok(report)
}

/// Output of the registration transform
#[derive(Debug, Clone, Default)]
pub struct RegistrationSummary {
    pub records: Vec<RegistrationCountRecord>,
    pub trend: Vec<TrendPoint>,
    pub report: RunReport,
}

/// Every readable workbook in `dir`; unreadable files are reported and skipped
pub async fn read_workbooks(dir: &Path, report: &mut RunReport) -> Result<Vec<WideSheet>> {
    let files = list_workbooks(dir).with_context(|| format!("Failed to list workbooks in {}", dir.display()))?;
    let mut sheets = Vec::with_capacity(files.len());

    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let outcome = tokio::task::spawn_blocking(move || read_registration_workbook(&path))
            .await
            .context("Workbook reader task panicked")?;
        match outcome {
            Ok(sheet) => {
                report.record(&name, SiteOutcome::from_count(sheet.rows.len(), "sheet has no data rows"));
                sheets.push(sheet);
            }
            Err(e) => {
                warn!("⚠️ {}", e);
                report.record(&name, SiteOutcome::failed(e));
            }
        }
    }
    Ok(sheets)
}

/// Workbooks → `registered_cars.json`, `registration_trend.json` and `cnt_tbl`
pub async fn transform_registration(store: &ArtifactStore, sink: &dyn RecordSink) -> Result<RegistrationSummary> {
    let mut report = RunReport::new("transform-registration");
    let sheets = read_workbooks(&store.registration_download_dir(), &mut report).await?;

    let counts: Vec<ProvinceCount> = sheets.iter().flat_map(melt).collect();
    debug!("Melted {} sheets into {} province rows", sheets.len(), counts.len());
    let records = collapse_fuels(&collapse_regions(&counts));
    let trend = trend_from_province_counts(&counts);

    store.save_registration_counts(&records).await?;
    store.save_trend(&trend).await?;
    for point in &trend {
        info!(
            year = point.year,
            electric = point.electric,
            combustion = point.combustion,
            other = point.other,
            "📈 new registrations"
        );
    }

    let stored = sink.insert_registration_counts(&records).await?;
    report.set_kept(stored);
    report.log();

    Ok(RegistrationSummary { records, trend, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::browser::ScriptedSession;
    use crate::infrastructure::config::sources;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use crate::infrastructure::pipeline_repository::PipelineRepository;
    use tempfile::tempdir;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_targets_stop_at_cutoff_and_dedup() {
        let listed = texts(&[
            "2015년 12월 자동차 등록자료",
            "2024년 1월 자동차 등록자료",
            "2024년 1월 자동차 등록자료",
            "2024년 2월 자동차 등록자료",
            "2023년 12월 통계 요약",
            "2014년 1월 자동차 등록자료",
        ]);
        let targets = download_targets(&listed, "2015년", "자동차 등록");
        assert_eq!(
            targets,
            vec![
                (3, "2024년 2월 자동차 등록자료".to_string()),
                (1, "2024년 1월 자동차 등록자료".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_download_clicks_each_target_once() -> Result<()> {
        let dir = tempdir()?;
        let page = r#"<ul class="file-sch-list">
            <li><a>2023년 12월 자동차 등록자료</a></li>
            <li><a>2024년 1월 자동차 등록자료</a></li>
            <li><a>2015년 1월 자동차 등록자료</a></li></ul>"#;
        let mut session = ScriptedSession::new().page(sources::MOLIT_STATS, page);

        let report = download_registration_files(&mut session, &SourceUrls::default(), dir.path()).await?;

        assert_eq!(session.download_dir(), Some(dir.path()));
        let clicks: Vec<&String> = session.journal().iter().filter(|e| e.starts_with("click")).collect();
        assert_eq!(clicks, vec![&format!("click {FILE_LINKS}#1"), &format!("click {FILE_LINKS}#0")]);
        assert_eq!(report.kept, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_transform_of_empty_directory_stores_nothing() -> Result<()> {
        let dir = tempdir()?;
        let store = ArtifactStore::new(dir.path().join("raw"), dir.path().join("processed"));
        std::fs::create_dir_all(store.registration_download_dir())?;
        std::fs::write(store.registration_download_dir().join("readme.txt"), "not a workbook")?;
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        let repo = PipelineRepository::new(db.pool().clone());

        let summary = transform_registration(&store, &repo).await?;

        assert!(summary.records.is_empty());
        assert!(summary.trend.is_empty());
        assert!(store.registration_path().exists());
        assert!(repo.list_registration_counts().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_workbook_is_reported() -> Result<()> {
        let dir = tempdir()?;
        std::fs::write(dir.path().join("2024년_1월_자동차_등록자료.xlsx"), b"not a zip")?;
        let mut report = RunReport::new("transform-registration");

        let sheets = read_workbooks(dir.path(), &mut report).await?;

        assert!(sheets.is_empty());
        assert_eq!(report.failures().count(), 1);
        Ok(())
    }
}

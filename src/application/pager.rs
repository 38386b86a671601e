//! Pagination and interaction controllers
//!
//! A controller moves a rendered source from page n to page n+1 and reports
//! exhaustion. [`collect_pages`] drives any controller and re-reads the DOM on
//! every page, since sources replace their subtrees on navigation.

use crate::domain::faq::RawRecord;
use crate::domain::pagination::{ExhaustionReason, PagerState};
use crate::infrastructure::browser::{BrowserSession, WaitCondition};
use crate::infrastructure::config::{BrowserConfig, defaults};
use crate::infrastructure::parsing::config::{InteractionMode, PageTotalSource};
use crate::infrastructure::parsing_error::{ExtractionError, ExtractionResult, InteractionError};
use async_trait::async_trait;
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of one page-turn attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved(u32),
    Exhausted(ExhaustionReason),
}

/// Controller for one paged source
#[async_trait]
pub trait PagedSource: Send {
    fn kind(&self) -> &'static str;

    /// Runs once after the first page is rendered
    async fn prepare(&mut self, _session: &mut dyn BrowserSession) {}

    /// Interactions needed before `page` can be extracted (e.g. expanding answers)
    async fn before_extract(&mut self, _session: &mut dyn BrowserSession, _page: u32) {}

    /// Try to render the page after `page`
    async fn next_page(&mut self, session: &mut dyn BrowserSession, page: u32) -> Transition;
}

/// Click the `index`-th match, re-locating and retrying exactly once on a stale/missing element
pub async fn click_with_retry(
    session: &mut dyn BrowserSession,
    selector: &str,
    index: usize,
) -> Result<(), InteractionError> {
    match session.click_nth(selector, index).await {
        Err(e) if e.is_retryable() => {
            debug!("🔄 {} #{}: {}, retrying once", selector, index, e);
            session.click_nth(selector, index).await
        }
        other => other,
    }
}

/// Click every match of `selector` by position. Returns how many opened.
pub async fn expand_all(session: &mut dyn BrowserSession, selector: &str) -> usize {
    let count = session.find_all(selector).await.len();
    let mut opened = 0;
    for index in 0..count {
        match click_with_retry(session, selector, index).await {
            Ok(()) => opened += 1,
            Err(e) => debug!("Skipping {} #{}: {}", selector, index, e),
        }
    }
    if count > 0 {
        session.settle(Duration::from_millis(defaults::EXPAND_SETTLE_MS)).await;
    }
    debug!("Expanded {}/{} items of {}", opened, count, selector);
    opened
}

/// Single rendered page
#[derive(Debug, Default)]
pub struct SinglePage;

#[async_trait]
impl PagedSource for SinglePage {
    fn kind(&self) -> &'static str {
        "static"
    }

    async fn next_page(&mut self, _session: &mut dyn BrowserSession, _page: u32) -> Transition {
        Transition::Exhausted(ExhaustionReason::ControlUnavailable)
    }
}

/// "Next" button paging; a disabled or missing button ends the source
#[derive(Debug)]
pub struct NextButtonPager {
    next: String,
    content: String,
    settle: Duration,
    element_timeout: Duration,
}

impl NextButtonPager {
    pub fn new(next: &str, content: &str, settle: Duration, element_timeout: Duration) -> Self {
        Self {
            next: next.to_string(),
            content: content.to_string(),
            settle,
            element_timeout,
        }
    }
}

#[async_trait]
impl PagedSource for NextButtonPager {
    fn kind(&self) -> &'static str {
        "next_button"
    }

    async fn next_page(&mut self, session: &mut dyn BrowserSession, page: u32) -> Transition {
        let controls = session.find_all(&self.next).await;
        match controls.first() {
            None => {
                debug!("Next control '{}' absent on page {}", self.next, page);
                return Transition::Exhausted(ExhaustionReason::ControlUnavailable);
            }
            Some(control) if control.is_disabled() => {
                debug!("Next control disabled on page {}", page);
                return Transition::Exhausted(ExhaustionReason::ControlUnavailable);
            }
            Some(_) => {}
        }

        if let Err(e) = click_with_retry(session, &self.next, 0).await {
            warn!("⚠️ Next control click failed on page {}: {}", page, e);
            return Transition::Exhausted(ExhaustionReason::ControlUnavailable);
        }
        session.settle(self.settle).await;

        if !session.wait_for(&WaitCondition::present(&self.content), self.element_timeout).await {
            return Transition::Exhausted(ExhaustionReason::EmptyAfterTransition);
        }
        Transition::Moved(page + 1)
    }
}

/// Numbered index driven by a page-set script
#[derive(Debug)]
pub struct PageJumpPager {
    total_source: PageTotalSource,
    jump_script: String,
    current_page: Option<String>,
    content: String,
    expand: Option<String>,
    settle: Duration,
    element_timeout: Duration,
    total: Option<u32>,
}

impl PageJumpPager {
    pub fn new(
        total_source: PageTotalSource,
        jump_script: &str,
        current_page: Option<String>,
        content: &str,
        expand: Option<String>,
        settle: Duration,
        element_timeout: Duration,
    ) -> Self {
        Self {
            total_source,
            jump_script: jump_script.to_string(),
            current_page,
            content: content.to_string(),
            expand,
            settle,
            element_timeout,
            total: None,
        }
    }

    /// Total discovered by [`PagedSource::prepare`]
    pub fn total(&self) -> Option<u32> {
        self.total
    }

    pub fn script_for(&self, page: u32) -> String {
        self.jump_script.replace("{page}", &page.to_string())
    }

    async fn read_total(&self, session: &mut dyn BrowserSession) -> Option<u32> {
        match &self.total_source {
            PageTotalSource::MaxNumericId { selector } => session
                .find_all(selector)
                .await
                .iter()
                .filter_map(|el| el.attr("id").and_then(|id| id.trim().parse::<u32>().ok()))
                .max(),
            PageTotalSource::RegexText { selector, pattern } => {
                let re = match Regex::new(pattern) {
                    Ok(re) => re,
                    Err(e) => {
                        warn!("Invalid page-count pattern '{}': {}", pattern, e);
                        return None;
                    }
                };
                let text = session.find_all(selector).await.into_iter().next()?.text;
                re.captures(&text)?.get(2)?.as_str().parse().ok()
            }
        }
    }
}

#[async_trait]
impl PagedSource for PageJumpPager {
    fn kind(&self) -> &'static str {
        "page_jump"
    }

    async fn prepare(&mut self, session: &mut dyn BrowserSession) {
        self.total = self.read_total(session).await;
        match self.total {
            Some(total) => info!("📊 {} pages in total", total),
            None => warn!("⚠️ Page count unavailable, reading the first page only"),
        }
    }

    async fn before_extract(&mut self, session: &mut dyn BrowserSession, _page: u32) {
        if let Some(expand) = &self.expand {
            expand_all(session, expand).await;
        }
    }

    async fn next_page(&mut self, session: &mut dyn BrowserSession, page: u32) -> Transition {
        let Some(total) = self.total else {
            return Transition::Exhausted(ExhaustionReason::ControlUnavailable);
        };
        let PagerState::AtPage(target) = PagerState::AtPage(page).advance_within(total) else {
            return Transition::Exhausted(ExhaustionReason::TotalReached);
        };

        if let Err(e) = session.run_script(&self.script_for(target)).await {
            warn!("⚠️ Page-set script failed for page {}: {}", target, e);
            return Transition::Exhausted(ExhaustionReason::ControlUnavailable);
        }

        if let Some(indicator) = &self.current_page {
            let moved = session
                .wait_for(&WaitCondition::text_equals(indicator, target), self.element_timeout)
                .await;
            if !moved {
                warn!("⚠️ Active page indicator never showed {}", target);
                return Transition::Exhausted(ExhaustionReason::EmptyAfterTransition);
            }
        }
        session.settle(self.settle).await;

        if !session.wait_for(&WaitCondition::present(&self.content), self.element_timeout).await {
            return Transition::Exhausted(ExhaustionReason::EmptyAfterTransition);
        }
        Transition::Moved(target)
    }
}

/// Controller for a configured interaction mode
pub fn pager_for(mode: &InteractionMode, browser: &BrowserConfig) -> Box<dyn PagedSource> {
    let element_timeout = Duration::from_secs(browser.element_timeout_secs);
    match mode {
        InteractionMode::Static => Box::new(SinglePage),
        InteractionMode::NextButton {
            next,
            content,
            settle_ms,
        } => Box::new(NextButtonPager::new(
            next,
            content,
            Duration::from_millis(*settle_ms),
            element_timeout,
        )),
        InteractionMode::PageJump {
            total,
            jump_script,
            current_page,
            content,
            expand,
            settle_ms,
        } => Box::new(PageJumpPager::new(
            total.clone(),
            jump_script,
            current_page.clone(),
            content,
            expand.clone(),
            Duration::from_millis(*settle_ms),
            element_timeout,
        )),
    }
}

/// Records from every page a controller reaches
#[derive(Debug, Clone, PartialEq)]
pub struct PagedRun {
    pub records: Vec<RawRecord>,
    pub pages: u32,
    pub reason: ExhaustionReason,
}

/// Drive `pager` from page 1 to exhaustion, extracting each freshly rendered page.
///
/// A first-page extraction error is returned to the caller. On later pages an
/// error or an empty result ends pagination instead.
pub async fn collect_pages<F>(
    session: &mut dyn BrowserSession,
    pager: &mut dyn PagedSource,
    mut extract: F,
) -> ExtractionResult<PagedRun>
where
    F: FnMut(&str, u32) -> ExtractionResult<Vec<RawRecord>>,
{
    pager.prepare(session).await;

    let mut state = PagerState::first();
    let mut records = Vec::new();
    let mut pages = 0;
    let mut reason = ExhaustionReason::ControlUnavailable;

    while let PagerState::AtPage(page) = state {
        pager.before_extract(session, page).await;

        let html = match session.snapshot().await {
            Ok(html) => html,
            Err(e) if page == 1 => return Err(ExtractionError::interaction("snapshot", e)),
            Err(e) => {
                warn!("⚠️ Snapshot failed on page {}: {}", page, e);
                reason = ExhaustionReason::EmptyAfterTransition;
                break;
            }
        };

        match extract(&html, page) {
            Ok(found) if found.is_empty() && page > 1 => {
                reason = ExhaustionReason::EmptyAfterTransition;
                break;
            }
            Ok(found) => {
                debug!("📄 {} page {}: {} records", pager.kind(), page, found.len());
                pages += 1;
                records.extend(found);
            }
            Err(e) if page == 1 => return Err(e),
            Err(e) => {
                warn!("⚠️ Page {} yielded nothing: {}", page, e);
                reason = ExhaustionReason::EmptyAfterTransition;
                break;
            }
        }

        state = match pager.next_page(session, page).await {
            Transition::Moved(next) => PagerState::AtPage(next),
            Transition::Exhausted(why) => {
                reason = why;
                PagerState::Exhausted
            }
        };
    }

    Ok(PagedRun { records, pages, reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::browser::{ScriptedSession, elements_in};

    const URL: &str = "https://faq.example/board";
    const NEXT: &str = "nav.pagination button.navi.next";
    const TITLE: &str = "div.board_faq .faq_title";

    fn titles(html: &str, _page: u32) -> ExtractionResult<Vec<RawRecord>> {
        Ok(elements_in(html, ".faq_title")
            .into_iter()
            .map(|el| RawRecord::new(URL, el.text, "답변"))
            .collect())
    }

    fn jump_page(current: u32, items: &[&str]) -> String {
        let links: String = (1..=3).map(|n| format!("<a id='{n}'>{n}</a>")).collect();
        let body: String = items
            .iter()
            .map(|t| format!("<div class='board_faq'><div class='faq_title'>{t}</div></div>"))
            .collect();
        format!("<div id='pageingPosition'>{links}<a class='current'>{current}</a></div>{body}")
    }

    fn jump_pager(expand: Option<&str>) -> PageJumpPager {
        PageJumpPager::new(
            PageTotalSource::MaxNumericId {
                selector: "#pageingPosition a[id]".into(),
            },
            "goPage('statsList', 10, {page});",
            Some("#pageingPosition a.current".into()),
            "div.board_faq",
            expand.map(str::to_string),
            Duration::ZERO,
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn test_next_button_stops_when_disabled() -> anyhow::Result<()> {
        let page = |n: u32, disabled: &str| {
            format!(
                "<div class='result_area'><dl><dt class='faq_title'>질문 {n}</dt></dl></div>\
                 <nav class='pagination'><button class='navi next' {disabled}>다음</button></nav>"
            )
        };
        let mut session = ScriptedSession::new()
            .page(URL, page(1, ""))
            .page(URL, page(2, ""))
            .page(URL, page(3, "disabled"))
            .advance_on(NEXT);
        session.open(URL).await?;

        let mut pager = NextButtonPager::new(NEXT, "div.result_area dl", Duration::ZERO, Duration::from_millis(20));
        let run = collect_pages(&mut session, &mut pager, titles).await?;

        assert_eq!(run.pages, 3);
        assert_eq!(run.reason, ExhaustionReason::ControlUnavailable);
        let questions: Vec<&str> = run.records.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["질문 1", "질문 2", "질문 3"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_page_jump_reaches_total() -> anyhow::Result<()> {
        let mut session = ScriptedSession::new()
            .page(URL, jump_page(1, &["a1", "a2"]))
            .page(URL, jump_page(2, &["b1"]))
            .page(URL, jump_page(3, &["c1"]))
            .on_script("goPage('statsList', 10, 2);", 1)
            .on_script("goPage('statsList', 10, 3);", 2);
        session.open(URL).await?;

        let mut pager = jump_pager(None);
        let run = collect_pages(&mut session, &mut pager, titles).await?;

        assert_eq!(pager.total(), Some(3));
        assert_eq!(run.pages, 3);
        assert_eq!(run.records.len(), 4);
        assert_eq!(run.reason, ExhaustionReason::TotalReached);
        Ok(())
    }

    #[tokio::test]
    async fn test_page_jump_stops_on_empty_page() -> anyhow::Result<()> {
        let mut session = ScriptedSession::new()
            .page(URL, jump_page(1, &["a1"]))
            .page(URL, jump_page(2, &[]))
            .on_script("goPage('statsList', 10, 2);", 1);
        session.open(URL).await?;

        let run = collect_pages(&mut session, &mut jump_pager(None), titles).await?;
        assert_eq!(run.pages, 1);
        assert_eq!(run.reason, ExhaustionReason::EmptyAfterTransition);
        Ok(())
    }

    #[tokio::test]
    async fn test_expand_retries_stale_item_once() -> anyhow::Result<()> {
        let mut session = ScriptedSession::new()
            .page(URL, jump_page(1, &["a1", "a2"]))
            .stale_once(TITLE, 0);
        session.open(URL).await?;

        let opened = expand_all(&mut session, TITLE).await;
        assert_eq!(opened, 2);
        let clicks = session.journal().iter().filter(|e| e.starts_with("click")).count();
        assert_eq!(clicks, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_regex_total_reads_group_two() -> anyhow::Result<()> {
        let mut session = ScriptedSession::new()
            .page(URL, r#"<div data-bbssearch="page"><p>전체 31건, 페이지 1/4</p></div><ul><li>q</li></ul>"#);
        session.open(URL).await?;

        let mut pager = PageJumpPager::new(
            PageTotalSource::RegexText {
                selector: r#"div[data-bbssearch="page"] p"#.into(),
                pattern: r"페이지\s*(\d+)/(\d+)".into(),
            },
            "setPage({page});",
            None,
            "ul",
            None,
            Duration::ZERO,
            Duration::from_millis(5),
        );
        pager.prepare(&mut session).await;
        assert_eq!(pager.total(), Some(4));
        assert_eq!(pager.script_for(2), "setPage(2);");
        Ok(())
    }

    #[tokio::test]
    async fn test_first_page_error_is_returned() -> anyhow::Result<()> {
        let mut session = ScriptedSession::new().page(URL, "<p>maintenance</p>");
        session.open(URL).await?;
        let result = collect_pages(&mut session, &mut SinglePage, |_: &str, page: u32| {
            Err(ExtractionError::no_records("demo", page))
        })
        .await;
        assert!(matches!(result, Err(ExtractionError::NoRecords { .. })));
        Ok(())
    }
}

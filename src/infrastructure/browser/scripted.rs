//! In-memory browser session
//!
//! Serves pre-recorded HTML documents per URL. Clicks on registered "advance"
//! selectors and registered scripts move between documents, so pagers and
//! whole site pipelines can be exercised without a browser.

use super::{BrowserSession, elements_in};
use crate::infrastructure::parsing_error::InteractionError;
use anyhow::{Result, bail};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ScriptedSession {
    documents: HashMap<String, Vec<String>>,
    current_url: Option<String>,
    index: usize,
    advance_selectors: HashSet<String>,
    scripts: HashMap<String, usize>,
    stale_once: HashSet<(String, usize)>,
    download_dir: Option<PathBuf>,
    closed: bool,
    journal: Vec<String>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document to the sequence served for `url`
    #[must_use]
    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.documents.entry(url.to_string()).or_default().push(html.into());
        self
    }

    /// Clicking (or selecting on) this selector moves to the next document
    #[must_use]
    pub fn advance_on(mut self, selector: &str) -> Self {
        self.advance_selectors.insert(selector.to_string());
        self
    }

    /// Running exactly this script shows the document at `index` (0-based)
    #[must_use]
    pub fn on_script(mut self, script: &str, index: usize) -> Self {
        self.scripts.insert(script.to_string(), index);
        self
    }

    /// The first click on the `index`-th match of `selector` reports a stale element
    #[must_use]
    pub fn stale_once(mut self, selector: &str, index: usize) -> Self {
        self.stale_once.insert((selector.to_string(), index));
        self
    }

    /// Every action in order, e.g. `open https://..`, `click a.next#0`
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn download_dir(&self) -> Option<&Path> {
        self.download_dir.as_deref()
    }

    fn current_document(&self) -> Option<&String> {
        let url = self.current_url.as_ref()?;
        self.documents.get(url)?.get(self.index)
    }

    fn advance(&mut self) {
        let len = self
            .current_url
            .as_ref()
            .and_then(|url| self.documents.get(url))
            .map_or(0, Vec::len);
        if self.index + 1 < len {
            self.index += 1;
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            bail!("session already closed");
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.journal.push(format!("open {url}"));
        if !self.documents.contains_key(url) {
            bail!("no scripted document for {url}");
        }
        self.current_url = Some(url.to_string());
        self.index = 0;
        Ok(())
    }

    async fn settle(&mut self, duration: Duration) {
        self.journal.push(format!("settle {}ms", duration.as_millis()));
    }

    async fn snapshot(&mut self) -> Result<String> {
        self.ensure_open()?;
        match self.current_document() {
            Some(html) => Ok(html.clone()),
            None => bail!("no page loaded"),
        }
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), InteractionError> {
        self.journal.push(format!("click {selector}#{index}"));
        let html = self.current_document().ok_or(InteractionError::NotFound)?;
        if elements_in(html, selector).len() <= index {
            return Err(InteractionError::NotFound);
        }
        if self.stale_once.remove(&(selector.to_string(), index)) {
            return Err(InteractionError::Stale);
        }
        if self.advance_selectors.contains(selector) {
            self.advance();
        }
        Ok(())
    }

    async fn select_option(&mut self, selector: &str, option_index: usize) -> Result<(), InteractionError> {
        self.journal.push(format!("select {selector}#{option_index}"));
        let html = self.current_document().ok_or(InteractionError::NotFound)?;
        if elements_in(html, selector).is_empty() {
            return Err(InteractionError::NotFound);
        }
        if self.advance_selectors.contains(selector) {
            self.advance();
        }
        Ok(())
    }

    async fn run_script(&mut self, script: &str) -> Result<serde_json::Value> {
        self.ensure_open()?;
        self.journal.push(format!("script {script}"));
        if let Some(&target) = self.scripts.get(script) {
            self.index = target;
        }
        Ok(serde_json::Value::Null)
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.journal.push("scroll".to_string());
        Ok(())
    }

    async fn enable_downloads(&mut self, dir: &Path) -> Result<()> {
        self.journal.push(format!("downloads {}", dir.display()));
        self.download_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::browser::WaitCondition;

    const URL: &str = "https://faq.example/list";

    #[tokio::test]
    async fn test_advance_selector_walks_documents() -> Result<()> {
        let mut session = ScriptedSession::new()
            .page(URL, "<p>one</p><a class='next'>다음</a>")
            .page(URL, "<p>two</p>")
            .advance_on("a.next");

        session.open(URL).await?;
        session.click_nth("a.next", 0).await?;
        assert!(session.snapshot().await?.contains("two"));
        assert_eq!(session.click_nth("a.next", 0).await, Err(InteractionError::NotFound));
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_once_then_ok() -> Result<()> {
        let mut session = ScriptedSession::new().page(URL, "<li>a</li><li>b</li>").stale_once("li", 1);
        session.open(URL).await?;
        assert_eq!(session.click_nth("li", 1).await, Err(InteractionError::Stale));
        assert_eq!(session.click_nth("li", 1).await, Ok(()));
        Ok(())
    }

    #[tokio::test]
    async fn test_script_jump_and_wait() -> Result<()> {
        let mut session = ScriptedSession::new()
            .page(URL, "<a class='current'>1</a>")
            .page(URL, "<a class='current'>2</a>")
            .on_script("setPage(2);", 1);
        session.open(URL).await?;
        session.run_script("setPage(2);").await?;
        let reached = session
            .wait_for(&WaitCondition::text_equals("a.current", 2), Duration::from_millis(5))
            .await;
        assert!(reached);
        Ok(())
    }

    #[tokio::test]
    async fn test_closed_session_rejects_work() -> Result<()> {
        let mut session = ScriptedSession::new().page(URL, "<p/>");
        session.close().await?;
        assert!(session.open(URL).await.is_err());
        assert!(session.is_closed());
        Ok(())
    }
}

//! Browser automation session
//!
//! The pipelines drive pages through [`BrowserSession`]. Element lookups never
//! fail the step: an unreachable page or a bad selector yields an empty list.
//!
//! - [`chromium::ChromiumSession`]: headless Chrome over CDP
//! - [`scripted::ScriptedSession`]: in-memory page sequences for tests

pub mod chromium;
pub mod scripted;

pub use chromium::{ChromiumSession, find_chromium};
pub use scripted::ScriptedSession;

use crate::infrastructure::parsing::text_compact;
use crate::infrastructure::parsing_error::InteractionError;
use anyhow::Result;
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Detached copy of a rendered element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    pub tag: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    /// `disabled` attribute or class
    pub fn is_disabled(&self) -> bool {
        self.attributes.contains_key("disabled") || self.has_class("disabled")
    }
}

/// Explicit-wait predicate evaluated against a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    Present(String),
    TextEquals { selector: String, expected: String },
}

impl WaitCondition {
    pub fn present(selector: &str) -> Self {
        Self::Present(selector.to_string())
    }

    pub fn text_equals(selector: &str, expected: impl ToString) -> Self {
        Self::TextEquals {
            selector: selector.to_string(),
            expected: expected.to_string(),
        }
    }

    pub fn is_met(&self, html: &str) -> bool {
        match self {
            Self::Present(selector) => !elements_in(html, selector).is_empty(),
            Self::TextEquals { selector, expected } => elements_in(html, selector)
                .first()
                .is_some_and(|el| el.text.trim() == expected),
        }
    }
}

/// All elements matching `selector`, in document order
pub fn elements_in(html: &str, selector: &str) -> Vec<ElementData> {
    let selector = match Selector::parse(selector) {
        Ok(sel) => sel,
        Err(e) => {
            warn!("Invalid selector '{}': {}", selector, e);
            return Vec::new();
        }
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .map(|el| ElementData {
            tag: el.value().name().to_string(),
            text: text_compact(el),
            attributes: el
                .value()
                .attrs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
        .collect()
}

/// One page-driving browser session, exclusively owned by the run loop
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the load event (bounded)
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Fixed render delay
    async fn settle(&mut self, duration: Duration);

    /// Current DOM serialized as HTML
    async fn snapshot(&mut self) -> Result<String>;

    /// Dispatch a click on the `index`-th match of `selector`, looked up afresh
    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), InteractionError>;

    /// Set `selectedIndex` on a `<select>` and fire `change`
    async fn select_option(&mut self, selector: &str, option_index: usize) -> Result<(), InteractionError>;

    async fn run_script(&mut self, script: &str) -> Result<serde_json::Value>;

    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Accept downloads into `dir`
    async fn enable_downloads(&mut self, dir: &Path) -> Result<()>;

    /// Release the browser. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(250)
    }

    async fn find_all(&mut self, selector: &str) -> Vec<ElementData> {
        match self.snapshot().await {
            Ok(html) => elements_in(&html, selector),
            Err(e) => {
                warn!("Snapshot failed while looking up '{}': {}", selector, e);
                Vec::new()
            }
        }
    }

    /// Poll until `condition` holds or `timeout` elapses
    async fn wait_for(&mut self, condition: &WaitCondition, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(html) = self.snapshot().await {
                if condition.is_met(&html) {
                    return true;
                }
            }
            if Instant::now() >= deadline {
                debug!("Wait timed out after {:?}: {:?}", timeout, condition);
                return false;
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }
}

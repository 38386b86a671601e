//! Chromium-backed session using chromiumoxide.

use super::BrowserSession;
use crate::infrastructure::config::BrowserConfig as SessionConfig;
use crate::infrastructure::parsing_error::{ExtractionError, InteractionError};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{SetDownloadBehaviorBehavior, SetDownloadBehaviorParams};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Find the Chrome/Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. CHROME_PATH env
    if let Ok(p) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Chrome for Testing under the home directory
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".cache/chrome/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".cache/chrome/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
            ]
        } else {
            vec![
                home.join(".cache/chrome/chrome-linux64/chrome"),
                home.join(".cache/chrome/chrome"),
            ]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    // 3. System PATH
    ["google-chrome", "chromium", "chromium-browser"]
        .into_iter()
        .find_map(|name| which::which(name).ok())
}

/// Headless Chrome session with one working tab
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
    poll_interval: Duration,
}

impl ChromiumSession {
    /// Launch the browser. A failure here is a session lifecycle failure.
    pub async fn launch(config: &SessionConfig) -> Result<Self, ExtractionError> {
        let chrome_path = config
            .executable
            .clone()
            .or_else(find_chromium)
            .ok_or_else(|| ExtractionError::session("Chrome/Chromium not found (set CHROME_PATH)"))?;

        let (width, height) = config.window_size;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&chrome_path)
            .window_size(width, height)
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--lang=ko-KR");
        builder = if config.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let browser_config = builder
            .build()
            .map_err(|e| ExtractionError::session(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ExtractionError::session(format!("failed to launch {}: {e}", chrome_path.display())))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(ExtractionError::session(format!("failed to open tab: {e}")));
            }
        };

        info!("🌐 Browser session started: {}", chrome_path.display());
        Ok(Self {
            browser: Some(browser),
            page,
            handler,
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    async fn eval_string(&self, script: &str) -> Result<String> {
        self.page
            .evaluate(script)
            .await
            .context("JS execution failed")?
            .into_value::<String>()
            .map_err(|e| anyhow!("failed to convert JS result: {e:?}"))
    }

    /// Run a DOM action that reports "ok", "missing" or "stale"
    async fn dom_action(&self, script: String) -> Result<(), InteractionError> {
        match self.eval_string(&script).await {
            Ok(status) => match status.as_str() {
                "ok" => Ok(()),
                "missing" => Err(InteractionError::NotFound),
                "stale" => Err(InteractionError::Stale),
                other => Err(InteractionError::Script(format!("unexpected status '{other}'"))),
            },
            Err(e) => Err(InteractionError::Script(e.to_string())),
        }
    }
}

/// Follow-up navigation bounded by `limit`. Returns whether it settled in time.
async fn await_redirect<F, T, E>(limit: Duration, navigation: F) -> bool
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(limit, navigation).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("Follow-up navigation failed: {}", e);
            false
        }
        Err(_) => {
            debug!("No follow-up navigation within {:?}", limit);
            false
        }
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        let result = tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await;
        match result {
            Ok(Ok(_)) => {
                // goto already awaited the load event; a second wait only matters for redirects
                await_redirect(self.navigation_timeout, self.page.wait_for_navigation()).await;
                Ok(())
            }
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!("navigation to {url} timed out after {:?}", self.navigation_timeout),
        }
    }

    async fn settle(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn snapshot(&mut self) -> Result<String> {
        self.eval_string("document.documentElement.outerHTML")
            .await
            .context("failed to get HTML")
    }

    async fn click_nth(&mut self, selector: &str, index: usize) -> Result<(), InteractionError> {
        let script = format!(
            "(() => {{ const el = document.querySelectorAll({sel})[{index}]; \
             if (!el) return 'missing'; if (!el.isConnected) return 'stale'; \
             el.scrollIntoView({{block: 'center'}}); el.click(); return 'ok'; }})()",
            sel = js_string(selector),
        );
        self.dom_action(script).await
    }

    async fn select_option(&mut self, selector: &str, option_index: usize) -> Result<(), InteractionError> {
        let script = format!(
            "(() => {{ const s = document.querySelector({sel}); if (!s) return 'missing'; \
             if (s.options.length <= {option_index}) return 'missing'; \
             s.selectedIndex = {option_index}; s.dispatchEvent(new Event('change', {{bubbles: true}})); return 'ok'; }})()",
            sel = js_string(selector),
        );
        self.dom_action(script).await
    }

    async fn run_script(&mut self, script: &str) -> Result<serde_json::Value> {
        let result = self.page.evaluate(script).await.context("JS execution failed")?;
        // scripts like `setPage(2);` evaluate to undefined
        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .context("scroll failed")?;
        Ok(())
    }

    async fn enable_downloads(&mut self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create download dir {}", dir.display()))?;
        let absolute = std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf());
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(absolute.to_string_lossy().to_string())
            .build()
            .map_err(|e| anyhow!("invalid download behavior: {e}"))?;
        let browser = self.browser.as_ref().context("browser already closed")?;
        browser.execute(params).await.context("Browser.setDownloadBehavior failed")?;
        info!("📁 Downloads enabled into {}", absolute.display());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        if let Err(e) = browser.close().await {
            warn!("Browser close command failed: {}", e);
        }
        if let Err(e) = browser.wait().await {
            warn!("Browser process wait failed: {}", e);
        }
        self.handler.abort();
        info!("🌐 Browser session closed");
        Ok(())
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser's own Drop kills the child process
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes_quotes() {
        assert_eq!(js_string(r#"div[data-bbslist="faq"] > ul > li"#), r#""div[data-bbslist=\"faq\"] > ul > li""#);
    }

    #[tokio::test]
    async fn test_redirect_wait_is_bounded() {
        let never = std::future::pending::<Result<(), String>>();
        let started = std::time::Instant::now();
        assert!(!await_redirect(Duration::from_millis(20), never).await);
        assert!(started.elapsed() < Duration::from_secs(5));

        assert!(await_redirect(Duration::from_millis(20), async { Ok::<_, String>(()) }).await);
        assert!(!await_redirect(Duration::from_millis(20), async { Err::<(), _>("net::ERR_ABORTED".to_string()) }).await);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_session_round_trip() -> Result<()> {
        let mut session = ChromiumSession::launch(&SessionConfig::default()).await?;
        session.open("data:text/html,<ul><li>하나</li><li>둘</li></ul>").await?;
        let items = session.find_all("li").await;
        assert_eq!(items.len(), 2);
        assert!(matches!(session.click_nth("li", 5).await, Err(InteractionError::NotFound)));
        session.close().await?;
        Ok(())
    }
}

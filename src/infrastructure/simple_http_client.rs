//! HTTP client for static assets
//!
//! Pages are rendered by the browser session; this client only fetches plain
//! resources such as model images, with a status-aware retry policy.

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, ClientBuilder, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Configuration for HTTP client behavior
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Maximum number of attempts for a request
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_retries: 3,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .gzip(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client, config })
    }

    /// GET with retries on network errors and transient statuses
    pub async fn fetch_bytes_with_policy(&self, url: &str) -> Result<Vec<u8>> {
        let mut last_err: Option<anyhow::Error> = None;

        for attempt in 1..=self.config.max_retries.max(1) {
            debug!("🌐 HTTP GET (attempt {}/{}) : {}", attempt, self.config.max_retries, url);
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp.bytes().await.context("Failed to read response body")?.to_vec());
                    }

                    let retryable = matches!(
                        status,
                        StatusCode::REQUEST_TIMEOUT
                            | StatusCode::TOO_MANY_REQUESTS
                            | StatusCode::BAD_GATEWAY
                            | StatusCode::SERVICE_UNAVAILABLE
                            | StatusCode::GATEWAY_TIMEOUT
                            | StatusCode::INTERNAL_SERVER_ERROR
                    );
                    error!("❌ HTTP error {} on attempt {}: {}", status, attempt, url);

                    if !retryable || attempt >= self.config.max_retries {
                        return Err(anyhow!("HTTP error {}: {}", status, url));
                    }
                    // Respect Retry-After if present on 429/503
                    let mut delay_secs = 2_u64.pow(attempt - 1);
                    if let Some(parsed) = resp
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                    {
                        delay_secs = parsed.max(delay_secs);
                    }
                    sleep(Duration::from_secs(delay_secs)).await;
                }
                Err(e) => {
                    warn!("⚠️ Network error on attempt {}: {}", attempt, e);
                    last_err = Some(anyhow!("HTTP request failed: {}", e));
                    if attempt < self.config.max_retries {
                        sleep(Duration::from_secs(2_u64.pow(attempt - 1))).await;
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Unknown HTTP error for {}", url)))
    }

    /// Save an image as `<dir>/<stem>.<ext>` and return the written path
    pub async fn download_image(&self, url: &str, dir: &Path, stem: &str) -> Result<PathBuf> {
        let url = absolute_image_url(url);
        let bytes = self.fetch_bytes_with_policy(&url).await?;

        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create image dir {}", dir.display()))?;
        let path = dir.join(format!("{}.{}", stem, image_extension(&url)));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("🖼️ Saved image {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }
}

/// Protocol-relative links (`//img.danawa.com/..`) get https
pub fn absolute_image_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{url}")
    } else {
        url.to_string()
    }
}

/// Extension taken from the URL path when it is a known image type, else png
pub fn image_extension(url: &str) -> &'static str {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split('?').next().unwrap_or_default().to_string());
    let ext = path.rsplit('.').next().unwrap_or_default().to_lowercase();
    IMAGE_EXTENSIONS
        .into_iter()
        .find(|known| *known == ext)
        .unwrap_or("png")
}

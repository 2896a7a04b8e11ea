use crate::config::ScraperConfig;
use crate::scraper::ScrapeError;
use anyhow::{Context, Result};
use rand::Rng;
use reqwest::cookie::Jar;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// One browsing session against the fixtures site.
///
/// The site keeps the selected season in server-side session state keyed by
/// cookie, so every request of a crawl must go through the same jar. Clones
/// share that jar.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: ScraperConfig,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .cookie_provider(jar)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            config: config.clone(),
        })
    }

    /// Fetch a URL as text. No retries: a failure skips the caller's branch.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        self.polite_delay().await;
        debug!("GET {}", url);

        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request failed: GET {}", url))?;

        Self::read_body(resp, url).await
    }

    /// Submit an `application/x-www-form-urlencoded` postback.
    pub async fn post_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<String> {
        self.polite_delay().await;
        debug!("POST {} ({} fields)", url, fields.len());

        let resp = self
            .inner
            .post(url)
            .form(fields)
            .send()
            .await
            .with_context(|| format!("Request failed: POST {}", url))?;

        Self::read_body(resp, url).await
    }

    async fn read_body(resp: reqwest::Response, url: &str) -> Result<String> {
        let status = resp.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        resp.text().await.context("Failed to read response body")
    }

    /// Sleep for the configured delay + random jitter.
    async fn polite_delay(&self) {
        let jitter = if self.config.jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.jitter_ms)
        } else {
            0
        };
        let total = Duration::from_millis(self.config.request_delay_ms + jitter);
        if !total.is_zero() {
            sleep(total).await;
        }
    }
}

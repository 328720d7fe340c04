//! URL content fetching for `ingest` requests that carry a `url`.
//!
//! The pipeline only ever sees plain text; this module turns a web page
//! into that text plus `title`/`url` metadata.

use super::chunker::clean_text;
use crate::types::{AppError, Result};
use crate::utils::toml_config::FetchConfig;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

/// Text extracted from a fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedContent {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent>;
}

/// reqwest + scraper implementation.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AppError::InvalidInput(format!("invalid url '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::InvalidInput(format!(
                "unsupported url scheme '{}'",
                parsed.scheme()
            )));
        }

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("{} returned {}", url, status)));
        }
        if let Some(len) = response.content_length() {
            if len as usize > self.max_bytes {
                return Err(AppError::Fetch(format!(
                    "{} is {} bytes, limit is {}",
                    url, len, self.max_bytes
                )));
            }
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        // Content-Length is optional; enforce the limit while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::Fetch(format!("reading {} failed: {}", url, e)))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(AppError::Fetch(format!(
                    "{} exceeds the {} byte limit",
                    url, self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&bytes);

        let (title, text) = if is_html {
            extract_html(&body)
        } else {
            (None, clean_text(&body))
        };
        debug!(url, title = ?title, chars = text.chars().count(), "Fetched page");

        if text.is_empty() {
            return Err(AppError::Fetch(format!("{} has no extractable text", url)));
        }

        Ok(FetchedContent {
            url: url.to_string(),
            title,
            text,
        })
    }
}

/// Title and visible text of an HTML page, ignoring script and style content.
pub fn extract_html(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|t| clean_text(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    });

    let mut raw = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .map(|e| matches!(e.name(), "script" | "style" | "noscript" | "head"))
                .unwrap_or(false)
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }

    (title, clean_text(&raw))
}

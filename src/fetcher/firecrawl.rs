//! HTTP client for a self-hosted Firecrawl-style crawl service.
//!
//! `POST {base_url}/crawl` with `{"url": ..., "extraction_rules": {...}}`
//! answers `{"content": "..."}`.

use super::{ContentFetcher, ExtractionRules};
use crate::config::FetcherConfig;
use crate::error::FetchError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct CrawlRequest<'a> {
    url: &'a str,
    extraction_rules: &'a ExtractionRules,
}

#[derive(Debug, Deserialize)]
struct CrawlResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Fetcher backed by the crawl service.
pub struct FirecrawlFetcher {
    http_client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout_seconds: u64,
    default_rules: ExtractionRules,
}

impl FirecrawlFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        info!("Initializing fetcher for crawl service at {}", config.base_url);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client for the crawl service")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout_seconds: config.timeout_seconds,
            default_rules: ExtractionRules::default(),
        })
    }
}

#[async_trait]
impl ContentFetcher for FirecrawlFetcher {
    async fn fetch(
        &self,
        target: &str,
        rules: Option<&ExtractionRules>,
    ) -> Result<String, FetchError> {
        validate_target(target)?;

        let endpoint = format!("{}/crawl", self.base_url);
        let body = CrawlRequest {
            url: target,
            extraction_rules: rules.unwrap_or(&self.default_rules),
        };

        debug!(url = target, "Requesting crawl");

        let mut request = self.http_client.post(&endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    target: target.to_string(),
                }
            } else if e.is_connect() {
                FetchError::Http {
                    target: target.to_string(),
                    status: None,
                    message: format!("cannot connect to crawl service at {}", self.base_url),
                }
            } else {
                FetchError::Http {
                    target: target.to_string(),
                    status: e.status().map(|s| s.as_u16()),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(target, status.as_u16(), body));
        }

        let parsed: CrawlResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    target: target.to_string(),
                }
            } else {
                debug!(url = target, error = %e, "Unreadable crawl response");
                FetchError::Empty {
                    target: target.to_string(),
                }
            }
        })?;

        let content = parsed.content.ok_or_else(|| FetchError::Empty {
            target: target.to_string(),
        })?;

        debug!(
            url = target,
            bytes = content.len(),
            timeout_seconds = self.timeout_seconds,
            "Fetched content"
        );
        Ok(content)
    }
}

/// Only absolute http(s) URLs are accepted.
fn validate_target(target: &str) -> Result<(), FetchError> {
    let parsed = url::Url::parse(target).map_err(|e| FetchError::InvalidTarget {
        target: target.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::InvalidTarget {
            target: target.to_string(),
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}

/// Map a non-success status from the crawl service to a fetch error.
fn error_for_status(target: &str, status: u16, body: String) -> FetchError {
    let message = if body.trim().is_empty() {
        "no response body".to_string()
    } else {
        body.chars().take(200).collect()
    };

    match status {
        403 | 451 => FetchError::Blocked {
            target: target.to_string(),
            message,
        },
        408 | 504 => FetchError::Timeout {
            target: target.to_string(),
        },
        _ => FetchError::Http {
            target: target.to_string(),
            status: Some(status),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Retryable;

    #[test]
    fn test_validate_target() {
        assert!(validate_target("https://www.reuters.com/search/news?blob=acme").is_ok());
        assert!(matches!(
            validate_target("www.acme.com"),
            Err(FetchError::InvalidTarget { .. })
        ));
        assert!(matches!(
            validate_target("ftp://acme.com/file"),
            Err(FetchError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_error_for_status() {
        let blocked = error_for_status("https://a", 403, "captcha".to_string());
        assert!(matches!(blocked, FetchError::Blocked { .. }));
        assert!(!blocked.is_retryable());

        let gateway = error_for_status("https://a", 504, String::new());
        assert!(matches!(gateway, FetchError::Timeout { .. }));

        let throttled = error_for_status("https://a", 429, String::new());
        assert!(throttled.is_retryable());

        let long_body = "x".repeat(1000);
        match error_for_status("https://a", 500, long_body) {
            FetchError::Http { message, status, .. } => {
                assert_eq!(status, Some(500));
                assert_eq!(message.len(), 200);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let rules = ExtractionRules::default();
        let body = CrawlRequest {
            url: "https://www.acme.com",
            extraction_rules: &rules,
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["url"], "https://www.acme.com");
        assert_eq!(json["extraction_rules"]["extract"], "text");
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = FetcherConfig {
            base_url: "http://localhost:3000/".to_string(),
            ..FetcherConfig::default()
        };
        let fetcher = FirecrawlFetcher::new(&config).unwrap();
        assert_eq!(fetcher.base_url, "http://localhost:3000");
    }
}

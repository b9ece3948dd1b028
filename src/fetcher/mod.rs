//! Content fetching capability.
//!
//! The crawl service itself (rendering, its own retries, auth) is opaque;
//! this module only defines the boundary and an HTTP client for it.

pub mod firecrawl;

pub use firecrawl::FirecrawlFetcher;

use crate::error::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which representation of the page the crawl service should return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    #[default]
    Text,
    Html,
}

/// Rules controlling which subset of a page is returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRules {
    pub extract: ExtractMode,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selectors: Vec<String>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            extract: ExtractMode::Text,
            include_tags: strings(&["p", "h1", "h2", "h3", "h4", "h5", "h6", "span", "div"]),
            exclude_tags: strings(&["script", "style", "nav", "footer", "header"]),
            selectors: Vec::new(),
        }
    }
}

impl ExtractionRules {
    /// Text extraction limited to the given tags and CSS selectors.
    pub fn text(include_tags: &[&str], exclude_tags: &[&str], selectors: &[&str]) -> Self {
        Self {
            extract: ExtractMode::Text,
            include_tags: strings(include_tags),
            exclude_tags: strings(exclude_tags),
            selectors: strings(selectors),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Returns page content for a URL.
///
/// An `Ok` with empty content is a valid degraded outcome, not an error.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, target: &str, rules: Option<&ExtractionRules>)
        -> Result<String, FetchError>;
}

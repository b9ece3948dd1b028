//! Per-kind source plans: which targets to fetch and how to analyze them.

use crate::analyzer::AnalysisType;
use crate::fetcher::ExtractionRules;
use crate::models::{MonitoringRequest, SourceKind};
use url::form_urlencoded::byte_serialize;

/// One URL to fetch for a source kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTarget {
    pub label: String,
    pub target: String,
    pub rules: Option<ExtractionRules>,
}

impl SourceTarget {
    /// Target labelled with its host name.
    fn by_host(target: String) -> Self {
        Self {
            label: host_label(&target),
            target,
            rules: None,
        }
    }
}

/// Targets for `kind`, in priority order.
pub fn plan(kind: SourceKind, request: &MonitoringRequest) -> Vec<SourceTarget> {
    let company = request.company_name();

    match kind {
        SourceKind::Reviews => {
            let query = match request.location() {
                Some(location) => format!("{} reviews {}", company, location),
                None => format!("{} reviews", company),
            };
            vec![SourceTarget {
                label: "Google Reviews".to_string(),
                target: format!("https://www.google.com/search?q={}", encode(&query)),
                rules: Some(ExtractionRules::text(
                    &["div", "span", "p"],
                    &["script", "style", "nav", "footer"],
                    &[".review-dialog", ".review-snippet", ".review-text"],
                )),
            }]
        }
        SourceKind::News => vec![
            SourceTarget::by_host(format!(
                "https://news.google.com/search?q={}",
                encode(company)
            )),
            SourceTarget::by_host(format!(
                "https://finance.yahoo.com/quote/{}",
                encode(&company.replace(' ', ""))
            )),
            SourceTarget::by_host(format!(
                "https://www.reuters.com/search/news?blob={}",
                encode(company)
            )),
        ],
        SourceKind::Social => vec![
            SourceTarget::by_host(format!("https://twitter.com/search?q={}", encode(company))),
            SourceTarget::by_host(format!(
                "https://www.linkedin.com/search/results/companies/?keywords={}",
                encode(company)
            )),
        ],
        SourceKind::Website => vec![SourceTarget {
            label: "Company Website".to_string(),
            target: website_url(request),
            rules: None,
        }],
    }
}

/// Analysis template applied to every target of `kind`.
pub fn analysis_type(kind: SourceKind) -> AnalysisType {
    match kind {
        SourceKind::Reviews => AnalysisType::Reviews,
        SourceKind::News => AnalysisType::News,
        SourceKind::Social => AnalysisType::Sentiment,
        SourceKind::Website => AnalysisType::Financial,
    }
}

/// The supplied website, or a guess derived from the company name.
fn website_url(request: &MonitoringRequest) -> String {
    match request.website() {
        Some(site) if site.contains("://") => site.to_string(),
        Some(site) => format!("https://{}", site),
        None => {
            let slug: String = request
                .company_name()
                .to_lowercase()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            format!("https://www.{}.com", slug)
        }
    }
}

fn encode(query: &str) -> String {
    byte_serialize(query.as_bytes()).collect()
}

fn host_label(target: &str) -> String {
    url::Url::parse(target)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| target.to_string())
}

//! Data models for company monitoring.
//!
//! This module contains the value objects produced by one monitoring run:
//! the request, per-source results, the cross-source summary and the
//! aggregated report. All of them are built once and never mutated after
//! the run hands them out.

use crate::error::RequestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Input to one monitoring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoringRequest {
    company_name: String,
    location: Option<String>,
    website: Option<String>,
}

impl MonitoringRequest {
    /// Build a request, rejecting a blank company name.
    ///
    /// Blank optional fields are normalised to `None`.
    pub fn new(
        company_name: impl Into<String>,
        location: Option<String>,
        website: Option<String>,
    ) -> Result<Self, RequestError> {
        let company_name = company_name.into().trim().to_string();
        if company_name.is_empty() {
            return Err(RequestError::EmptyCompanyName);
        }

        Ok(Self {
            company_name,
            location: non_blank(location),
            website: non_blank(website),
        })
    }

    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The fixed monitoring categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Reviews,
    News,
    Social,
    Website,
}

impl SourceKind {
    /// Every source kind, in report order.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Reviews,
        SourceKind::News,
        SourceKind::Social,
        SourceKind::Website,
    ];

    /// Whether this kind fans out to several targets per company.
    pub fn is_multi_item(&self) -> bool {
        matches!(self, SourceKind::News | SourceKind::Social)
    }

    /// Human-readable heading used in reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceKind::Reviews => "Customer Reviews",
            SourceKind::News => "News Coverage",
            SourceKind::Social => "Social Media",
            SourceKind::Website => "Company Website",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Reviews => write!(f, "reviews"),
            SourceKind::News => write!(f, "news"),
            SourceKind::Social => write!(f, "social"),
            SourceKind::Website => write!(f, "website"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reviews" | "review" => Ok(SourceKind::Reviews),
            "news" => Ok(SourceKind::News),
            "social" | "social_media" | "social-media" => Ok(SourceKind::Social),
            "website" | "site" => Ok(SourceKind::Website),
            other => Err(format!("unknown source kind: {}", other)),
        }
    }
}

/// Outcome of monitoring one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Fetched and analyzed.
    Ok,
    /// Fetched, but the content was empty or the analysis failed.
    Partial,
    /// Nothing usable could be fetched.
    Failed,
}

impl SourceStatus {
    pub fn emoji(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "✅",
            SourceStatus::Partial => "⚠️",
            SourceStatus::Failed => "❌",
        }
    }

    /// User-facing wording for the status.
    pub fn describe(&self) -> &'static str {
        match self {
            SourceStatus::Ok => "analyzed successfully",
            SourceStatus::Partial => "fetched but analysis degraded",
            SourceStatus::Failed => "unavailable",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Ok => write!(f, "ok"),
            SourceStatus::Partial => write!(f, "partial"),
            SourceStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of monitoring a single target of a source kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    /// Which source kind produced this result.
    pub kind: SourceKind,
    /// Human-readable label, e.g. "Google Reviews" or "www.reuters.com".
    pub label: String,
    /// URL or query that was fetched.
    pub origin: String,
    /// Excerpt of the fetched content (empty when nothing was fetched).
    pub raw_content: String,
    /// Model analysis of the content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    /// Outcome status.
    pub status: SourceStatus,
    /// Reason for a partial or failed outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResult {
    /// A fully analyzed result.
    pub fn ok(
        kind: SourceKind,
        label: impl Into<String>,
        origin: impl Into<String>,
        raw_content: String,
        analysis: String,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            origin: origin.into(),
            raw_content,
            analysis: Some(analysis),
            status: SourceStatus::Ok,
            error: None,
        }
    }

    /// Content was fetched but could not be analyzed.
    pub fn partial(
        kind: SourceKind,
        label: impl Into<String>,
        origin: impl Into<String>,
        raw_content: String,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            origin: origin.into(),
            raw_content,
            analysis: None,
            status: SourceStatus::Partial,
            error: Some(reason.into()),
        }
    }

    /// Nothing could be fetched.
    pub fn failed(
        kind: SourceKind,
        label: impl Into<String>,
        origin: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            origin: origin.into(),
            raw_content: String::new(),
            analysis: None,
            status: SourceStatus::Failed,
            error: Some(reason.into()),
        }
    }
}

/// Everything one source kind produced during a run.
///
/// Singular kinds (reviews, website) hold exactly one result; multi-item
/// kinds (news, social) hold one result per target in construction order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceOutcome {
    Single(SourceResult),
    Multi(Vec<SourceResult>),
}

impl SourceOutcome {
    /// All results of this outcome, in order.
    pub fn results(&self) -> &[SourceResult] {
        match self {
            SourceOutcome::Single(result) => std::slice::from_ref(result),
            SourceOutcome::Multi(results) => results,
        }
    }

    /// Overall status: ok when every result is ok, failed when every result
    /// failed, partial otherwise.
    pub fn status(&self) -> SourceStatus {
        let results = self.results();
        if results.is_empty() || results.iter().all(|r| r.status == SourceStatus::Failed) {
            SourceStatus::Failed
        } else if results.iter().all(|r| r.status == SourceStatus::Ok) {
            SourceStatus::Ok
        } else {
            SourceStatus::Partial
        }
    }
}

/// Overall lending risk rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskRating {
    Low,
    Medium,
    High,
}

impl RiskRating {
    pub fn emoji(&self) -> &'static str {
        match self {
            RiskRating::Low => "🟢",
            RiskRating::Medium => "🟡",
            RiskRating::High => "🔴",
        }
    }
}

impl fmt::Display for RiskRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskRating::Low => write!(f, "Low"),
            RiskRating::Medium => write!(f, "Medium"),
            RiskRating::High => write!(f, "High"),
        }
    }
}

impl FromStr for RiskRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(RiskRating::Low),
            "medium" | "moderate" => Ok(RiskRating::Medium),
            "high" => Ok(RiskRating::High),
            other => Err(format!("unknown risk rating: {}", other)),
        }
    }
}

/// Severity of an individual risk factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "Low"),
            Severity::Medium => write!(f, "Medium"),
            Severity::High => write!(f, "High"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl Severity {
    /// Returns an emoji representation of the severity.
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Low => "🟢",
            Severity::Medium => "🟡",
            Severity::High => "🟠",
            Severity::Critical => "🔴",
        }
    }

    /// Lenient parse of model output; anything unrecognised is Medium.
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "critical" | "severe" => Severity::Critical,
            "high" => Severity::High,
            "low" | "minor" => Severity::Low,
            _ => Severity::Medium,
        }
    }
}

/// One risk factor from the summary analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub severity: Severity,
    pub description: String,
}

/// Suggested lending terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedTerms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub covenants: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collateral: Option<String>,
}

impl RecommendedTerms {
    /// Standard terms for a risk rating.
    pub fn template_for(rating: RiskRating) -> Self {
        let (rate, term, covenants, collateral) = match rating {
            RiskRating::Low => (
                "Prime + 1.5%",
                "5-7 years",
                "Annual financial reporting",
                "General business assets",
            ),
            RiskRating::Medium => (
                "Prime + 2.5%",
                "3-5 years",
                "Quarterly financial reporting",
                "Accounts receivable and inventory",
            ),
            RiskRating::High => (
                "Prime + 4.0%",
                "1-3 years",
                "Monthly financial reporting",
                "All business assets",
            ),
        };

        Self {
            rate: Some(rate.to_string()),
            term: Some(term.to_string()),
            covenants: Some(covenants.to_string()),
            collateral: Some(collateral.to_string()),
        }
    }

    /// Fill any field the model left out from the rating's template.
    pub fn or_template(self, rating: RiskRating) -> Self {
        let template = Self::template_for(rating);
        Self {
            rate: non_blank(self.rate).or(template.rate),
            term: non_blank(self.term).or(template.term),
            covenants: non_blank(self.covenants).or(template.covenants),
            collateral: non_blank(self.collateral).or(template.collateral),
        }
    }
}

/// Cross-source lending assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryAnalysis {
    pub risk_rating: RiskRating,
    pub key_risk_factors: Vec<RiskFactor>,
    pub mitigating_factors: Vec<String>,
    pub recommended_terms: RecommendedTerms,
    pub monitoring_recommendations: Vec<String>,
    /// The model's response as returned.
    pub narrative: String,
}

/// Counts of source results by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTally {
    pub total: usize,
    pub ok: usize,
    pub partial: usize,
    pub failed: usize,
}

impl SourceTally {
    /// Creates a tally from a list of results.
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a SourceResult>) -> Self {
        let mut tally = Self::default();

        for result in results {
            tally.total += 1;
            match result.status {
                SourceStatus::Ok => tally.ok += 1,
                SourceStatus::Partial => tally.partial += 1,
                SourceStatus::Failed => tally.failed += 1,
            }
        }

        tally
    }
}

/// The aggregated report of one monitoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub company_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// When the run started.
    pub run_at: DateTime<Utc>,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
    /// One entry per configured source kind.
    pub sources: BTreeMap<SourceKind, SourceOutcome>,
    /// Cross-source assessment, absent when the summary step failed.
    pub summary: Option<SummaryAnalysis>,
    /// Why the summary is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
}

impl MonitoringReport {
    /// Tally of every source result in the report.
    pub fn tally(&self) -> SourceTally {
        SourceTally::from_results(self.sources.values().flat_map(|o| o.results()))
    }

    /// Risk rating, when a summary is available.
    pub fn risk_rating(&self) -> Option<RiskRating> {
        self.summary.as_ref().map(|s| s.risk_rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status: SourceStatus) -> SourceResult {
        SourceResult {
            kind: SourceKind::News,
            label: "www.reuters.com".to_string(),
            origin: "https://www.reuters.com".to_string(),
            raw_content: String::new(),
            analysis: None,
            status,
            error: None,
        }
    }

    #[test]
    fn test_request_rejects_blank_company() {
        assert!(MonitoringRequest::new("   ", None, None).is_err());

        let request =
            MonitoringRequest::new(" Acme Corp ", Some(" ".to_string()), None).unwrap();
        assert_eq!(request.company_name(), "Acme Corp");
        assert_eq!(request.location(), None);
    }

    #[test]
    fn test_source_kind_parse_and_display() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.to_string().parse::<SourceKind>(), Ok(kind));
        }
        assert_eq!("social-media".parse::<SourceKind>(), Ok(SourceKind::Social));
        assert!("forums".parse::<SourceKind>().is_err());
        assert!(SourceKind::News.is_multi_item());
        assert!(!SourceKind::Website.is_multi_item());
    }

    #[test]
    fn test_outcome_status() {
        let all_ok = SourceOutcome::Multi(vec![result(SourceStatus::Ok), result(SourceStatus::Ok)]);
        assert_eq!(all_ok.status(), SourceStatus::Ok);

        let mixed = SourceOutcome::Multi(vec![
            result(SourceStatus::Ok),
            result(SourceStatus::Failed),
        ]);
        assert_eq!(mixed.status(), SourceStatus::Partial);

        let dead = SourceOutcome::Single(result(SourceStatus::Failed));
        assert_eq!(dead.status(), SourceStatus::Failed);
        assert_eq!(dead.results().len(), 1);
    }

    #[test]
    fn test_risk_rating_ordering_and_parse() {
        assert!(RiskRating::Low < RiskRating::Medium);
        assert!(RiskRating::Medium < RiskRating::High);
        assert_eq!("MODERATE".parse::<RiskRating>(), Ok(RiskRating::Medium));
        assert!("unknown".parse::<RiskRating>().is_err());
    }

    #[test]
    fn test_terms_filled_from_template() {
        let terms = RecommendedTerms {
            rate: Some("Prime + 2%".to_string()),
            term: Some("  ".to_string()),
            covenants: None,
            collateral: None,
        }
        .or_template(RiskRating::High);

        assert_eq!(terms.rate.as_deref(), Some("Prime + 2%"));
        assert_eq!(terms.term.as_deref(), Some("1-3 years"));
        assert_eq!(terms.collateral.as_deref(), Some("All business assets"));
    }

    #[test]
    fn test_tally() {
        let results = vec![
            result(SourceStatus::Ok),
            result(SourceStatus::Partial),
            result(SourceStatus::Failed),
            result(SourceStatus::Failed),
        ];
        let tally = SourceTally::from_results(&results);
        assert_eq!(tally.total, 4);
        assert_eq!(tally.ok, 1);
        assert_eq!(tally.partial, 1);
        assert_eq!(tally.failed, 2);
    }

    #[test]
    fn test_source_map_serializes_with_string_keys() {
        let mut sources = BTreeMap::new();
        sources.insert(SourceKind::Website, SourceOutcome::Single(result(SourceStatus::Ok)));
        let json = serde_json::to_string(&sources).unwrap();
        assert!(json.starts_with("{\"website\":"));
    }
}

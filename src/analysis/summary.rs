//! Parsing of the model's cross-source summary.
//!
//! The summary prompt asks for a JSON object. Models do not always comply,
//! so a JSON object anywhere in the reply (bare or fenced) is tried first and
//! free-text rating detection is the fallback.

use crate::error::AnalysisError;
use crate::models::{RecommendedTerms, RiskFactor, RiskRating, Severity, SummaryAnalysis};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawSummary {
    #[serde(default, alias = "overall_risk_rating", alias = "rating")]
    risk_rating: Option<String>,
    #[serde(default, alias = "risk_factors")]
    key_risk_factors: Vec<RawRiskFactor>,
    #[serde(default)]
    mitigating_factors: Vec<String>,
    #[serde(default, alias = "lending_terms")]
    recommended_terms: Option<RecommendedTerms>,
    #[serde(default, alias = "monitoring")]
    monitoring_recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRiskFactor {
    Detailed {
        #[serde(default)]
        severity: Option<String>,
        description: String,
    },
    Plain(String),
}

impl From<RawRiskFactor> for RiskFactor {
    fn from(raw: RawRiskFactor) -> Self {
        match raw {
            RawRiskFactor::Detailed {
                severity,
                description,
            } => RiskFactor {
                severity: severity
                    .as_deref()
                    .map(Severity::from_loose)
                    .unwrap_or(Severity::Medium),
                description,
            },
            RawRiskFactor::Plain(description) => RiskFactor {
                severity: Severity::Medium,
                description,
            },
        }
    }
}

/// Parse a summary reply into a [`SummaryAnalysis`].
///
/// Fails with [`AnalysisError::InvalidResponse`] when no risk rating can be
/// found, which the retry layer treats as worth another attempt.
pub fn parse_summary(text: &str) -> Result<SummaryAnalysis, AnalysisError> {
    let narrative = text.trim().to_string();

    if let Some(raw) = extract_json(text) {
        if let Some(rating) = raw.risk_rating.as_deref().and_then(parse_rating_word) {
            return Ok(SummaryAnalysis {
                risk_rating: rating,
                key_risk_factors: raw.key_risk_factors.into_iter().map(Into::into).collect(),
                mitigating_factors: non_empty(raw.mitigating_factors),
                recommended_terms: raw.recommended_terms.unwrap_or_default().or_template(rating),
                monitoring_recommendations: non_empty(raw.monitoring_recommendations),
                narrative,
            });
        }
        debug!("Summary JSON had no usable risk rating, falling back to text");
    }

    let rating = detect_rating(text).ok_or_else(|| AnalysisError::InvalidResponse {
        message: "summary did not state a risk rating".to_string(),
    })?;

    Ok(SummaryAnalysis {
        risk_rating: rating,
        key_risk_factors: Vec::new(),
        mitigating_factors: Vec::new(),
        recommended_terms: RecommendedTerms::template_for(rating),
        monitoring_recommendations: Vec::new(),
        narrative,
    })
}

fn extract_json(text: &str) -> Option<RawSummary> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn non_empty(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// "Low", "low risk", "MEDIUM" and the like.
fn parse_rating_word(word: &str) -> Option<RiskRating> {
    let word = word.trim().to_lowercase();
    word.trim_end_matches("risk").trim().parse().ok()
}

const LABELS: [&str; 3] = ["risk rating", "risk level", "overall risk"];

const PHRASES: [(&str, RiskRating); 4] = [
    ("high risk", RiskRating::High),
    ("medium risk", RiskRating::Medium),
    ("moderate risk", RiskRating::Medium),
    ("low risk", RiskRating::Low),
];

/// Words that turn a following phrase into a denial ("no high risk").
const NEGATIONS: [&str; 4] = ["no", "not", "without", "non"];

/// Rating stated in free text.
///
/// A labelled statement ("risk rating: high") wins over bare phrases. Among
/// bare phrases the earliest one that is neither negated nor describing
/// individual factors ("high risk factors") is taken.
fn detect_rating(text: &str) -> Option<RiskRating> {
    let lower = text.to_lowercase();

    let labelled = LABELS
        .iter()
        .filter_map(|label| {
            lower.match_indices(label).find_map(|(pos, _)| {
                rating_after_label(&lower[pos + label.len()..]).map(|rating| (pos, rating))
            })
        })
        .min_by_key(|(pos, _)| *pos);
    if let Some((_, rating)) = labelled {
        return Some(rating);
    }

    PHRASES
        .iter()
        .filter_map(|(phrase, rating)| {
            lower
                .match_indices(phrase)
                .map(|(pos, _)| pos)
                .find(|&pos| is_rating_statement(&lower, pos, phrase.len()))
                .map(|pos| (pos, *rating))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, rating)| rating)
}

/// Whether the phrase at `pos..pos + len` states the overall rating.
fn is_rating_statement(lower: &str, pos: usize, len: usize) -> bool {
    let before = lower[..pos]
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .last();
    if before.map_or(false, |w| NEGATIONS.contains(&w)) {
        return false;
    }

    !lower[pos + len..].trim_start().starts_with("factor")
}

/// Rating word following a label such as "risk rating:" or "**Risk Level** - ".
fn rating_after_label(rest: &str) -> Option<RiskRating> {
    let rest = rest.trim_start_matches(|c: char| !c.is_alphabetic());
    let word: String = rest.chars().take_while(|c| c.is_alphabetic()).collect();
    parse_rating_word(&word)
}

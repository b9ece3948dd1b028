//! Prompt templates, one per analysis type.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of analysis types; each selects one prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Sentiment,
    Reviews,
    News,
    Financial,
    Summary,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Sentiment => "sentiment",
            AnalysisType::Reviews => "reviews",
            AnalysisType::News => "news",
            AnalysisType::Financial => "financial",
            AnalysisType::Summary => "summary",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sentiment" => Ok(AnalysisType::Sentiment),
            "reviews" => Ok(AnalysisType::Reviews),
            "news" => Ok(AnalysisType::News),
            "financial" => Ok(AnalysisType::Financial),
            "summary" => Ok(AnalysisType::Summary),
            other => Err(AnalysisError::UnknownAnalysisType(other.to_string())),
        }
    }
}

/// Longest prefix of `content` holding at most `max_chars` characters.
pub fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Render the prompt for `analysis_type` around an already truncated body.
pub fn render(analysis_type: AnalysisType, body: &str) -> String {
    let (intro, label, asks) = template(analysis_type);

    let mut prompt = String::new();
    prompt.push_str(intro);
    prompt.push_str("\n\n");
    prompt.push_str(label);
    prompt.push_str(":\n");
    prompt.push_str(body);
    prompt.push_str("\n\nProvide:\n");
    for (i, ask) in asks.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, ask));
    }
    if analysis_type == AnalysisType::Summary {
        prompt.push('\n');
        prompt.push_str(SUMMARY_FORMAT);
    }
    prompt
}

fn template(analysis_type: AnalysisType) -> (&'static str, &'static str, &'static [&'static str]) {
    match analysis_type {
        AnalysisType::Sentiment => (
            "Assess the sentiment of this content about a company from a lender's point of view.",
            "Content",
            &[
                "Overall sentiment (positive, negative or neutral)",
                "Main positive factors",
                "Main negative factors",
                "Risk indicators a lender should note",
                "Confidence in the assessment",
            ],
        ),
        AnalysisType::Reviews => (
            "Review these customer reviews for signals relevant to a lending decision.",
            "Reviews",
            &[
                "Customer satisfaction score from 1 to 10",
                "Recurring positive themes",
                "Recurring negative themes",
                "Indicators of business health",
                "Signs of customer retention or churn",
                "Risk assessment for lenders",
            ],
        ),
        AnalysisType::News => (
            "Evaluate this news coverage for what it says about the company's health and creditworthiness.",
            "News",
            &[
                "News sentiment (positive, negative or neutral)",
                "Developments that affect the business",
                "Financial implications",
                "Changes in market position",
                "Risk factors for lenders",
                "Areas that deserve ongoing monitoring",
            ],
        ),
        AnalysisType::Financial => (
            "Extract financial signals from this company content.",
            "Content",
            &[
                "Financial performance indicators",
                "Revenue or profit mentions",
                "Debt and financing information",
                "Growth signals",
                "Risk factors",
                "Creditworthiness indicators",
            ],
        ),
        AnalysisType::Summary => (
            "Using the monitoring data below, produce a lending risk assessment for the company.",
            "Monitoring data",
            &[
                "Overall risk rating: Low, Medium or High",
                "Key risk factors, each with a severity",
                "Mitigating factors",
                "Recommended lending terms (rate, term, covenants, collateral)",
                "Monitoring recommendations",
            ],
        ),
    }
}

const SUMMARY_FORMAT: &str = r#"Respond with a single JSON object and nothing else, shaped like:
{"risk_rating": "Low|Medium|High",
 "key_risk_factors": [{"severity": "low|medium|high|critical", "description": "..."}],
 "mitigating_factors": ["..."],
 "recommended_terms": {"rate": "...", "term": "...", "covenants": "...", "collateral": "..."},
 "monitoring_recommendations": ["..."]}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_type() {
        assert_eq!("News".parse::<AnalysisType>(), Ok(AnalysisType::News));
        assert_eq!(
            "poetry".parse::<AnalysisType>(),
            Err(AnalysisError::UnknownAnalysisType("poetry".to_string()))
        );
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("", 4), "");
    }

    #[test]
    fn test_render_lists_asks() {
        let prompt = render(AnalysisType::Reviews, "Great service");
        assert!(prompt.contains("Reviews:\nGreat service"));
        assert!(prompt.contains("1. Customer satisfaction score"));
        assert!(!prompt.contains("JSON"));
    }

    #[test]
    fn test_summary_prompt_requests_json() {
        let prompt = render(AnalysisType::Summary, "data");
        assert!(prompt.contains("\"risk_rating\""));
    }
}

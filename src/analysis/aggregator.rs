//! Source result aggregation.
//!
//! Builds the digest handed to the summary analysis and groups results by
//! status for reporting.

use crate::analyzer::prompts::truncate_chars;
use crate::models::{MonitoringRequest, SourceKind, SourceOutcome, SourceResult, SourceStatus};
use std::collections::{BTreeMap, HashMap};

/// Summary-prompt line for a result that produced nothing usable.
pub fn unavailable_placeholder(result: &SourceResult) -> String {
    format!(
        "[{}/{}] unavailable: {}",
        result.kind,
        result.label,
        result.error.as_deref().unwrap_or("unknown error")
    )
}

/// Concatenate every source result into the text the summary is built from.
///
/// Headings, status lines and failure placeholders are always kept whole.
/// The rest of `budget` is split evenly between the bodies (analyses and raw
/// excerpts), so a long early source cannot push later ones out.
pub fn summary_digest(
    request: &MonitoringRequest,
    sources: &BTreeMap<SourceKind, SourceOutcome>,
    budget: usize,
) -> String {
    let mut header = String::new();
    header.push_str(&format!("Company: {}\n", request.company_name()));
    if let Some(location) = request.location() {
        header.push_str(&format!("Location: {}\n", location));
    }
    if let Some(website) = request.website() {
        header.push_str(&format!("Website: {}\n", website));
    }

    let sections: Vec<(String, Vec<DigestEntry<'_>>)> = sources
        .iter()
        .map(|(kind, outcome)| {
            let heading = format!("\n## {}\n", kind.display_name());
            (heading, outcome.results().iter().map(digest_entry).collect())
        })
        .collect();

    let mut fixed = header.chars().count();
    let mut bodies = 0;
    for (heading, entries) in &sections {
        fixed += heading.chars().count();
        for entry in entries {
            fixed += entry.line.chars().count();
            if let Some((prefix, _)) = entry.body {
                fixed += prefix.chars().count() + 1;
                bodies += 1;
            }
        }
    }
    let share = match bodies {
        0 => 0,
        n => budget.saturating_sub(fixed) / n,
    };

    let mut digest = header;
    for (heading, entries) in sections {
        digest.push_str(&heading);
        for entry in entries {
            digest.push_str(&entry.line);
            if let Some((prefix, body)) = entry.body {
                digest.push_str(prefix);
                digest.push_str(truncate_chars(body, share));
                digest.push('\n');
            }
        }
    }

    digest
}

/// One result in the digest: a status line plus an optional trimmed body.
struct DigestEntry<'a> {
    line: String,
    body: Option<(&'static str, &'a str)>,
}

fn digest_entry(result: &SourceResult) -> DigestEntry<'_> {
    match result.status {
        SourceStatus::Ok => DigestEntry {
            line: format!("[{}/{}]\n", result.kind, result.label),
            body: Some(("", result.analysis.as_deref().unwrap_or_default())),
        },
        SourceStatus::Partial => DigestEntry {
            line: format!(
                "[{}/{}] not analyzed: {}\n",
                result.kind,
                result.label,
                result.error.as_deref().unwrap_or("unknown error")
            ),
            body: (!result.raw_content.is_empty())
                .then_some(("Raw excerpt: ", result.raw_content.as_str())),
        },
        SourceStatus::Failed => DigestEntry {
            line: format!("{}\n", unavailable_placeholder(result)),
            body: None,
        },
    }
}

/// Whether every result of every source failed.
pub fn all_sources_failed(sources: &BTreeMap<SourceKind, SourceOutcome>) -> bool {
    sources
        .values()
        .flat_map(|o| o.results())
        .all(|r| r.status == SourceStatus::Failed)
}

/// Group results by status, keeping source order within each group.
pub fn group_by_status<'a>(
    sources: &'a BTreeMap<SourceKind, SourceOutcome>,
) -> HashMap<SourceStatus, Vec<&'a SourceResult>> {
    let mut grouped: HashMap<SourceStatus, Vec<&SourceResult>> = HashMap::new();

    for result in sources.values().flat_map(|o| o.results()) {
        grouped.entry(result.status).or_default().push(result);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> BTreeMap<SourceKind, SourceOutcome> {
        let mut sources = BTreeMap::new();
        sources.insert(
            SourceKind::Reviews,
            SourceOutcome::Single(SourceResult::failed(
                SourceKind::Reviews,
                "Google Reviews",
                "https://www.google.com/search?q=acme",
                "fetching timed out",
            )),
        );
        sources.insert(
            SourceKind::News,
            SourceOutcome::Multi(vec![
                SourceResult::ok(
                    SourceKind::News,
                    "news.google.com",
                    "https://news.google.com",
                    "raw".to_string(),
                    "Positive coverage".to_string(),
                ),
                SourceResult::partial(
                    SourceKind::News,
                    "www.reuters.com",
                    "https://www.reuters.com",
                    "Acme expands...".to_string(),
                    "model quota exceeded",
                ),
            ]),
        );
        sources
    }

    #[test]
    fn test_placeholder_format() {
        let sources = sources();
        let failed = sources[&SourceKind::Reviews].results()[0].clone();
        assert_eq!(
            unavailable_placeholder(&failed),
            "[reviews/Google Reviews] unavailable: fetching timed out"
        );
    }

    #[test]
    fn test_digest_mentions_every_result() {
        let request =
            MonitoringRequest::new("Acme Corp", Some("US".to_string()), None).unwrap();
        let digest = summary_digest(&request, &sources(), 12000);

        assert!(digest.starts_with("Company: Acme Corp\nLocation: US\n"));
        assert!(digest.contains("[reviews/Google Reviews] unavailable: fetching timed out"));
        assert!(digest.contains("[news/news.google.com]\nPositive coverage"));
        assert!(digest.contains("[news/www.reuters.com] not analyzed: model quota exceeded"));
        assert!(digest.contains("Raw excerpt: Acme expands..."));
        // BTreeMap order: reviews before news.
        assert!(digest.find("Customer Reviews") < digest.find("News Coverage"));
    }

    #[test]
    fn test_all_sources_failed() {
        let mut sources = sources();
        assert!(!all_sources_failed(&sources));

        sources.remove(&SourceKind::News);
        assert!(all_sources_failed(&sources));
    }

    #[test]
    fn test_group_by_status() {
        let sources = sources();
        let grouped = group_by_status(&sources);

        assert_eq!(grouped[&SourceStatus::Ok].len(), 1);
        assert_eq!(grouped[&SourceStatus::Partial].len(), 1);
        assert_eq!(grouped[&SourceStatus::Failed].len(), 1);
    }

    #[test]
    fn test_digest_keeps_late_placeholder_within_budget() {
        let request = MonitoringRequest::new("Acme Corp", None, None).unwrap();
        let analysis = "Steady growth and no litigation. ".repeat(60);

        let mut sources = BTreeMap::new();
        sources.insert(
            SourceKind::Reviews,
            SourceOutcome::Single(SourceResult::ok(
                SourceKind::Reviews,
                "Google Reviews",
                "https://www.google.com/search?q=acme",
                "raw".to_string(),
                analysis.clone(),
            )),
        );
        for (kind, labels) in [
            (
                SourceKind::News,
                vec!["news.google.com", "finance.yahoo.com", "www.reuters.com"],
            ),
            (SourceKind::Social, vec!["twitter.com", "www.linkedin.com"]),
        ] {
            let results = labels
                .into_iter()
                .map(|label| {
                    SourceResult::ok(kind, label, label, "raw".to_string(), analysis.clone())
                })
                .collect();
            sources.insert(kind, SourceOutcome::Multi(results));
        }
        sources.insert(
            SourceKind::Website,
            SourceOutcome::Single(SourceResult::failed(
                SourceKind::Website,
                "Company Website",
                "https://www.acmecorp.com",
                "fetch blocked for https://www.acmecorp.com: denied",
            )),
        );

        let digest = summary_digest(&request, &sources, 12000);

        assert!(digest.chars().count() <= 12000);
        assert!(digest.contains(
            "[website/Company Website] unavailable: fetch blocked for https://www.acmecorp.com: denied"
        ));
        assert!(digest.contains("[social/www.linkedin.com]\nSteady growth"));
    }
}

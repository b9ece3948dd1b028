//! Text and JSON report generation.
//!
//! This module renders a [`MonitoringReport`] as a human-readable text
//! document and as pretty-printed JSON.

use crate::analysis::group_by_status;
use crate::models::{
    MonitoringReport, RecommendedTerms, SourceKind, SourceOutcome, SourceResult, SourceStatus,
    SourceTally, SummaryAnalysis,
};
use anyhow::Result;

const RULE: &str = "==================================================";

/// Generate the complete text report.
pub fn generate_text_report(report: &MonitoringReport, tag: &str) -> String {
    let mut output = String::new();

    output.push_str(&generate_header(report, tag));
    output.push_str(&generate_status_section(&report.tally()));
    output.push_str(&generate_assessment_section(report));
    output.push_str(&generate_sources_section(report));
    output.push_str(&generate_attention_section(report));
    output.push_str(&generate_footer());

    output
}

/// Generate a JSON report.
pub fn generate_json_report(report: &MonitoringReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

fn generate_header(report: &MonitoringReport, tag: &str) -> String {
    let mut header = String::new();

    header.push_str("Lending Monitoring Report\n");
    header.push_str(&format!("Company: {}\n", report.company_name));
    if let Some(ref location) = report.location {
        header.push_str(&format!("Location: {}\n", location));
    }
    if let Some(ref website) = report.website {
        header.push_str(&format!("Website: {}\n", website));
    }
    header.push_str(&format!("Research Type: {}\n", tag));
    header.push_str(&format!(
        "Date: {}\n",
        report.run_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    header.push_str(&format!("Duration: {:.1}s\n", report.duration_seconds));
    header.push_str(RULE);
    header.push_str("\n\n");

    header
}

fn generate_status_section(tally: &SourceTally) -> String {
    let mut section = String::new();

    section.push_str("SOURCE STATUS\n");
    section.push_str(&format!(
        "  {} Ok: {} | {} Partial: {} | {} Failed: {} | Total: {}\n\n",
        SourceStatus::Ok.emoji(),
        tally.ok,
        SourceStatus::Partial.emoji(),
        tally.partial,
        SourceStatus::Failed.emoji(),
        tally.failed,
        tally.total
    ));

    section
}

fn generate_assessment_section(report: &MonitoringReport) -> String {
    let mut section = String::new();

    section.push_str("RISK ASSESSMENT\n");

    let summary = match report.summary {
        Some(ref summary) => summary,
        None => {
            section.push_str(&format!(
                "  Summary unavailable: {}\n\n",
                report.summary_error.as_deref().unwrap_or("unknown error")
            ));
            return section;
        }
    };

    section.push_str(&format!(
        "  Risk Rating: {} {}\n\n",
        summary.risk_rating.emoji(),
        summary.risk_rating
    ));

    if !summary.key_risk_factors.is_empty() {
        section.push_str("  Key Risk Factors:\n");
        for (i, factor) in summary.key_risk_factors.iter().enumerate() {
            section.push_str(&format!(
                "    {}. {} [{}] {}\n",
                i + 1,
                factor.severity.emoji(),
                factor.severity,
                factor.description
            ));
        }
        section.push('\n');
    }

    push_list(&mut section, "Mitigating Factors", &summary.mitigating_factors);
    section.push_str(&generate_terms_block(&summary.recommended_terms));
    push_list(
        &mut section,
        "Monitoring Recommendations",
        &summary.monitoring_recommendations,
    );
    section.push_str(&generate_narrative_block(summary));

    section
}

fn push_list(section: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    section.push_str(&format!("  {}:\n", title));
    for item in items {
        section.push_str(&format!("    - {}\n", item));
    }
    section.push('\n');
}

fn generate_terms_block(terms: &RecommendedTerms) -> String {
    let fields = [
        ("Rate", &terms.rate),
        ("Term", &terms.term),
        ("Covenants", &terms.covenants),
        ("Collateral", &terms.collateral),
    ];

    let mut block = String::new();
    for (name, value) in fields {
        if let Some(value) = value {
            block.push_str(&format!("    {}: {}\n", name, value));
        }
    }

    if block.is_empty() {
        return block;
    }
    format!("  Recommended Terms:\n{}\n", block)
}

fn generate_narrative_block(summary: &SummaryAnalysis) -> String {
    // Structured replies already rendered above; only free text is repeated.
    if summary.narrative.trim_start().starts_with('{') || summary.narrative.contains("```") {
        return String::new();
    }
    format!("  Analyst Notes:\n{}\n\n", indent(&summary.narrative, 4))
}

fn generate_sources_section(report: &MonitoringReport) -> String {
    let mut section = String::new();

    section.push_str("SOURCES\n");
    for (kind, outcome) in &report.sources {
        section.push_str(&generate_source_block(*kind, outcome));
    }

    section
}

fn generate_source_block(kind: SourceKind, outcome: &SourceOutcome) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "--- {} ({}) ---\n",
        kind.display_name(),
        outcome.status()
    ));

    for result in outcome.results() {
        block.push_str(&generate_result_block(result));
    }

    block
}

fn generate_result_block(result: &SourceResult) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "{} [{}] {}\n",
        result.status.emoji(),
        result.label,
        result.status.describe()
    ));
    if !result.origin.is_empty() {
        block.push_str(&format!("  Origin: {}\n", result.origin));
    }
    if let Some(ref error) = result.error {
        block.push_str(&format!("  Reason: {}\n", error));
    }
    if let Some(ref analysis) = result.analysis {
        block.push_str("  Analysis:\n");
        block.push_str(&indent(analysis, 4));
        block.push('\n');
    } else if !result.raw_content.is_empty() {
        block.push_str("  Raw excerpt:\n");
        block.push_str(&indent(&result.raw_content, 4));
        block.push('\n');
    }
    block.push('\n');

    block
}

/// Partial and failed results listed together for quick follow-up.
fn generate_attention_section(report: &MonitoringReport) -> String {
    let grouped = group_by_status(&report.sources);
    let degraded = grouped.get(&SourceStatus::Partial);
    let failed = grouped.get(&SourceStatus::Failed);

    if degraded.is_none() && failed.is_none() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("NEEDS ATTENTION\n");

    for result in degraded.into_iter().chain(failed).flatten() {
        section.push_str(&format!(
            "  {} {}/{}: {}\n",
            result.status.emoji(),
            result.kind,
            result.label,
            result.error.as_deref().unwrap_or("no detail")
        ));
    }
    section.push('\n');

    section
}

fn generate_footer() -> String {
    format!("{}\nGenerated by lendwatch v{}\n", RULE, env!("CARGO_PKG_VERSION"))
}

fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.trim_end()
        .lines()
        .map(|line| format!("{}{}", pad, line))
        .collect::<Vec<_>>()
        .join("\n")
}
